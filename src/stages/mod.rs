//! Post-produce stages applied to every artifact

pub mod compress;
pub mod encrypt;
pub mod upload;

pub use compress::compress;
pub use encrypt::encrypt;
pub use upload::{object_key, upload, ObjectStore, S3Store, UploadReceipt};
