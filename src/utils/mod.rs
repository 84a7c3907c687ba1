pub mod command;
pub mod locker;
pub mod secrets;

// Trait-based abstraction for testability
pub mod executor;

// Re-export commonly used types and traits (used by test crate)
pub use executor::{CommandExecutor, RealExecutor};
pub use secrets::{MysqlOptionFile, SecretString};
