//! Test utilities for backup-orchestrator
//!
//! Shared builders, fake tools and helpers for the `unit`, `commands` and
//! `integration` test targets.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use test_utils::{fake_toolchain, ConfigBuilder, TestContext};
//!
//! #[test]
//! fn my_test() {
//!     let ctx = TestContext::from_builder(
//!         ConfigBuilder::minimal().with_directory_source("www"),
//!     );
//!     let executor = fake_toolchain();
//!     // ... test code
//! }
//! ```

pub mod config_builder;
pub mod fixtures;
pub mod test_context;

// Re-export commonly used items
pub use config_builder::ConfigBuilder;
pub use fixtures::*;
pub use test_context::{ResultAssertions, TestContext};

// Re-export types from the main crate for convenience
pub use backup_orchestrator::config::{
    Compression, Config, DestinationConfig, DirSourceConfig, DumpSourceConfig, EncryptionConfig,
    GlobalConfig, NotificationConfig,
};
pub use backup_orchestrator::stages::upload::mock::MockObjectStore;
pub use backup_orchestrator::stages::ObjectStore;
pub use backup_orchestrator::utils::executor::mock::{MockExecutor, MockResponse};
pub use backup_orchestrator::utils::executor::CommandExecutor;
