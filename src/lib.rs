//! Backup Orchestrator Library
//!
//! Configuration-driven backups: MySQL dumps and directory archives, optionally
//! compressed, encrypted with gpg and uploaded to S3-compatible storage.

pub mod artifact;
pub mod config;
pub mod error;
pub mod managers;
pub mod stages;
pub mod strategies;
pub mod utils;

// Re-export commonly used types
pub use artifact::{Artifact, ArtifactStage, RunSummary, TaskOutcome};
pub use config::{load_config, Config, ConfigError};
pub use error::BackupError;
pub use managers::backup::BackupRunner;
pub use managers::logging::{init_console_logging, init_logging, LogGuard, LoggingConfig};
pub use managers::notification::NotificationManager;
