//! Per-unit backup errors
//!
//! Configuration problems live in [`crate::config::ConfigError`] and abort a run
//! before anything executes. The errors here are recorded in a unit's outcome
//! and never stop the remaining units.

use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackupError {
    #[error("Failed to produce backup for '{unit}': {reason}")]
    SourceProduction { unit: String, reason: String },

    #[error("Failed to compress {path:?}: {reason}")]
    Compression { path: PathBuf, reason: String },

    #[error("Failed to encrypt {path:?}: {reason}")]
    Encryption { path: PathBuf, reason: String },

    #[error("Failed to upload {path:?} to destination '{destination}': {reason}")]
    Upload {
        path: PathBuf,
        destination: String,
        reason: String,
    },
}

impl BackupError {
    /// Name of the pipeline stage that failed
    pub fn stage(&self) -> &'static str {
        match self {
            BackupError::SourceProduction { .. } => "produce",
            BackupError::Compression { .. } => "compress",
            BackupError::Encryption { .. } => "encrypt",
            BackupError::Upload { .. } => "upload",
        }
    }

    pub(crate) fn production(unit: &str, err: &anyhow::Error) -> Self {
        BackupError::SourceProduction {
            unit: unit.to_string(),
            reason: format!("{:#}", err),
        }
    }
}
