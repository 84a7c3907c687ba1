//! Configuration module for backup-orchestrator
//!
//! This module handles loading, validating, and resolving configuration from TOML files.
//!
//! ## Layout
//!
//! - `sources.mysqldump.<name>` and `sources.directories.<name>` describe what to back up
//! - `encryptions.<name>` and `destinations.<name>` are referenced by name from sources
//! - `global` and `notifications` hold ambient settings
//!
//! References are checked when the file is loaded; an unknown name is an error
//! and nothing runs.
//!
//! ## Example Usage
//!
//! ```no_run
//! use backup_orchestrator::config;
//!
//! let config = config::load_config("config.toml")?;
//!
//! for (name, source) in &config.sources.directories {
//!     println!("Directory source: {} ({:?})", name, source.path);
//! }
//! # Ok::<(), config::ConfigError>(())
//! ```

mod loader;
mod types;

pub use loader::{load_config, parse_config, resolve_pipeline, validate_config, ConfigError, Result};
pub use types::*;

use std::path::{Path, PathBuf};

/// File name looked up next to the executable when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Default configuration path: `config.toml` colocated with the executable
pub fn default_config_path() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(DEFAULT_CONFIG_FILE)))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

/// Expand tilde (~) in path
pub fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}
