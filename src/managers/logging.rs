//! Logging setup
//!
//! - Console (stderr): INFO, concise format
//! - File: configured level, daily rotation, only when `log_directory` is set

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::config::{expand_tilde, GlobalConfig};

const LOG_FILE_PREFIX: &str = "backup-orchestrator";

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Directory for log files; console only when `None`
    pub log_directory: Option<PathBuf>,
    /// Level for file output (console always uses INFO)
    pub log_level: Level,
    /// Maximum number of log files to keep
    pub max_files: u32,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_directory: None,
            log_level: Level::INFO,
            max_files: 10,
        }
    }
}

impl LoggingConfig {
    pub fn from_global(global: &GlobalConfig) -> Self {
        Self {
            log_directory: global.log_directory.as_deref().map(expand_tilde),
            log_level: parse_level(&global.log_level),
            max_files: global.log_max_files,
        }
    }
}

fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Initialize logging.
///
/// Keep the returned guard alive for the whole program; dropping it flushes
/// the file writer.
pub fn init_logging(config: &LoggingConfig) -> Result<LogGuard> {
    let mut file_guard = None;

    let file_layer = match config.log_directory {
        Some(ref log_dir) => {
            fs::create_dir_all(log_dir)
                .with_context(|| format!("Failed to create log directory: {:?}", log_dir))?;

            let appender = RollingFileAppender::new(
                Rotation::DAILY,
                log_dir,
                format!("{}.log", LOG_FILE_PREFIX),
            );
            let (writer, guard) = tracing_appender::non_blocking(appender);
            file_guard = Some(guard);

            Some(
                fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_target(true)
                    .with_filter(level_filter(config.log_level)),
            )
        }
        None => None,
    };

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(level_filter(Level::INFO));

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .context("Failed to install log subscriber")?;

    if let Some(ref log_dir) = config.log_directory {
        cleanup_old_logs(log_dir, config.max_files)?;
    }

    Ok(LogGuard {
        _file_guard: file_guard,
    })
}

/// Console-only logging for commands that don't run backups
pub fn init_console_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// `RUST_LOG` wins; otherwise our crate at `level`, dependencies at WARN
fn level_filter(level: Level) -> EnvFilter {
    let level = level.as_str().to_lowercase();
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,backup_orchestrator={}", level)))
}

/// Keep only the newest `max_files` log files
fn cleanup_old_logs(log_dir: &Path, max_files: u32) -> Result<()> {
    let mut log_files: Vec<_> = fs::read_dir(log_dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            name.starts_with(LOG_FILE_PREFIX) && name.contains(".log")
        })
        .collect();

    // Newest first
    log_files.sort_by_key(|entry| {
        std::cmp::Reverse(entry.metadata().and_then(|m| m.modified()).ok())
    });

    for file in log_files.into_iter().skip(max_files as usize) {
        match fs::remove_file(file.path()) {
            Ok(()) => tracing::debug!("Removed old log file: {:?}", file.path()),
            Err(e) => tracing::warn!("Failed to remove old log file {:?}: {}", file.path(), e),
        }
    }

    Ok(())
}

pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}
