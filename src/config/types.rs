use crate::utils::secrets::SecretString;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub global: GlobalConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub destinations: IndexMap<String, DestinationConfig>,
    #[serde(default)]
    pub encryptions: IndexMap<String, EncryptionConfig>,
}

/// Global configuration settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GlobalConfig {
    /// Directory for rotated log files; console-only logging when unset
    #[serde(default)]
    pub log_directory: Option<PathBuf>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_max_files")]
    pub log_max_files: u32,

    /// Upper bound for any single external tool call
    #[serde(default)]
    pub timeout_seconds: Option<u64>,

    /// Lock file guarding against overlapping runs
    #[serde(default = "default_lock_file")]
    pub lock_file: PathBuf,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            log_directory: None,
            log_level: default_log_level(),
            log_max_files: default_log_max_files(),
            timeout_seconds: None,
            lock_file: default_lock_file(),
        }
    }
}

/// Notification configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotificationConfig {
    #[serde(default)]
    pub discord_webhook_url: String,

    #[serde(default = "default_notify_on")]
    pub notify_on: Vec<NotifyEvent>,

    #[serde(default = "default_rate_limit")]
    pub rate_limit_minutes: u64,

    /// Rate-limit cache; defaults to the user cache directory
    #[serde(default)]
    pub cache_file: Option<PathBuf>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            discord_webhook_url: String::new(),
            notify_on: default_notify_on(),
            rate_limit_minutes: default_rate_limit(),
            cache_file: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NotifyEvent {
    Failure,
    Success,
}

/// All configured sources, grouped by kind
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SourcesConfig {
    #[serde(default)]
    pub mysqldump: IndexMap<String, DumpSourceConfig>,
    #[serde(default)]
    pub directories: IndexMap<String, DirSourceConfig>,
}

impl SourcesConfig {
    pub fn len(&self) -> usize {
        self.mysqldump.len() + self.directories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Compression algorithm applied to produced artifacts
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    Gzip,
    Bzip2,
    None,
}

impl Compression {
    /// External program implementing the algorithm
    pub fn program(&self) -> Option<&'static str> {
        match self {
            Compression::Gzip => Some("gzip"),
            Compression::Bzip2 => Some("bzip2"),
            Compression::None => None,
        }
    }

    /// Conventional suffix of the compressed file
    pub fn suffix(&self) -> Option<&'static str> {
        match self {
            Compression::Gzip => Some(".gz"),
            Compression::Bzip2 => Some(".bz2"),
            Compression::None => None,
        }
    }
}

/// `sources.mysqldump.<name>`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DumpSourceConfig {
    /// Staging directory for dump files
    pub temp: PathBuf,

    #[serde(default)]
    pub databases: Vec<String>,

    /// Dump every database except the system schemas and `exclude_databases`
    #[serde(default)]
    pub all_databases_except_system: bool,
    #[serde(default)]
    pub exclude_databases: Vec<String>,

    #[serde(default)]
    pub compress: Option<Compression>,
    #[serde(default)]
    pub encryption: Option<String>,
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default = "default_cleanup")]
    pub cleanup: bool,

    // Connection parameters
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<SecretString>,

    /// Extra arguments passed to mysqldump verbatim
    #[serde(default)]
    pub extra_args: Vec<String>,
}

impl DumpSourceConfig {
    pub fn new(temp: impl Into<PathBuf>) -> Self {
        Self {
            temp: temp.into(),
            databases: Vec::new(),
            all_databases_except_system: false,
            exclude_databases: Vec::new(),
            compress: None,
            encryption: None,
            destination: None,
            cleanup: default_cleanup(),
            host: None,
            port: None,
            user: None,
            password: None,
            extra_args: Vec::new(),
        }
    }
}

/// `sources.directories.<name>`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DirSourceConfig {
    /// Directory to archive
    pub path: PathBuf,
    /// Staging directory for the archive
    pub temp: PathBuf,

    #[serde(default)]
    pub compress: Option<Compression>,
    #[serde(default)]
    pub encryption: Option<String>,
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default = "default_cleanup")]
    pub cleanup: bool,

    #[serde(default)]
    pub incremental: bool,
    /// tar `--listed-incremental` state, kept across runs
    #[serde(default)]
    pub incremental_snapshot: Option<PathBuf>,
}

impl DirSourceConfig {
    pub fn new(path: impl Into<PathBuf>, temp: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            temp: temp.into(),
            compress: None,
            encryption: None,
            destination: None,
            cleanup: default_cleanup(),
            incremental: false,
            incremental_snapshot: None,
        }
    }
}

/// `destinations.<name>`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DestinationConfig {
    pub method: DestinationMethod,

    #[serde(alias = "S3_BUCKET")]
    pub bucket: String,
    #[serde(default)]
    pub prefix: String,

    #[serde(default)]
    pub region: Option<String>,
    /// Endpoint for S3-compatible stores
    #[serde(default)]
    pub endpoint_url: Option<String>,

    /// Explicit credentials; the SDK's default chain is used when unset
    #[serde(default, alias = "AWS_ACCESS_KEY_ID")]
    pub access_key_id: Option<String>,
    #[serde(default, alias = "AWS_SECRET_ACCESS_KEY")]
    pub secret_access_key: Option<SecretString>,
}

impl DestinationConfig {
    pub fn s3(bucket: &str, prefix: &str) -> Self {
        Self {
            method: DestinationMethod::S3,
            bucket: bucket.to_string(),
            prefix: prefix.to_string(),
            region: None,
            endpoint_url: None,
            access_key_id: None,
            secret_access_key: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DestinationMethod {
    S3,
}

/// `encryptions.<name>`
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct EncryptionConfig {
    pub method: EncryptionMethod,
    /// Key id, fingerprint or email known to the local keyring
    pub recipient: String,
}

impl EncryptionConfig {
    pub fn gpg(recipient: &str) -> Self {
        Self {
            method: EncryptionMethod::Gpg,
            recipient: recipient.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EncryptionMethod {
    Gpg,
}

/// A destination together with the name it was configured under
#[derive(Debug, Clone)]
pub struct NamedDestination {
    pub name: String,
    pub config: DestinationConfig,
}

/// Post-produce stages of a source, with references resolved
#[derive(Debug, Clone)]
pub struct ResolvedPipeline {
    pub compress: Compression,
    pub encryption: Option<EncryptionConfig>,
    pub destination: Option<NamedDestination>,
    pub cleanup: bool,
}

// Default value functions

fn default_log_level() -> String { "info".to_string() }
fn default_log_max_files() -> u32 { 10 }
fn default_lock_file() -> PathBuf {
    std::env::temp_dir().join("backup-orchestrator.lock")
}
fn default_cleanup() -> bool { true }
fn default_notify_on() -> Vec<NotifyEvent> {
    vec![NotifyEvent::Failure]
}
fn default_rate_limit() -> u64 { 60 }
