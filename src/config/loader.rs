use super::types::*;
use std::fs;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Source '{0}' references unknown encryption '{1}'")]
    EncryptionNotFound(String, String),

    #[error("Source '{0}' references unknown destination '{1}'")]
    DestinationNotFound(String, String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Load and validate configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let contents = fs::read_to_string(path)?;
    parse_config(&contents)
}

/// Parse and validate configuration from TOML text
pub fn parse_config(contents: &str) -> Result<Config> {
    let config: Config = toml::from_str(contents)?;
    validate_config(&config)?;
    Ok(config)
}

/// Validate cross-references and per-source rules.
///
/// Runs before any task is built, so a failure here means nothing was executed.
pub fn validate_config(config: &Config) -> Result<()> {
    for (name, destination) in &config.destinations {
        validate_destination(name, destination)?;
    }

    for (name, encryption) in &config.encryptions {
        if encryption.recipient.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "Encryption '{}': recipient must not be empty",
                name
            )));
        }
    }

    for (name, source) in &config.sources.mysqldump {
        validate_dump_source(name, source)?;
        check_references(
            name,
            source.encryption.as_deref(),
            source.destination.as_deref(),
            config,
        )?;
    }

    for (name, source) in &config.sources.directories {
        validate_directory_source(name, source)?;
        check_references(
            name,
            source.encryption.as_deref(),
            source.destination.as_deref(),
            config,
        )?;
    }

    Ok(())
}

fn validate_destination(name: &str, destination: &DestinationConfig) -> Result<()> {
    if destination.bucket.trim().is_empty() {
        return Err(ConfigError::ValidationError(format!(
            "Destination '{}': bucket must not be empty",
            name
        )));
    }

    // Explicit credentials come as a pair or not at all
    let has_key = destination.access_key_id.is_some();
    let has_secret = destination.secret_access_key.is_some();
    if has_key != has_secret {
        return Err(ConfigError::ValidationError(format!(
            "Destination '{}': access_key_id and secret_access_key must be set together",
            name
        )));
    }

    Ok(())
}

fn validate_dump_source(name: &str, source: &DumpSourceConfig) -> Result<()> {
    if source.temp.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(format!(
            "Source '{}': temp must not be empty",
            name
        )));
    }

    if source.all_databases_except_system && !source.databases.is_empty() {
        return Err(ConfigError::ValidationError(format!(
            "Source '{}': 'databases' and 'all_databases_except_system' are mutually exclusive",
            name
        )));
    }

    if !source.all_databases_except_system && source.databases.is_empty() {
        return Err(ConfigError::ValidationError(format!(
            "Source '{}': no databases selected (set 'databases' or 'all_databases_except_system')",
            name
        )));
    }

    if source.databases.iter().any(|db| db.trim().is_empty()) {
        return Err(ConfigError::ValidationError(format!(
            "Source '{}': database names must not be empty",
            name
        )));
    }

    Ok(())
}

fn validate_directory_source(name: &str, source: &DirSourceConfig) -> Result<()> {
    if source.path.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(format!(
            "Source '{}': path must not be empty",
            name
        )));
    }

    if source.temp.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(format!(
            "Source '{}': temp must not be empty",
            name
        )));
    }

    if source.incremental {
        let snapshot_set = source
            .incremental_snapshot
            .as_ref()
            .map(|p| !p.as_os_str().is_empty())
            .unwrap_or(false);

        if !snapshot_set {
            return Err(ConfigError::ValidationError(format!(
                "Source '{}': incremental backups require 'incremental_snapshot'",
                name
            )));
        }
    }

    Ok(())
}

fn check_references(
    source_name: &str,
    encryption: Option<&str>,
    destination: Option<&str>,
    config: &Config,
) -> Result<()> {
    if let Some(encryption) = encryption {
        if !config.encryptions.contains_key(encryption) {
            return Err(ConfigError::EncryptionNotFound(
                source_name.to_string(),
                encryption.to_string(),
            ));
        }
    }

    if let Some(destination) = destination {
        if !config.destinations.contains_key(destination) {
            return Err(ConfigError::DestinationNotFound(
                source_name.to_string(),
                destination.to_string(),
            ));
        }
    }

    Ok(())
}

/// Resolve the post-produce stages of a source against the top-level mappings
pub fn resolve_pipeline(
    source_name: &str,
    compress: Option<Compression>,
    encryption: Option<&str>,
    destination: Option<&str>,
    cleanup: bool,
    config: &Config,
) -> Result<ResolvedPipeline> {
    let encryption = match encryption {
        Some(name) => Some(
            config
                .encryptions
                .get(name)
                .cloned()
                .ok_or_else(|| {
                    ConfigError::EncryptionNotFound(source_name.to_string(), name.to_string())
                })?,
        ),
        None => None,
    };

    let destination = match destination {
        Some(name) => {
            let config = config
                .destinations
                .get(name)
                .cloned()
                .ok_or_else(|| {
                    ConfigError::DestinationNotFound(source_name.to_string(), name.to_string())
                })?;
            Some(NamedDestination {
                name: name.to_string(),
                config,
            })
        }
        None => None,
    };

    Ok(ResolvedPipeline {
        compress: compress.unwrap_or(Compression::None),
        encryption,
        destination,
        cleanup,
    })
}
