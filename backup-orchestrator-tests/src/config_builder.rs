//! Fluent API for building test configurations
//!
//! Every path the configuration points at lives inside the builder's temp
//! directory, so tests never touch shared locations.

use backup_orchestrator::config::{
    Compression, Config, DestinationConfig, DirSourceConfig, DumpSourceConfig, EncryptionConfig,
};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub struct ConfigBuilder {
    temp_dir: TempDir,
    config: Config,
}

impl ConfigBuilder {
    /// Empty configuration with lock and cache files inside the temp dir
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");

        let mut config = Config::default();
        config.global.lock_file = temp_dir.path().join("run.lock");
        config.notifications.cache_file = Some(temp_dir.path().join("notifications.json"));

        Self { temp_dir, config }
    }

    /// An `offsite` S3 destination and an `ops` gpg encryption, no sources
    pub fn minimal() -> Self {
        Self::new()
            .with_destination("offsite", DestinationConfig::s3("test-bucket", "nightly"))
            .with_encryption("ops", "ops@example.org")
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn with_destination(mut self, name: &str, destination: DestinationConfig) -> Self {
        self.config.destinations.insert(name.to_string(), destination);
        self
    }

    pub fn with_encryption(mut self, name: &str, recipient: &str) -> Self {
        self.config
            .encryptions
            .insert(name.to_string(), EncryptionConfig::gpg(recipient));
        self
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.config.global.timeout_seconds = Some(seconds);
        self
    }

    pub fn with_log_dir(mut self) -> Self {
        self.config.global.log_directory = Some(self.temp_dir.path().join("logs"));
        self
    }

    /// Dump source with an explicit database list, staging into `dumps/`
    pub fn with_dump_source(mut self, name: &str, databases: &[&str]) -> Self {
        let mut source = DumpSourceConfig::new(self.temp_dir.path().join("dumps"));
        source.databases = databases.iter().map(|s| s.to_string()).collect();
        self.config.sources.mysqldump.insert(name.to_string(), source);
        self
    }

    /// Dump source covering every non-system database
    pub fn with_all_databases_source(mut self, name: &str, exclude: &[&str]) -> Self {
        let mut source = DumpSourceConfig::new(self.temp_dir.path().join("dumps"));
        source.all_databases_except_system = true;
        source.exclude_databases = exclude.iter().map(|s| s.to_string()).collect();
        self.config.sources.mysqldump.insert(name.to_string(), source);
        self
    }

    /// Directory source over `data/<name>` (created with one file), staging into `archives/`
    pub fn with_directory_source(mut self, name: &str) -> Self {
        let data = self.temp_dir.path().join("data").join(name);
        fs::create_dir_all(&data).expect("Failed to create source directory");
        fs::write(data.join("index.html"), "<html>hello</html>")
            .expect("Failed to write source file");

        let source = DirSourceConfig::new(data, self.temp_dir.path().join("archives"));
        self.config.sources.directories.insert(name.to_string(), source);
        self
    }

    pub fn modify_dump<F: FnOnce(&mut DumpSourceConfig)>(mut self, name: &str, f: F) -> Self {
        let source = self
            .config
            .sources
            .mysqldump
            .get_mut(name)
            .unwrap_or_else(|| panic!("No dump source named {}", name));
        f(source);
        self
    }

    pub fn modify_directory<F: FnOnce(&mut DirSourceConfig)>(mut self, name: &str, f: F) -> Self {
        let source = self
            .config
            .sources
            .directories
            .get_mut(name)
            .unwrap_or_else(|| panic!("No directory source named {}", name));
        f(source);
        self
    }

    /// Shorthand for the common compress/encrypt/destination wiring
    pub fn pipeline(
        self,
        name: &str,
        compress: Option<Compression>,
        encryption: Option<&str>,
        destination: Option<&str>,
    ) -> Self {
        let is_dump = self.config.sources.mysqldump.contains_key(name);
        let encryption = encryption.map(String::from);
        let destination = destination.map(String::from);

        if is_dump {
            self.modify_dump(name, |s| {
                s.compress = compress;
                s.encryption = encryption;
                s.destination = destination;
            })
        } else {
            self.modify_directory(name, |s| {
                s.compress = compress;
                s.encryption = encryption;
                s.destination = destination;
            })
        }
    }

    /// Configuration only; the temp directory is removed when the builder drops
    pub fn build(self) -> Config {
        self.config
    }

    /// Configuration plus the temp directory that backs its paths
    pub fn persist(self) -> (Config, TempDir) {
        (self.config, self.temp_dir)
    }

    /// Write the configuration as `config.toml` in the temp directory
    pub fn write_toml(self) -> (PathBuf, TempDir) {
        let path = self.temp_dir.path().join("config.toml");
        let contents = toml::to_string_pretty(&self.config).expect("Failed to serialize config");
        fs::write(&path, contents).expect("Failed to write config");
        (path, self.temp_dir)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
