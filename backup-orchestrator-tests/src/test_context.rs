//! Test context and harness
//!
//! Owns the temp directory behind a test configuration and runs the backup
//! runner against mock collaborators.

use crate::config_builder::ConfigBuilder;
use crate::fixtures::TEST_TIMESTAMP;
use anyhow::Result;
use backup_orchestrator::artifact::RunSummary;
use backup_orchestrator::config::{Config, ConfigError};
use backup_orchestrator::managers::backup::BackupRunner;
use backup_orchestrator::stages::upload::mock::MockObjectStore;
use backup_orchestrator::utils::executor::mock::MockExecutor;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub struct TestContext {
    temp_dir: TempDir,
    config: Config,
}

impl TestContext {
    /// Empty configuration
    pub fn new() -> Self {
        Self::from_builder(ConfigBuilder::new())
    }

    pub fn from_builder(builder: ConfigBuilder) -> Self {
        let (config, temp_dir) = builder.persist();
        Self { temp_dir, config }
    }

    pub fn temp_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Runner wired to the given mocks, with the fixed test timestamp
    pub fn runner(&self, executor: &MockExecutor, store: &MockObjectStore) -> BackupRunner {
        BackupRunner::new(
            self.config.clone(),
            Box::new(executor.clone()),
            Box::new(store.clone()),
        )
        .with_timestamp(TEST_TIMESTAMP)
    }

    /// Run the whole configuration once
    pub fn run(
        &self,
        executor: &MockExecutor,
        store: &MockObjectStore,
    ) -> Result<RunSummary, ConfigError> {
        self.runner(executor, store).run()
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.temp_dir.path().join(relative)
    }

    pub fn create_subdir(&self, name: &str) -> PathBuf {
        let path = self.path(name);
        std::fs::create_dir_all(&path).expect("Failed to create subdirectory");
        path
    }

    pub fn create_file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.path(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        std::fs::write(&path, content).expect("Failed to write file");
        path
    }

    pub fn file_exists(&self, name: &str) -> bool {
        self.path(name).exists()
    }

    pub fn read_file(&self, name: &str) -> Result<String> {
        Ok(std::fs::read_to_string(self.path(name))?)
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Extension trait for assertion helpers
pub trait ResultAssertions<T> {
    fn assert_ok(self) -> T;

    fn assert_err(self);

    /// Assert Err whose Display text contains `needle`
    fn assert_err_contains(self, needle: &str);
}

impl<T, E> ResultAssertions<T> for Result<T, E>
where
    T: std::fmt::Debug,
    E: std::fmt::Display + std::fmt::Debug,
{
    fn assert_ok(self) -> T {
        match self {
            Ok(v) => v,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    }

    fn assert_err(self) {
        if let Ok(v) = self {
            panic!("Expected Err, got Ok: {:?}", v);
        }
    }

    fn assert_err_contains(self, needle: &str) {
        match self {
            Ok(v) => panic!("Expected Err containing '{}', got Ok: {:?}", needle, v),
            Err(e) => {
                let message = e.to_string();
                assert!(
                    message.contains(needle),
                    "Error '{}' does not contain '{}'",
                    message,
                    needle
                );
            }
        }
    }
}
