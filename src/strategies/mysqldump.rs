//! MySQL/MariaDB dump source
//!
//! One `.sql` artifact per database. Credentials are handed to the client
//! tools through a private option file, never on the command line.

use super::{BackupSource, Production};
use crate::artifact::{Artifact, SourceKind};
use crate::config::DumpSourceConfig;
use crate::error::BackupError;
use crate::managers::pipeline::StageContext;
use crate::utils::command::path_arg;
use crate::utils::{CommandExecutor, MysqlOptionFile};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Schemas skipped by `all_databases_except_system`
pub const DEFAULT_SYSTEM_DATABASES: [&str; 4] =
    ["information_schema", "performance_schema", "mysql", "sys"];

#[derive(Debug, Clone)]
pub struct DumpTask {
    pub source: String,
    pub config: DumpSourceConfig,
    /// Databases this task dumps, in order
    pub databases: Vec<String>,
}

impl DumpTask {
    pub fn new(source: &str, config: DumpSourceConfig, databases: Vec<String>) -> Self {
        Self {
            source: source.to_string(),
            config,
            databases,
        }
    }

    fn dump_database(&self, ctx: &StageContext<'_>, database: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.config.temp)
            .with_context(|| format!("Failed to create temp directory {:?}", self.config.temp))?;

        let file_name = format!("{}-{}.sql", sanitize(database), ctx.timestamp);
        let target = self.config.temp.join(&file_name);
        let partial = self.config.temp.join(format!("{}.part", file_name));
        claim_target(&target)?;

        let option_file = MysqlOptionFile::create(
            self.config.user.as_deref(),
            self.config.password.as_ref(),
        )?;

        let mut args = connection_args(&self.config, option_file.as_ref());
        args.extend(self.config.extra_args.iter().cloned());
        args.push(format!("--result-file={}", path_arg(&partial)?));
        args.push(database.to_string());

        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();

        if let Err(e) = ctx.executor.run_command("mysqldump", &arg_refs, None, ctx.timeout) {
            remove_quietly(&partial);
            return Err(e).with_context(|| format!("mysqldump of '{}' failed", database));
        }

        // The option file only needs to outlive the call
        drop(option_file);

        if !partial.is_file() {
            anyhow::bail!("mysqldump did not write {:?}", partial);
        }

        fs::rename(&partial, &target)
            .with_context(|| format!("Failed to move {:?} into place", partial))?;

        info!("Dumped database '{}' to {}", database, target.display());

        Ok(target)
    }
}

impl BackupSource for DumpTask {
    fn produce(&self, ctx: &StageContext<'_>) -> Production {
        let mut production = Production::default();

        for database in &self.databases {
            let unit = format!("{}/{}", self.source, database);

            match self.dump_database(ctx, database) {
                Ok(path) => production
                    .artifacts
                    .push((unit, Artifact::raw(path, &self.source))),
                Err(e) => {
                    warn!("Skipping '{}': {:#}", unit, e);
                    production.failures.push(BackupError::production(&unit, &e));
                }
            }
        }

        production
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Mysqldump
    }
}

/// Databases to dump: the explicit list, or the server listing minus system
/// schemas and exclusions
pub fn effective_databases(
    executor: &dyn CommandExecutor,
    config: &DumpSourceConfig,
    timeout: Option<Duration>,
) -> Result<Vec<String>> {
    if !config.all_databases_except_system {
        return Ok(config.databases.clone());
    }

    let listed = list_databases(executor, config, timeout)?;
    let resolved = resolve_databases(&listed, &config.exclude_databases);

    debug!(
        "Resolved {} of {} listed databases: {:?}",
        resolved.len(),
        listed.len(),
        resolved
    );

    Ok(resolved)
}

/// `listed - (exclude + system schemas)`, keeping listing order
pub fn resolve_databases(listed: &[String], exclude: &[String]) -> Vec<String> {
    listed
        .iter()
        .filter(|db| !DEFAULT_SYSTEM_DATABASES.contains(&db.as_str()))
        .filter(|db| !exclude.contains(db))
        .cloned()
        .collect()
}

/// Ask the server for its databases (`SHOW DATABASES`)
pub fn list_databases(
    executor: &dyn CommandExecutor,
    config: &DumpSourceConfig,
    timeout: Option<Duration>,
) -> Result<Vec<String>> {
    let option_file = MysqlOptionFile::create(config.user.as_deref(), config.password.as_ref())?;

    let mut args = connection_args(config, option_file.as_ref());
    args.extend(
        ["--batch", "--skip-column-names", "--execute", "SHOW DATABASES"]
            .iter()
            .map(|s| s.to_string()),
    );

    let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
    let stdout = executor
        .run_command_stdout("mysql", &arg_refs, None, timeout)
        .context("Failed to list databases")?;

    Ok(stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// Connection options shared by `mysql` and `mysqldump`.
/// The option file argument has to come first or the client ignores it.
fn connection_args(
    config: &DumpSourceConfig,
    option_file: Option<&MysqlOptionFile>,
) -> Vec<String> {
    let mut args = Vec::new();

    if let Some(file) = option_file {
        args.push(file.argument());
    }
    if let Some(ref host) = config.host {
        args.push(format!("--host={}", host));
    }
    if let Some(port) = config.port {
        args.push(format!("--port={}", port));
    }

    args
}

/// Make a database or source name safe to use as a file name component
pub(crate) fn sanitize(name: &str) -> String {
    name.replace(['/', '\\'], "_")
}

/// Artifacts are never replaced: another unit sharing the temp directory may
/// already own a file under this name
pub(crate) fn claim_target(target: &Path) -> Result<()> {
    if target.exists() {
        anyhow::bail!(
            "{:?} already exists; another source writes to the same temp directory",
            target
        );
    }
    Ok(())
}

fn remove_quietly(path: &Path) {
    if path.exists() {
        if let Err(e) = fs::remove_file(path) {
            warn!("Failed to remove partial dump {:?}: {}", path, e);
        }
    }
}
