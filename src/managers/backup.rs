//! Backup runner - turns the configuration into tasks and executes them

use crate::artifact::{RunSummary, SourceKind, TaskOutcome};
use crate::config::{
    resolve_pipeline, validate_config, Config, ConfigError, DirSourceConfig, DumpSourceConfig,
    ResolvedPipeline,
};
use crate::error::BackupError;
use crate::managers::notification::NotificationManager;
use crate::managers::pipeline::{self, StageContext};
use crate::stages::ObjectStore;
use crate::strategies::mysqldump::{self, DumpTask};
use crate::strategies::{BackupTask, DirectoryTask, TaskKind};
use crate::utils::CommandExecutor;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Format of the per-run timestamp embedded in artifact names
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// A task ready to run, or a unit that already failed while planning
#[derive(Debug)]
pub enum PlannedTask {
    Ready(BackupTask),
    Unresolved(TaskOutcome),
}

impl PlannedTask {
    pub fn unit(&self) -> &str {
        match self {
            PlannedTask::Ready(task) => &task.unit,
            PlannedTask::Unresolved(outcome) => &outcome.unit,
        }
    }
}

/// Static description of a configured source, for `list`
#[derive(Debug, Clone)]
pub struct SourcePlan {
    pub name: String,
    pub kind: SourceKind,
    /// What gets backed up
    pub target: String,
    /// Stage chain, see [`pipeline::describe`]
    pub pipeline: String,
}

pub struct BackupRunner {
    config: Config,
    executor: Box<dyn CommandExecutor>,
    store: Box<dyn ObjectStore>,
    timestamp: Option<String>,
    notification_manager: Option<NotificationManager>,
}

impl BackupRunner {
    pub fn new(
        config: Config,
        executor: Box<dyn CommandExecutor>,
        store: Box<dyn ObjectStore>,
    ) -> Self {
        let notification_manager = if !config.notifications.discord_webhook_url.is_empty() {
            Some(NotificationManager::new(config.notifications.clone()))
        } else {
            None
        };

        Self {
            config,
            executor,
            store,
            timestamp: None,
            notification_manager,
        }
    }

    /// Use a fixed timestamp instead of the current local time
    pub fn with_timestamp(mut self, timestamp: &str) -> Self {
        self.timestamp = Some(timestamp.to_string());
        self
    }

    fn timeout(&self) -> Option<Duration> {
        self.config.global.timeout_seconds.map(Duration::from_secs)
    }

    /// Validate the configuration and expand it into a flat, ordered task list.
    ///
    /// Dump sources come first, then directories, each in file order. A source
    /// with `all_databases_except_system` becomes one task per database; if the
    /// server cannot be listed, that source becomes a failed unit instead.
    pub fn build_tasks(&self) -> Result<Vec<PlannedTask>, ConfigError> {
        validate_config(&self.config)?;

        let mut tasks = Vec::new();

        for (name, source) in &self.config.sources.mysqldump {
            let pipeline = dump_pipeline(name, source, &self.config)?;

            if !source.all_databases_except_system {
                tasks.push(PlannedTask::Ready(BackupTask {
                    source: name.clone(),
                    unit: name.clone(),
                    kind: TaskKind::Dump(DumpTask::new(
                        name,
                        source.clone(),
                        source.databases.clone(),
                    )),
                    pipeline,
                }));
                continue;
            }

            match mysqldump::effective_databases(self.executor.as_ref(), source, self.timeout()) {
                Ok(databases) => {
                    if databases.is_empty() {
                        warn!("Source '{}': no databases left after exclusions", name);
                    }
                    for database in databases {
                        tasks.push(PlannedTask::Ready(BackupTask {
                            source: name.clone(),
                            unit: format!("{}/{}", name, database),
                            kind: TaskKind::Dump(DumpTask::new(
                                name,
                                source.clone(),
                                vec![database],
                            )),
                            pipeline: pipeline.clone(),
                        }));
                    }
                }
                Err(e) => {
                    error!("Source '{}': {:#}", name, e);
                    tasks.push(PlannedTask::Unresolved(TaskOutcome::failed(
                        name,
                        name,
                        SourceKind::Mysqldump,
                        BackupError::production(name, &e),
                    )));
                }
            }
        }

        for (name, source) in &self.config.sources.directories {
            tasks.push(PlannedTask::Ready(BackupTask {
                source: name.clone(),
                unit: name.clone(),
                kind: TaskKind::Directory(DirectoryTask::new(name, source.clone())),
                pipeline: directory_pipeline(name, source, &self.config)?,
            }));
        }

        Ok(tasks)
    }

    /// Run every task in order. Configuration errors abort before anything
    /// executes; unit failures are collected in the summary.
    pub fn run(&self) -> Result<RunSummary, ConfigError> {
        let start = Instant::now();
        let timestamp = self
            .timestamp
            .clone()
            .unwrap_or_else(|| chrono::Local::now().format(TIMESTAMP_FORMAT).to_string());

        let tasks = self.build_tasks()?;

        info!("Starting backup run {} with {} task(s)", timestamp, tasks.len());

        let ctx = StageContext {
            executor: self.executor.as_ref(),
            store: self.store.as_ref(),
            timeout: self.timeout(),
            timestamp,
        };

        let mut outcomes = Vec::with_capacity(tasks.len());
        for planned in tasks {
            let outcome = match planned {
                PlannedTask::Ready(task) => task.run(&ctx),
                PlannedTask::Unresolved(outcome) => outcome,
            };

            if outcome.is_success() {
                info!("Backup of '{}' succeeded", outcome.unit);
            } else {
                error!(
                    "Backup of '{}' failed: {}",
                    outcome.unit,
                    outcome.error_detail().unwrap_or_default()
                );
            }
            outcomes.push(outcome);
        }

        let summary = RunSummary {
            outcomes,
            duration: start.elapsed(),
        };

        info!(
            "Backup run finished in {:.2}s: {} succeeded, {} failed",
            summary.duration.as_secs_f64(),
            summary.succeeded(),
            summary.failed()
        );

        if let Some(ref manager) = self.notification_manager {
            if let Err(e) = manager.notify_run(&summary) {
                warn!("Failed to send notification: {:#}", e);
            }
        }

        Ok(summary)
    }
}

/// Describe every configured source without running anything
pub fn source_plans(config: &Config) -> Result<Vec<SourcePlan>, ConfigError> {
    validate_config(config)?;

    let mut plans = Vec::new();

    for (name, source) in &config.sources.mysqldump {
        let target = if source.all_databases_except_system {
            if source.exclude_databases.is_empty() {
                "all databases except system".to_string()
            } else {
                format!(
                    "all databases except system and {}",
                    source.exclude_databases.join(", ")
                )
            }
        } else {
            source.databases.join(", ")
        };

        plans.push(SourcePlan {
            name: name.clone(),
            kind: SourceKind::Mysqldump,
            target,
            pipeline: pipeline::describe(&dump_pipeline(name, source, config)?),
        });
    }

    for (name, source) in &config.sources.directories {
        let mut target = source.path.display().to_string();
        if source.incremental {
            target.push_str(" (incremental)");
        }

        plans.push(SourcePlan {
            name: name.clone(),
            kind: SourceKind::Directory,
            target,
            pipeline: pipeline::describe(&directory_pipeline(name, source, config)?),
        });
    }

    Ok(plans)
}

fn dump_pipeline(
    name: &str,
    source: &DumpSourceConfig,
    config: &Config,
) -> Result<ResolvedPipeline, ConfigError> {
    resolve_pipeline(
        name,
        source.compress,
        source.encryption.as_deref(),
        source.destination.as_deref(),
        source.cleanup,
        config,
    )
}

fn directory_pipeline(
    name: &str,
    source: &DirSourceConfig,
    config: &Config,
) -> Result<ResolvedPipeline, ConfigError> {
    resolve_pipeline(
        name,
        source.compress,
        source.encryption.as_deref(),
        source.destination.as_deref(),
        source.cleanup,
        config,
    )
}
