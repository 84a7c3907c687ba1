//! Backup sources
//!
//! Each configured source becomes a [`BackupTask`]. The task kind decides how
//! raw artifacts are produced; everything after that goes through the shared
//! pipeline in [`crate::managers::pipeline`].

pub mod directory;
pub mod mysqldump;

pub use directory::DirectoryTask;
pub use mysqldump::DumpTask;

use crate::artifact::{Artifact, SourceKind, TaskOutcome};
use crate::config::ResolvedPipeline;
use crate::error::BackupError;
use crate::managers::pipeline::{self, StageContext};
use tracing::info;

/// Raw artifacts produced by a source, plus the units that failed to produce
#[derive(Debug, Default)]
pub struct Production {
    /// `(unit label, artifact)` pairs
    pub artifacts: Vec<(String, Artifact)>,
    pub failures: Vec<BackupError>,
}

/// Something that can produce raw backup artifacts
pub trait BackupSource {
    fn produce(&self, ctx: &StageContext<'_>) -> Production;

    fn kind(&self) -> SourceKind;
}

#[derive(Debug, Clone)]
pub enum TaskKind {
    Dump(DumpTask),
    Directory(DirectoryTask),
}

impl TaskKind {
    fn source(&self) -> &dyn BackupSource {
        match self {
            TaskKind::Dump(task) => task,
            TaskKind::Directory(task) => task,
        }
    }
}

/// One executable unit of work
#[derive(Debug, Clone)]
pub struct BackupTask {
    /// Source name from the configuration
    pub source: String,
    /// Label used in logs and the summary (`main`, or `main/app` when expanded)
    pub unit: String,
    pub kind: TaskKind,
    pub pipeline: ResolvedPipeline,
}

impl BackupTask {
    pub fn source_kind(&self) -> SourceKind {
        self.kind.source().kind()
    }

    /// Produce artifacts and push each one through the pipeline independently
    pub fn run(&self, ctx: &StageContext<'_>) -> TaskOutcome {
        info!(
            "Running {} task '{}' ({})",
            self.source_kind(),
            self.unit,
            pipeline::describe(&self.pipeline)
        );

        let production = self.kind.source().produce(ctx);

        let artifacts = production
            .artifacts
            .into_iter()
            .map(|(unit, artifact)| {
                pipeline::process_artifact(ctx, &unit, artifact, &self.pipeline)
            })
            .collect();

        TaskOutcome {
            source: self.source.clone(),
            unit: self.unit.clone(),
            kind: self.source_kind(),
            artifacts,
            errors: production.failures,
        }
    }
}
