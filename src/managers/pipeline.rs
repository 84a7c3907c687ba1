//! Shared post-produce pipeline
//!
//! Every produced artifact goes through the same fixed sequence:
//! compress -> encrypt -> upload -> cleanup. Each stage is skipped when its
//! configuration is absent, and a failure stops the remaining stages for that
//! artifact only.

use crate::artifact::{Artifact, ArtifactOutcome};
use crate::config::{Compression, ResolvedPipeline};
use crate::error::BackupError;
use crate::stages::{self, ObjectStore};
use crate::utils::CommandExecutor;
use std::fs;
use std::time::Duration;
use tracing::{error, info, warn};

/// Collaborators and per-run values shared by all tasks
pub struct StageContext<'a> {
    pub executor: &'a dyn CommandExecutor,
    pub store: &'a dyn ObjectStore,
    /// Per external call, if configured
    pub timeout: Option<Duration>,
    /// Timestamp embedded in artifact names, fixed for the whole run
    pub timestamp: String,
}

/// Run compress -> encrypt -> upload -> cleanup on one artifact
pub fn process_artifact(
    ctx: &StageContext<'_>,
    unit: &str,
    artifact: Artifact,
    pipeline: &ResolvedPipeline,
) -> ArtifactOutcome {
    let mut outcome = ArtifactOutcome {
        unit: unit.to_string(),
        path: artifact.path.clone(),
        stage: artifact.stage,
        uploaded_key: None,
        cleaned_up: false,
        error: None,
    };

    match run_stages(ctx, artifact, pipeline, &mut outcome) {
        Ok(()) => info!("Finished '{}': {}", unit, outcome.path.display()),
        Err(e) => {
            error!("'{}' failed at {} stage: {}", unit, e.stage(), e);
            outcome.error = Some(e);
        }
    }

    outcome
}

fn run_stages(
    ctx: &StageContext<'_>,
    artifact: Artifact,
    pipeline: &ResolvedPipeline,
    outcome: &mut ArtifactOutcome,
) -> Result<(), BackupError> {
    let mut artifact = artifact;

    if pipeline.compress != Compression::None {
        artifact = stages::compress(ctx.executor, artifact, pipeline.compress, ctx.timeout)?;
        record(outcome, &artifact);
    }

    if let Some(ref encryption) = pipeline.encryption {
        artifact = stages::encrypt(ctx.executor, artifact, encryption, ctx.timeout)?;
        record(outcome, &artifact);
    }

    let Some(ref destination) = pipeline.destination else {
        if pipeline.cleanup {
            info!(
                "No destination for '{}', keeping {}",
                outcome.unit,
                artifact.path.display()
            );
        }
        return Ok(());
    };

    let receipt = stages::upload(ctx.store, &artifact, destination)?;
    outcome.uploaded_key = Some(receipt.key);

    // Only reached after a successful upload
    if pipeline.cleanup {
        match fs::remove_file(&artifact.path) {
            Ok(()) => {
                info!("Removed local artifact {}", artifact.path.display());
                outcome.cleaned_up = true;
            }
            Err(e) => warn!(
                "Uploaded but failed to remove {}: {}",
                artifact.path.display(),
                e
            ),
        }
    }

    Ok(())
}

fn record(outcome: &mut ArtifactOutcome, artifact: &Artifact) {
    outcome.path = artifact.path.clone();
    outcome.stage = artifact.stage;
}

/// Human-readable stage list, e.g. `gzip -> gpg(ops@example.org) -> s3(offsite) -> cleanup`
pub fn describe(pipeline: &ResolvedPipeline) -> String {
    let mut steps = Vec::new();

    if let Some(program) = pipeline.compress.program() {
        steps.push(program.to_string());
    }
    if let Some(ref encryption) = pipeline.encryption {
        steps.push(format!("gpg({})", encryption.recipient));
    }
    if let Some(ref destination) = pipeline.destination {
        steps.push(format!("s3({})", destination.name));
        if pipeline.cleanup {
            steps.push("cleanup".to_string());
        }
    }

    if steps.is_empty() {
        "keep raw".to_string()
    } else {
        steps.join(" -> ")
    }
}
