//! Compression stage (gzip / bzip2)

use crate::artifact::{with_appended_suffix, Artifact, ArtifactStage};
use crate::config::Compression;
use crate::error::BackupError;
use crate::utils::command::path_arg;
use crate::utils::CommandExecutor;
use std::fs;
use std::time::Duration;
use tracing::{info, warn};

/// Compress an artifact in place, replacing it with `<file>.gz` / `<file>.bz2`.
///
/// The uncompressed file is removed only once the compressed one exists.
/// `Compression::None` hands the artifact back untouched.
pub fn compress(
    executor: &dyn CommandExecutor,
    artifact: Artifact,
    algorithm: Compression,
    timeout: Option<Duration>,
) -> Result<Artifact, BackupError> {
    let (Some(program), Some(suffix)) = (algorithm.program(), algorithm.suffix()) else {
        return Ok(artifact);
    };

    let input = artifact.path.clone();
    let output = with_appended_suffix(&input, suffix);
    let fail = |reason: String| BackupError::Compression {
        path: input.clone(),
        reason,
    };

    let input_arg = path_arg(&input).map_err(|e| fail(format!("{:#}", e)))?;

    // -k keeps the input so we decide when it goes away
    if let Err(e) = executor.run_command(program, &["-f", "-k", input_arg], None, timeout) {
        remove_partial(&output);
        return Err(fail(format!("{:#}", e)));
    }

    if !output.is_file() {
        return Err(fail(format!("{} did not write {:?}", program, output)));
    }

    if let Err(e) = fs::remove_file(&input) {
        warn!("Failed to remove uncompressed file {:?}: {}", input, e);
    }

    info!("Compressed {} -> {}", input.display(), output.display());

    Ok(artifact.advance(output, ArtifactStage::Compressed))
}

pub(crate) fn remove_partial(path: &std::path::Path) {
    if path.exists() {
        if let Err(e) = fs::remove_file(path) {
            warn!("Failed to remove partial output {:?}: {}", path, e);
        }
    }
}
