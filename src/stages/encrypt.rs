//! Encryption stage (gpg, recipient mode)

use super::compress::remove_partial;
use crate::artifact::{with_appended_suffix, Artifact, ArtifactStage};
use crate::config::{EncryptionConfig, EncryptionMethod};
use crate::error::BackupError;
use crate::utils::command::path_arg;
use crate::utils::CommandExecutor;
use std::fs;
use std::time::Duration;
use tracing::{info, warn};

/// Encrypt an artifact for a recipient, replacing it with `<file>.gpg`
pub fn encrypt(
    executor: &dyn CommandExecutor,
    artifact: Artifact,
    encryption: &EncryptionConfig,
    timeout: Option<Duration>,
) -> Result<Artifact, BackupError> {
    match encryption.method {
        EncryptionMethod::Gpg => encrypt_gpg(executor, artifact, &encryption.recipient, timeout),
    }
}

fn encrypt_gpg(
    executor: &dyn CommandExecutor,
    artifact: Artifact,
    recipient: &str,
    timeout: Option<Duration>,
) -> Result<Artifact, BackupError> {
    let input = artifact.path.clone();
    let output = with_appended_suffix(&input, ".gpg");
    let fail = |reason: String| BackupError::Encryption {
        path: input.clone(),
        reason,
    };

    let input_arg = path_arg(&input).map_err(|e| fail(format!("{:#}", e)))?;
    let output_arg = path_arg(&output).map_err(|e| fail(format!("{:#}", e)))?;

    let args = [
        "--batch",
        "--yes",
        "--output",
        output_arg,
        "--encrypt",
        "--recipient",
        recipient,
        input_arg,
    ];

    if let Err(e) = executor.run_command("gpg", &args, None, timeout) {
        remove_partial(&output);
        return Err(fail(format!("{:#}", e)));
    }

    if !output.is_file() {
        return Err(fail(format!("gpg did not write {:?}", output)));
    }

    if let Err(e) = fs::remove_file(&input) {
        warn!("Failed to remove unencrypted file {:?}: {}", input, e);
    }

    info!("Encrypted {} -> {}", input.display(), output.display());

    Ok(artifact.advance(output, ArtifactStage::Encrypted))
}
