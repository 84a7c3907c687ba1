//! Utilities for running commands with proper error handling and timeouts

use anyhow::{Context, Result};
use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::time::Duration;
use tracing::{debug, error};

/// Run a command with optional timeout
pub fn run_command(
    program: &str,
    args: &[&str],
    working_dir: Option<&Path>,
    timeout: Option<Duration>,
) -> Result<Output> {
    let resolved = which::which(program)
        .with_context(|| format!("{} not found in PATH", program))?;

    let mut cmd = Command::new(resolved);
    cmd.args(args);
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    if let Some(dir) = working_dir {
        cmd.current_dir(dir);
    }

    debug!("Running command: {} {}", program, args.join(" "));

    let output = if let Some(timeout_duration) = timeout {
        // Blocking callers get a private runtime just for the timeout
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to create runtime for timed command")?;

        runtime.block_on(async {
            let mut child = tokio::process::Command::from(cmd);
            child.kill_on_drop(true);

            match tokio::time::timeout(timeout_duration, child.output()).await {
                Ok(output) => output.with_context(|| format!("Failed to execute {}", program)),
                Err(_) => Err(anyhow::anyhow!(
                    "{} timed out after {:?}",
                    program,
                    timeout_duration
                )),
            }
        })?
    } else {
        cmd.output()
            .with_context(|| format!("Failed to execute {}", program))?
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        error!("Command failed: {} {}", program, args.join(" "));
        error!("Stderr: {}", stderr.trim());
        anyhow::bail!(
            "{} failed with exit code {:?}: {}",
            program,
            output.status.code(),
            stderr.trim()
        );
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    if !stdout.is_empty() {
        debug!("Command output: {}", stdout.trim());
    }

    Ok(output)
}

/// Run a command and return stdout as string
pub fn run_command_stdout(
    program: &str,
    args: &[&str],
    working_dir: Option<&Path>,
    timeout: Option<Duration>,
) -> Result<String> {
    let output = run_command(program, args, working_dir, timeout)?;
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Whether a program can be found in PATH
pub fn tool_available(program: &str) -> bool {
    which::which(program).is_ok()
}

/// Borrow a path as a command argument
pub fn path_arg(path: &Path) -> Result<&str> {
    path.to_str()
        .with_context(|| format!("Path is not valid UTF-8: {:?}", path))
}
