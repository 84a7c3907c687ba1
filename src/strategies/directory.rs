//! Directory archive source (GNU tar)

use super::mysqldump::{claim_target, sanitize};
use super::{BackupSource, Production};
use crate::artifact::{with_appended_suffix, Artifact, SourceKind};
use crate::config::DirSourceConfig;
use crate::error::BackupError;
use crate::managers::pipeline::StageContext;
use crate::utils::command::path_arg;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct DirectoryTask {
    pub source: String,
    pub config: DirSourceConfig,
}

impl DirectoryTask {
    pub fn new(source: &str, config: DirSourceConfig) -> Self {
        Self {
            source: source.to_string(),
            config,
        }
    }

    fn archive(&self, ctx: &StageContext<'_>) -> Result<PathBuf> {
        let path = &self.config.path;
        if !path.is_dir() {
            anyhow::bail!("Source directory {:?} does not exist", path);
        }

        let (parent, base) = split_path(path)?;

        fs::create_dir_all(&self.config.temp)
            .with_context(|| format!("Failed to create temp directory {:?}", self.config.temp))?;

        let file_name = format!("{}-{}.tar", sanitize(&self.source), ctx.timestamp);
        let target = self.config.temp.join(&file_name);
        let partial = self.config.temp.join(format!("{}.part", file_name));
        claim_target(&target)?;

        let snapshot = match (self.config.incremental, &self.config.incremental_snapshot) {
            (true, Some(snapshot)) => Some(SnapshotCopy::prepare(snapshot)?),
            _ => None,
        };

        let mut args = vec![
            "--create".to_string(),
            "--file".to_string(),
            path_arg(&partial)?.to_string(),
        ];
        if let Some(ref snapshot) = snapshot {
            args.push(format!("--listed-incremental={}", path_arg(&snapshot.working)?));
        }
        args.push("-C".to_string());
        args.push(path_arg(&parent)?.to_string());
        args.push(base);

        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let result = ctx
            .executor
            .run_command("tar", &arg_refs, None, ctx.timeout)
            .context("tar failed")
            .and_then(|_| {
                if partial.is_file() {
                    Ok(())
                } else {
                    Err(anyhow::anyhow!("tar did not write {:?}", partial))
                }
            });

        if let Err(e) = result {
            remove_quietly(&partial);
            if let Some(snapshot) = snapshot {
                snapshot.discard();
            }
            return Err(e);
        }

        fs::rename(&partial, &target)
            .with_context(|| format!("Failed to move {:?} into place", partial))?;

        if let Some(snapshot) = snapshot {
            snapshot.commit()?;
        }

        info!("Archived {} to {}", path.display(), target.display());

        Ok(target)
    }
}

impl BackupSource for DirectoryTask {
    fn produce(&self, ctx: &StageContext<'_>) -> Production {
        match self.archive(ctx) {
            Ok(path) => Production {
                artifacts: vec![(self.source.clone(), Artifact::raw(path, &self.source))],
                failures: Vec::new(),
            },
            Err(e) => Production {
                artifacts: Vec::new(),
                failures: vec![BackupError::production(&self.source, &e)],
            },
        }
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Directory
    }
}

/// Working copy of a `--listed-incremental` snapshot.
///
/// tar only ever touches the copy; the real snapshot is replaced by rename
/// after a successful archive and left alone otherwise.
struct SnapshotCopy {
    snapshot: PathBuf,
    working: PathBuf,
}

impl SnapshotCopy {
    fn prepare(snapshot: &Path) -> Result<Self> {
        let working = with_appended_suffix(snapshot, ".tmp");

        if let Some(parent) = snapshot.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create snapshot directory {:?}", parent))?;
            }
        }

        // A stale copy from an interrupted run must not leak into this one
        remove_quietly(&working);

        let has_state = fs::metadata(snapshot).map(|m| m.len() > 0).unwrap_or(false);
        if has_state {
            fs::copy(snapshot, &working)
                .with_context(|| format!("Failed to copy snapshot {:?}", snapshot))?;
            debug!("Incremental backup against {:?}", snapshot);
        } else {
            info!("No snapshot at {:?}, taking a full backup", snapshot);
        }

        Ok(Self {
            snapshot: snapshot.to_path_buf(),
            working,
        })
    }

    fn commit(self) -> Result<()> {
        fs::rename(&self.working, &self.snapshot)
            .with_context(|| format!("Failed to update snapshot {:?}", self.snapshot))
    }

    fn discard(self) {
        remove_quietly(&self.working);
    }
}

/// `/srv/www` -> (`/srv`, `www`), so the archive holds relative paths.
/// The filesystem root has no parent and becomes (`/`, `.`).
fn split_path(path: &Path) -> Result<(PathBuf, String)> {
    let absolute = fs::canonicalize(path)
        .with_context(|| format!("Failed to resolve {:?}", path))?;

    let Some(name) = absolute.file_name() else {
        return Ok((absolute, ".".to_string()));
    };

    let base = name
        .to_str()
        .with_context(|| format!("Cannot archive {:?}: directory name is not UTF-8", path))?
        .to_string();

    let parent = absolute
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("/"));

    Ok((parent, base))
}

fn remove_quietly(path: &Path) {
    if path.exists() {
        if let Err(e) = fs::remove_file(path) {
            warn!("Failed to remove {:?}: {}", path, e);
        }
    }
}
