//! Values flowing between pipeline stages and the outcomes reported per unit

use crate::error::BackupError;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Processing state of a local artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactStage {
    Raw,
    Compressed,
    Encrypted,
}

/// A local file produced by a backup stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    /// Logical source name from the configuration
    pub source: String,
    pub stage: ArtifactStage,
}

impl Artifact {
    pub fn raw(path: impl Into<PathBuf>, source: &str) -> Self {
        Self {
            path: path.into(),
            source: source.to_string(),
            stage: ArtifactStage::Raw,
        }
    }

    /// File name component, used as the object name on upload
    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|n| n.to_str())
    }

    /// Replace this artifact with the output of the next stage
    pub(crate) fn advance(self, path: PathBuf, stage: ArtifactStage) -> Self {
        Self {
            path,
            source: self.source,
            stage,
        }
    }
}

/// Append a suffix to the full file name (`a.tar` + `.gz` = `a.tar.gz`)
pub fn with_appended_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Mysqldump,
    Directory,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Mysqldump => write!(f, "mysqldump"),
            SourceKind::Directory => write!(f, "directory"),
        }
    }
}

/// Result of running the post-produce pipeline on one artifact
#[derive(Debug, Clone)]
pub struct ArtifactOutcome {
    /// Sub-unit label, e.g. `main/app` for one database of a dump source
    pub unit: String,
    /// Last known local path of the artifact
    pub path: PathBuf,
    pub stage: ArtifactStage,
    /// Object key when an upload succeeded
    pub uploaded_key: Option<String>,
    /// Whether the local file was removed after upload
    pub cleaned_up: bool,
    pub error: Option<BackupError>,
}

impl ArtifactOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Outcome of one backup task (a source, or one database of an expanded source)
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub source: String,
    pub unit: String,
    pub kind: SourceKind,
    pub artifacts: Vec<ArtifactOutcome>,
    /// Failures that happened before an artifact existed
    pub errors: Vec<BackupError>,
}

impl TaskOutcome {
    pub fn failed(source: &str, unit: &str, kind: SourceKind, error: BackupError) -> Self {
        Self {
            source: source.to_string(),
            unit: unit.to_string(),
            kind,
            artifacts: Vec::new(),
            errors: vec![error],
        }
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty() && self.artifacts.iter().all(ArtifactOutcome::is_success)
    }

    /// Paths of artifacts that are still on local disk
    pub fn local_artifacts(&self) -> Vec<&Path> {
        self.artifacts
            .iter()
            .filter(|a| !a.cleaned_up)
            .map(|a| a.path.as_path())
            .collect()
    }

    /// Every error recorded for this task, production failures first
    pub fn all_errors(&self) -> Vec<&BackupError> {
        self.errors
            .iter()
            .chain(self.artifacts.iter().filter_map(|a| a.error.as_ref()))
            .collect()
    }

    pub fn error_detail(&self) -> Option<String> {
        let errors = self.all_errors();
        if errors.is_empty() {
            return None;
        }
        Some(
            errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

/// Aggregated outcome of a whole run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub outcomes: Vec<TaskOutcome>,
    pub duration: Duration,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(TaskOutcome::is_success)
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn failures(&self) -> impl Iterator<Item = &TaskOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }
}
