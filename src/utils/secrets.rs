//! Secret values and call-scoped credential handles
//!
//! Passwords never go on a command line. For MySQL tools they are written to a
//! private option file that lives only for the duration of one external call.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

/// A string that is redacted in Debug output
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Access the secret value. Do not log the result.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretString(***)")
    }
}

impl From<&str> for SecretString {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Temporary MySQL option file carrying the client credentials
///
/// The file is created with owner-only permissions and removed on drop.
pub struct MysqlOptionFile {
    file: NamedTempFile,
}

impl MysqlOptionFile {
    /// Write an option file for the given credentials.
    /// Returns `None` when there is nothing to pass, so the client falls back
    /// to its own defaults (e.g. `~/.my.cnf`).
    pub fn create(user: Option<&str>, password: Option<&SecretString>) -> Result<Option<Self>> {
        if user.is_none() && password.is_none() {
            return Ok(None);
        }

        let mut file = tempfile::Builder::new()
            .prefix(".backup-orchestrator-")
            .suffix(".cnf")
            .tempfile()
            .context("Failed to create MySQL option file")?;

        let mut contents = String::from("[client]\n");
        if let Some(user) = user {
            contents.push_str(&format!("user=\"{}\"\n", escape_option_value(user)));
        }
        if let Some(password) = password {
            contents.push_str(&format!(
                "password=\"{}\"\n",
                escape_option_value(password.expose())
            ));
        }

        file.write_all(contents.as_bytes())
            .context("Failed to write MySQL option file")?;
        file.flush().context("Failed to flush MySQL option file")?;

        debug!("Created MySQL option file: {:?}", file.path());

        Ok(Some(Self { file }))
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Argument for mysql/mysqldump; must be the first option on the command line
    pub fn argument(&self) -> String {
        format!("--defaults-extra-file={}", self.file.path().display())
    }
}

fn escape_option_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
