//! Kaggle API credential discovery.
//!
//! Resolution order:
//! 1. `KAGGLE_USERNAME` + `KAGGLE_KEY` environment variables.
//! 2. An explicit `kaggle.json` path (`--kaggle-config`).
//! 3. `$KAGGLE_CONFIG_DIR/kaggle.json`.
//! 4. `~/.kaggle/kaggle.json`.

use std::fmt;
use std::path::{Path, PathBuf};

use monitor_core::{MonitorError, Result};
use serde::Deserialize;

/// Username / API key pair used for HTTP basic auth.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("key", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Locate credentials from the process environment and filesystem.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        Self::discover_with(explicit, |name| std::env::var(name).ok(), dirs::home_dir())
    }

    /// Same as [`Credentials::discover`] with injectable environment and home
    /// directory.
    pub fn discover_with(
        explicit: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
        home: Option<PathBuf>,
    ) -> Result<Self> {
        if let (Some(username), Some(key)) = (env("KAGGLE_USERNAME"), env("KAGGLE_KEY")) {
            if !username.is_empty() && !key.is_empty() {
                tracing::debug!("using Kaggle credentials from environment");
                return Ok(Self { username, key });
            }
        }

        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        let candidates = [
            env("KAGGLE_CONFIG_DIR").map(|dir| PathBuf::from(dir).join("kaggle.json")),
            home.map(|h| h.join(".kaggle").join("kaggle.json")),
        ];
        for path in candidates.into_iter().flatten() {
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        Err(MonitorError::Credentials(
            "no KAGGLE_USERNAME/KAGGLE_KEY in environment and no kaggle.json found".to_string(),
        ))
    }

    /// Read a `kaggle.json` file (`{"username": ..., "key": ...}`).
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            MonitorError::Credentials(format!("cannot read {}: {}", path.display(), e))
        })?;
        let creds: Credentials = serde_json::from_str(&content).map_err(|e| {
            MonitorError::Credentials(format!("malformed {}: {}", path.display(), e))
        })?;
        if creds.username.is_empty() || creds.key.is_empty() {
            return Err(MonitorError::Credentials(format!(
                "{} has an empty username or key",
                path.display()
            )));
        }
        tracing::debug!(path = %path.display(), "using Kaggle credentials from file");
        Ok(creds)
    }
}
