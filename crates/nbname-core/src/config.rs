//! Locator configuration.

use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

/// Default bound on one session request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(500);

/// Environment variable carrying a JupyterHub API token.
pub const DEFAULT_TOKEN_ENV_VAR: &str = "JUPYTERHUB_API_TOKEN";

/// Environment variable overriding the request timeout, in milliseconds.
pub const TIMEOUT_ENV_VAR: &str = "NBNAME_TIMEOUT_MS";

/// Configuration for a [`crate::NotebookLocator`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorConfig {
    /// Directory holding server metadata files. `None` means the Jupyter
    /// runtime directory.
    pub runtime_dir: Option<PathBuf>,

    /// Timeout for each session-list request.
    #[serde(with = "duration_millis")]
    pub request_timeout: Duration,

    /// Environment variable consulted when a server has no token of its own.
    pub token_env_var: String,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            runtime_dir: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            token_env_var: DEFAULT_TOKEN_ENV_VAR.to_string(),
        }
    }
}

impl LocatorConfig {
    /// Defaults, with the timeout taken from `NBNAME_TIMEOUT_MS` if valid.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_timeout_var(std::env::var(TIMEOUT_ENV_VAR).ok().as_deref())
    }

    /// Apply a raw `NBNAME_TIMEOUT_MS` value; invalid or zero values are
    /// ignored.
    #[must_use]
    pub fn with_timeout_var(mut self, raw: Option<&str>) -> Self {
        if let Some(raw) = raw {
            match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => self.request_timeout = Duration::from_millis(ms),
                _ => tracing::warn!(value = %raw, "Ignoring invalid {TIMEOUT_ENV_VAR}"),
            }
        }
        self
    }

    /// Use `dir` instead of the Jupyter runtime directory.
    #[must_use]
    pub fn with_runtime_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.runtime_dir = Some(dir.into());
        self
    }

    /// Set the per-request timeout.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// The directory to scan for server metadata files.
    #[must_use]
    pub fn resolved_runtime_dir(&self) -> Option<PathBuf> {
        self.runtime_dir.clone().or_else(jupyter_runtime_dir)
    }
}

/// Jupyter's runtime directory, as `jupyter --runtime-dir` reports it.
#[must_use]
pub fn jupyter_runtime_dir() -> Option<PathBuf> {
    if let Some(dir) = non_empty_env("JUPYTER_RUNTIME_DIR") {
        return Some(PathBuf::from(dir));
    }
    jupyter_data_dir().map(|d| d.join("runtime"))
}

/// Jupyter's per-user data directory.
#[must_use]
pub fn jupyter_data_dir() -> Option<PathBuf> {
    if let Some(dir) = non_empty_env("JUPYTER_DATA_DIR") {
        return Some(PathBuf::from(dir));
    }

    if cfg!(target_os = "macos") {
        dirs::home_dir().map(|h| h.join("Library").join("Jupyter"))
    } else {
        // %APPDATA% on Windows, $XDG_DATA_HOME or ~/.local/share elsewhere
        dirs::data_dir().map(|d| d.join("jupyter"))
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
