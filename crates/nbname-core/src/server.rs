//! Notebook server metadata files.

use std::{
    fs,
    path::{Path, PathBuf},
    time::SystemTime,
};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::traits::CandidateError;

/// File name prefixes for server metadata: classic notebook and
/// jupyter_server.
pub const SERVER_FILE_PREFIXES: &[&str] = &["nbserver-", "jpserver-"];

const SERVER_FILE_SUFFIX: &str = ".json";

/// A running (or once running) notebook server, as described by its
/// metadata file in the runtime directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerDescriptor {
    /// Base URL, usually with a trailing slash.
    pub url: String,
    /// Authentication token; empty when the server has none.
    #[serde(default)]
    pub token: Option<String>,
    /// Whether the server is password protected.
    #[serde(default)]
    pub password: bool,
    /// Root directory (jupyter_server).
    #[serde(default)]
    pub root_dir: Option<PathBuf>,
    /// Root directory (classic notebook).
    #[serde(default)]
    pub notebook_dir: Option<PathBuf>,
    #[serde(default)]
    pub pid: Option<u32>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub secure: bool,
    /// Metadata file this descriptor was read from.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl ServerDescriptor {
    /// Read a descriptor from a metadata file.
    ///
    /// # Errors
    /// Returns error if the file cannot be read or is not a descriptor.
    pub fn from_file(path: &Path) -> Result<Self, CandidateError> {
        let raw = fs::read_to_string(path)?;
        let mut descriptor: Self = serde_json::from_str(&raw)?;
        descriptor.source = Some(path.to_path_buf());
        Ok(descriptor)
    }

    /// The server's own token, if it has a non-empty one.
    #[must_use]
    pub fn own_token(&self) -> Option<&str> {
        self.token.as_deref().filter(|t| !t.is_empty())
    }

    /// Directory notebook paths are relative to.
    #[must_use]
    pub fn root_dir(&self) -> Option<&Path> {
        [&self.root_dir, &self.notebook_dir]
            .into_iter()
            .flatten()
            .map(PathBuf::as_path)
            .find(|p| !p.as_os_str().is_empty())
    }

    /// URL of the session-listing endpoint.
    ///
    /// # Errors
    /// Returns error if the server URL does not parse.
    pub fn sessions_url(&self, token: Option<&str>) -> Result<Url, url::ParseError> {
        let mut base = Url::parse(&self.url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let mut url = base.join("api/sessions")?;
        if let Some(token) = token {
            url.query_pairs_mut().append_pair("token", token);
        }
        Ok(url)
    }
}

/// Whether `name` looks like a server metadata file.
#[must_use]
pub fn is_server_file(name: &str) -> bool {
    name.ends_with(SERVER_FILE_SUFFIX)
        && SERVER_FILE_PREFIXES
            .iter()
            .any(|prefix| name.starts_with(prefix))
}

/// Server metadata files in `runtime_dir`, most recently modified first.
#[must_use]
pub fn server_files(runtime_dir: &Path) -> Vec<PathBuf> {
    let entries = match fs::read_dir(runtime_dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::debug!(dir = %runtime_dir.display(), "Cannot read runtime directory: {e}");
            return Vec::new();
        }
    };

    let mut files: Vec<(SystemTime, PathBuf)> = entries
        .flatten()
        .filter(|entry| entry.file_name().to_str().is_some_and(is_server_file))
        .map(|entry| {
            let modified = entry
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            (modified, entry.path())
        })
        .collect();

    // Sort by mtime descending
    files.sort_by(|a, b| b.0.cmp(&a.0));

    files.into_iter().map(|(_, path)| path).collect()
}

/// Descriptors of servers that may be running, most recent first.
///
/// Files that cannot be read or parsed are skipped.
#[must_use]
pub fn list_running_servers(runtime_dir: &Path) -> Vec<ServerDescriptor> {
    server_files(runtime_dir)
        .into_iter()
        .filter_map(|path| match ServerDescriptor::from_file(&path) {
            Ok(descriptor) => Some(descriptor),
            Err(e) => {
                tracing::debug!(file = %path.display(), "Skipping server file: {e}");
                None
            }
        })
        .collect()
}
