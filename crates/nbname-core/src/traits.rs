//! Core traits and error types for notebook lookup.

use std::{fmt, path::PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{server::ServerDescriptor, session::SessionRecord};

/// What the caller wants back from a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Notebook file name without its extension.
    Name,
    /// Absolute path of the notebook file.
    Path,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name => f.write_str("name"),
            Self::Path => f.write_str("path"),
        }
    }
}

/// The kernel identity could not be established.
#[derive(Debug, Error)]
pub enum KernelIdError {
    #[error("Not running inside a kernel")]
    NoKernel,
    #[error("Ambiguous kernel connection files: {0:?}")]
    Ambiguous(Vec<PathBuf>),
    #[error("Connection file name carries no kernel id: {0}")]
    MalformedConnectionFile(String),
}

/// A single candidate server could not be used.
///
/// Never returned to callers of the locator: the candidate is skipped.
#[derive(Debug, Error)]
pub enum CandidateError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid server URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("HTTP status {0}")]
    Status(u16),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Lookup error surfaced to callers.
#[derive(Debug, Error)]
pub enum LocateError {
    #[error("Can't identify the notebook {0}.")]
    NotFound(Mode),
}

/// Process-level facts the locator needs about the running kernel.
///
/// Implemented by [`crate::context::KernelProcess`] for the live process and
/// by fakes in tests.
pub trait ExecutionContext: Send + Sync {
    /// Path of the kernel's connection file.
    ///
    /// # Errors
    /// Returns error if there is no kernel, or more than one candidate.
    fn connection_file(&self) -> Result<PathBuf, KernelIdError>;

    /// Notebook file injected by an embedding IDE, if any.
    fn ide_notebook_file(&self) -> Option<PathBuf>;

    /// Look up an environment variable.
    fn env_var(&self, key: &str) -> Option<String>;
}

/// Fetches the live session list of one notebook server.
pub trait SessionClient: Send + Sync {
    /// List the sessions of `server`, authenticating with `token` if given.
    ///
    /// # Errors
    /// Returns error if the server is unreachable or answers with garbage.
    fn list_sessions(
        &self,
        server: &ServerDescriptor,
        token: Option<&str>,
    ) -> Result<Vec<SessionRecord>, CandidateError>;
}
