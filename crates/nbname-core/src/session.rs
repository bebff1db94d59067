//! Session records and the HTTP client that fetches them.

use std::time::Duration;

use reqwest::{StatusCode, blocking::Client};
use serde::{Deserialize, Serialize};

use crate::{
    server::ServerDescriptor,
    traits::{CandidateError, SessionClient},
};

/// Kernel half of a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelRef {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Notebook half of a session (classic notebook server).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotebookRef {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// One entry of `GET /api/sessions`.
///
/// Classic servers put the document path under `notebook.path`,
/// jupyter_server at the top level as `path`. Some send both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(default)]
    pub id: Option<String>,
    /// `null` for a session whose kernel is gone.
    #[serde(default)]
    pub kernel: Option<KernelRef>,
    #[serde(default)]
    pub notebook: Option<NotebookRef>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

impl SessionRecord {
    /// Id of the kernel attached to this session.
    #[must_use]
    pub fn kernel_id(&self) -> Option<&str> {
        self.kernel
            .as_ref()
            .map(|k| k.id.as_str())
            .filter(|id| !id.is_empty())
    }

    /// Document path relative to the server root.
    #[must_use]
    pub fn notebook_path(&self) -> Option<&str> {
        self.notebook
            .as_ref()
            .and_then(|n| n.path.as_deref())
            .or(self.path.as_deref())
            .filter(|p| !p.is_empty())
    }
}

/// Blocking HTTP session client.
///
/// Builds a fresh connection per request so nothing outlives the lookup.
#[derive(Debug, Clone)]
pub struct HttpSessionClient {
    timeout: Duration,
}

impl HttpSessionClient {
    /// Create a client whose requests give up after `timeout`.
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl SessionClient for HttpSessionClient {
    fn list_sessions(
        &self,
        server: &ServerDescriptor,
        token: Option<&str>,
    ) -> Result<Vec<SessionRecord>, CandidateError> {
        let url = server.sessions_url(token)?;
        let client = Client::builder()
            .timeout(self.timeout)
            .no_proxy()
            .build()?;

        tracing::trace!(server = %server.url, authenticated = token.is_some(), "Requesting sessions");
        let response = client.get(url).send()?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(CandidateError::Status(status.as_u16()));
        }

        let body = response.text()?;
        Ok(serde_json::from_str(&body)?)
    }
}
