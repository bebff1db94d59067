//! Notebook lookup.

use std::{fmt, path::PathBuf};

use crate::{
    config::LocatorConfig,
    context::{KernelProcess, kernel_id},
    server::{ServerDescriptor, list_running_servers},
    session::HttpSessionClient,
    traits::{ExecutionContext, LocateError, Mode, SessionClient},
};

/// Where the notebook was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupResult {
    /// An embedding IDE named the file directly.
    Ide { file: PathBuf },
    /// A server session owns the kernel.
    Session {
        server: ServerDescriptor,
        relative_path: String,
    },
}

impl LookupResult {
    /// Notebook file name without its extension.
    #[must_use]
    pub fn name(&self) -> Option<String> {
        match self {
            Self::Ide { file } => file
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned()),
            Self::Session { relative_path, .. } => {
                Some(notebook_stem(relative_path).to_string()).filter(|s| !s.is_empty())
            }
        }
    }

    /// Notebook path: server root joined with the session path, or the raw
    /// path when no root is known.
    #[must_use]
    pub fn path(&self) -> Option<PathBuf> {
        match self {
            Self::Ide { file } => Some(file.clone()),
            Self::Session {
                server,
                relative_path,
            } => {
                let relative = relative_path.trim_start_matches('/');
                Some(server.root_dir().map_or_else(
                    || PathBuf::from(relative_path),
                    |root| root.join(relative),
                ))
            }
        }
    }
}

/// Final path component of a server-relative path, extension removed.
fn notebook_stem(path: &str) -> &str {
    let file = path.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(path);
    match file.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file,
    }
}

/// Result of [`NotebookLocator::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    Name(String),
    Path(PathBuf),
}

impl fmt::Display for Resolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => f.write_str(name),
            Self::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Finds the notebook that owns the current kernel.
///
/// Every call re-reads the runtime directory and re-queries the servers;
/// nothing is cached.
pub struct NotebookLocator<C, S>
where
    C: ExecutionContext,
    S: SessionClient,
{
    context: C,
    client: S,
    config: LocatorConfig,
}

impl NotebookLocator<KernelProcess, HttpSessionClient> {
    /// Locator for the current process, configured from the environment.
    #[must_use]
    pub fn current() -> Self {
        Self::with_config(KernelProcess::current(), LocatorConfig::from_env())
    }

    /// Locator for `context` talking HTTP with the configured timeout.
    #[must_use]
    pub fn with_config(context: KernelProcess, config: LocatorConfig) -> Self {
        let client = HttpSessionClient::new(config.request_timeout);
        Self::new(context, client, config)
    }
}

impl<C, S> NotebookLocator<C, S>
where
    C: ExecutionContext,
    S: SessionClient,
{
    /// Create a locator from its parts.
    #[must_use]
    pub const fn new(context: C, client: S, config: LocatorConfig) -> Self {
        Self {
            context,
            client,
            config,
        }
    }

    /// Candidate servers, most recently started first.
    #[must_use]
    pub fn servers(&self) -> Vec<ServerDescriptor> {
        match self.config.resolved_runtime_dir() {
            Some(dir) => list_running_servers(&dir),
            None => {
                tracing::debug!("No Jupyter runtime directory");
                Vec::new()
            }
        }
    }

    /// Find the notebook, or `None` if nothing claims the kernel.
    #[must_use]
    pub fn find(&self) -> Option<LookupResult> {
        let kernel_id = match kernel_id(&self.context) {
            Ok(id) => id,
            Err(e) => {
                tracing::debug!("Cannot determine kernel id: {e}");
                return None;
            }
        };

        if let Some(file) = self.context.ide_notebook_file() {
            tracing::debug!(file = %file.display(), "Using IDE-provided notebook file");
            return Some(LookupResult::Ide { file });
        }

        self.servers().into_iter().find_map(|server| {
            let relative_path = self.find_session(&server, &kernel_id)?;
            Some(LookupResult::Session {
                server,
                relative_path,
            })
        })
    }

    /// Resolve the notebook name or path.
    ///
    /// # Errors
    /// Returns `NotFound` if no server claims the kernel.
    pub fn resolve(&self, mode: Mode) -> Result<Resolved, LocateError> {
        match mode {
            Mode::Name => self.name().map(Resolved::Name),
            Mode::Path => self.path().map(Resolved::Path),
        }
    }

    /// Notebook file name without its extension.
    ///
    /// # Errors
    /// Returns `NotFound` if no server claims the kernel.
    pub fn name(&self) -> Result<String, LocateError> {
        self.find()
            .and_then(|found| found.name())
            .ok_or(LocateError::NotFound(Mode::Name))
    }

    /// Absolute path of the notebook file.
    ///
    /// # Errors
    /// Returns `NotFound` if no server claims the kernel.
    pub fn path(&self) -> Result<PathBuf, LocateError> {
        self.find()
            .and_then(|found| found.path())
            .ok_or(LocateError::NotFound(Mode::Path))
    }

    /// Token for `server`: its own, else the managed-deployment one.
    fn token_for(&self, server: &ServerDescriptor) -> Option<String> {
        server.own_token().map(str::to_string).or_else(|| {
            self.context
                .env_var(&self.config.token_env_var)
                .filter(|t| !t.is_empty())
        })
    }

    /// Path of the session on `server` running `kernel_id`.
    fn find_session(&self, server: &ServerDescriptor, kernel_id: &str) -> Option<String> {
        let token = self.token_for(server);
        let sessions = match self.client.list_sessions(server, token.as_deref()) {
            Ok(sessions) => sessions,
            Err(e) => {
                // Stale entries in the runtime directory are normal
                tracing::debug!(server = %server.url, source = ?server.source, "Skipping server: {e}");
                return None;
            }
        };

        tracing::trace!(server = %server.url, count = sessions.len(), "Scanning sessions");
        sessions
            .iter()
            .filter(|s| s.kernel_id() == Some(kernel_id))
            .find_map(|s| s.notebook_path().map(str::to_string))
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        fs,
        path::Path,
        sync::Mutex,
        time::{Duration, SystemTime},
    };

    use tempfile::TempDir;

    use super::*;
    use crate::{
        session::{KernelRef, NotebookRef, SessionRecord},
        traits::{CandidateError, KernelIdError},
    };

    const KERNEL: &str = "3f1c2a9e-55aa-4b1e-9f0e-2d7c1b6a8e11";

    #[derive(Default)]
    struct FakeContext {
        connection_file: Option<PathBuf>,
        ide_file: Option<PathBuf>,
        env: HashMap<String, String>,
    }

    impl FakeContext {
        fn in_kernel() -> Self {
            Self {
                connection_file: Some(PathBuf::from(format!("/rt/kernel-{KERNEL}.json"))),
                ..Default::default()
            }
        }
    }

    impl ExecutionContext for FakeContext {
        fn connection_file(&self) -> Result<PathBuf, KernelIdError> {
            self.connection_file.clone().ok_or(KernelIdError::NoKernel)
        }

        fn ide_notebook_file(&self) -> Option<PathBuf> {
            self.ide_file.clone()
        }

        fn env_var(&self, key: &str) -> Option<String> {
            self.env.get(key).cloned()
        }
    }

    /// Serves canned session lists by server URL and records every call.
    #[derive(Default)]
    struct FakeClient {
        sessions: HashMap<String, Vec<SessionRecord>>,
        calls: Mutex<Vec<(String, Option<String>)>>,
    }

    impl FakeClient {
        fn with(mut self, url: &str, sessions: Vec<SessionRecord>) -> Self {
            self.sessions.insert(url.to_string(), sessions);
            self
        }

        fn calls(&self) -> Vec<(String, Option<String>)> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl SessionClient for FakeClient {
        fn list_sessions(
            &self,
            server: &ServerDescriptor,
            token: Option<&str>,
        ) -> Result<Vec<SessionRecord>, CandidateError> {
            self.calls
                .lock()
                .unwrap()
                .push((server.url.clone(), token.map(str::to_string)));
            self.sessions.get(&server.url).cloned().ok_or_else(|| {
                CandidateError::Io(std::io::Error::from(std::io::ErrorKind::ConnectionRefused))
            })
        }
    }

    fn session(kernel_id: &str, path: &str) -> SessionRecord {
        SessionRecord {
            kernel: Some(KernelRef {
                id: kernel_id.to_string(),
                name: None,
            }),
            notebook: Some(NotebookRef {
                path: Some(path.to_string()),
                name: None,
            }),
            ..Default::default()
        }
    }

    fn write_server(dir: &Path, file: &str, port: u16, token: &str, age_secs: u64) -> String {
        let url = format!("http://localhost:{port}/");
        let body = format!(r#"{{"url": "{url}", "token": "{token}", "root_dir": "/home/u/work"}}"#);
        let path = dir.join(file);
        fs::write(&path, body).unwrap();
        fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(SystemTime::now() - Duration::from_secs(age_secs))
            .unwrap();
        url
    }

    fn locator(
        ctx: FakeContext,
        client: FakeClient,
        dir: &TempDir,
    ) -> NotebookLocator<FakeContext, FakeClient> {
        NotebookLocator::new(
            ctx,
            client,
            LocatorConfig::default().with_runtime_dir(dir.path()),
        )
    }

    #[test]
    fn test_notebook_stem() {
        assert_eq!(notebook_stem("Untitled.ipynb"), "Untitled");
        assert_eq!(notebook_stem("a/b/report.v2.ipynb"), "report.v2");
        assert_eq!(notebook_stem("win\\dir\\nb.ipynb"), "nb");
        assert_eq!(notebook_stem(".ipynb"), ".ipynb");
        assert_eq!(notebook_stem("noext"), "noext");
    }

    #[test]
    fn test_resolves_name_and_path() {
        let tmp = TempDir::new().unwrap();
        let url = write_server(tmp.path(), "jpserver-1.json", 8888, "tok", 5);
        let client = FakeClient::default().with(
            &url,
            vec![
                session("other-kernel", "elsewhere.ipynb"),
                session(KERNEL, "projects/analysis.ipynb"),
            ],
        );
        let locator = locator(FakeContext::in_kernel(), client, &tmp);

        assert_eq!(locator.name().unwrap(), "analysis");
        assert_eq!(
            locator.path().unwrap(),
            PathBuf::from("/home/u/work/projects/analysis.ipynb")
        );
        assert_eq!(
            locator.resolve(Mode::Name).unwrap(),
            Resolved::Name("analysis".into())
        );
    }

    #[test]
    fn test_no_servers_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let locator = locator(FakeContext::in_kernel(), FakeClient::default(), &tmp);

        assert!(matches!(locator.name(), Err(LocateError::NotFound(Mode::Name))));
        assert!(matches!(locator.path(), Err(LocateError::NotFound(Mode::Path))));
    }

    #[test]
    fn test_no_matching_session_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let url = write_server(tmp.path(), "jpserver-1.json", 8888, "", 5);
        let client = FakeClient::default().with(&url, vec![session("other", "x.ipynb")]);
        let locator = locator(FakeContext::in_kernel(), client, &tmp);

        assert!(matches!(
            locator.resolve(Mode::Path),
            Err(LocateError::NotFound(Mode::Path))
        ));
    }

    #[test]
    fn test_not_in_kernel_is_not_found_without_requests() {
        let tmp = TempDir::new().unwrap();
        let url = write_server(tmp.path(), "jpserver-1.json", 8888, "", 5);
        let client = FakeClient::default().with(&url, vec![session(KERNEL, "x.ipynb")]);
        let locator = locator(FakeContext::default(), client, &tmp);

        assert!(locator.name().is_err());
        assert!(locator.client.calls().is_empty());
    }

    #[test]
    fn test_stale_server_skipped_for_live_one() {
        let tmp = TempDir::new().unwrap();
        let _stale = write_server(tmp.path(), "nbserver-1.json", 8001, "", 1);
        let live = write_server(tmp.path(), "jpserver-2.json", 8002, "", 60);
        let client = FakeClient::default().with(&live, vec![session(KERNEL, "live.ipynb")]);
        let locator = locator(FakeContext::in_kernel(), client, &tmp);

        assert_eq!(locator.name().unwrap(), "live");
        let urls: Vec<_> = locator.client.calls().into_iter().map(|(u, _)| u).collect();
        assert_eq!(urls, vec!["http://localhost:8001/", "http://localhost:8002/"]);
    }

    #[test]
    fn test_first_match_wins_and_stops_querying() {
        let tmp = TempDir::new().unwrap();
        let newer = write_server(tmp.path(), "jpserver-1.json", 8001, "", 1);
        let older = write_server(tmp.path(), "jpserver-2.json", 8002, "", 60);
        let client = FakeClient::default()
            .with(&newer, vec![session(KERNEL, "newer.ipynb")])
            .with(&older, vec![session(KERNEL, "older.ipynb")]);
        let locator = locator(FakeContext::in_kernel(), client, &tmp);

        assert_eq!(locator.name().unwrap(), "newer");
        assert_eq!(locator.client.calls().len(), 1);
    }

    #[test]
    fn test_ide_file_short_circuits_servers() {
        let tmp = TempDir::new().unwrap();
        let url = write_server(tmp.path(), "jpserver-1.json", 8888, "", 5);
        let client = FakeClient::default().with(&url, vec![session(KERNEL, "server.ipynb")]);
        let ctx = FakeContext {
            ide_file: Some(PathBuf::from("/code/proj/explore.ipynb")),
            ..FakeContext::in_kernel()
        };
        let locator = locator(ctx, client, &tmp);

        assert_eq!(
            locator.path().unwrap(),
            PathBuf::from("/code/proj/explore.ipynb")
        );
        assert_eq!(locator.name().unwrap(), "explore");
        assert!(locator.client.calls().is_empty());
    }

    #[test]
    fn test_env_token_used_when_server_has_none() {
        let tmp = TempDir::new().unwrap();
        let url = write_server(tmp.path(), "jpserver-1.json", 8888, "", 5);
        let client = FakeClient::default().with(&url, vec![session(KERNEL, "x.ipynb")]);
        let mut ctx = FakeContext::in_kernel();
        ctx.env
            .insert("JUPYTERHUB_API_TOKEN".into(), "hub-token".into());
        let locator = locator(ctx, client, &tmp);

        locator.name().unwrap();
        assert_eq!(
            locator.client.calls(),
            vec![(url, Some("hub-token".to_string()))]
        );
    }

    #[test]
    fn test_server_token_beats_env_token() {
        let tmp = TempDir::new().unwrap();
        let url = write_server(tmp.path(), "jpserver-1.json", 8888, "own", 5);
        let client = FakeClient::default().with(&url, vec![session(KERNEL, "x.ipynb")]);
        let mut ctx = FakeContext::in_kernel();
        ctx.env
            .insert("JUPYTERHUB_API_TOKEN".into(), "hub-token".into());
        let locator = locator(ctx, client, &tmp);

        locator.name().unwrap();
        assert_eq!(locator.client.calls(), vec![(url, Some("own".to_string()))]);
    }

    #[test]
    fn test_no_token_anywhere() {
        let tmp = TempDir::new().unwrap();
        let url = write_server(tmp.path(), "jpserver-1.json", 8888, "", 5);
        let client = FakeClient::default().with(&url, vec![]);
        let locator = locator(FakeContext::in_kernel(), client, &tmp);

        assert!(locator.name().is_err());
        assert_eq!(locator.client.calls(), vec![(url, None)]);
    }

    #[test]
    fn test_malformed_server_file_does_not_block_lookup() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("jpserver-9.json"), "{ truncated").unwrap();
        let url = write_server(tmp.path(), "nbserver-1.json", 8888, "", 60);
        let client = FakeClient::default().with(&url, vec![session(KERNEL, "ok.ipynb")]);
        let locator = locator(FakeContext::in_kernel(), client, &tmp);

        assert_eq!(locator.name().unwrap(), "ok");
    }

    #[test]
    fn test_path_without_root_dir_is_raw() {
        let result = LookupResult::Session {
            server: ServerDescriptor {
                url: "http://localhost:8888/".into(),
                ..Default::default()
            },
            relative_path: "sub/nb.ipynb".into(),
        };
        assert_eq!(result.path(), Some(PathBuf::from("sub/nb.ipynb")));
        assert_eq!(result.name(), Some("nb".to_string()));
    }
}
