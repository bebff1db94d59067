//! Find the notebook file that launched the running Jupyter kernel.
//!
//! A kernel does not know which document it serves; the notebook server
//! does. This crate provides:
//! - `KernelProcess` - Kernel identity from the process's launch arguments
//! - `list_running_servers` - Server metadata from the Jupyter runtime directory
//! - `HttpSessionClient` - Session lists over the server's REST API
//! - `NotebookLocator` - The lookup itself, plus `name()` and `path()` shortcuts

use std::path::PathBuf;

pub mod config;
pub mod context;
pub mod locator;
pub mod server;
pub mod session;
pub mod traits;

pub use config::LocatorConfig;
pub use context::KernelProcess;
pub use locator::{LookupResult, NotebookLocator, Resolved};
pub use server::{ServerDescriptor, list_running_servers};
pub use session::{HttpSessionClient, SessionRecord};
pub use traits::{ExecutionContext, LocateError, Mode, SessionClient};

/// Name of the current kernel's notebook, without its extension.
///
/// # Errors
/// Returns `NotFound` if the notebook cannot be identified.
pub fn name() -> Result<String, LocateError> {
    NotebookLocator::current().name()
}

/// Absolute path of the current kernel's notebook.
///
/// # Errors
/// Returns `NotFound` if the notebook cannot be identified.
pub fn path() -> Result<PathBuf, LocateError> {
    NotebookLocator::current().path()
}
