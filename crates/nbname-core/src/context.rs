//! Execution context of the running kernel.

use std::{
    ffi::{OsStr, OsString},
    path::{Path, PathBuf},
};

use crate::traits::{ExecutionContext, KernelIdError};

/// Variable an embedding IDE injects to name the open notebook.
pub const IDE_NOTEBOOK_VAR: &str = "__vsc_ipynb_file__";

/// Launch flags a kernelspec uses to hand over `{connection_file}`.
const CONNECTION_FILE_FLAGS: &[&str] = &["-f", "--f", "--connection-file"];

/// The live kernel process.
///
/// The connection file comes from the kernel's launch arguments unless one
/// was given explicitly; everything else is read from the environment.
#[derive(Debug, Clone, Default)]
pub struct KernelProcess {
    args: Vec<String>,
    connection_file: Option<PathBuf>,
}

impl KernelProcess {
    /// Context for the current process.
    #[must_use]
    pub fn current() -> Self {
        Self::from_args(
            std::env::args_os()
                .skip(1)
                .map(|a| a.to_string_lossy().into_owned()),
        )
    }

    /// Context for a process launched with `args` (program name excluded).
    #[must_use]
    pub fn from_args<I>(args: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            connection_file: None,
        }
    }

    /// Use `path` as the connection file instead of scanning arguments.
    #[must_use]
    pub fn with_connection_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.connection_file = Some(path.into());
        self
    }
}

impl ExecutionContext for KernelProcess {
    fn connection_file(&self) -> Result<PathBuf, KernelIdError> {
        if let Some(ref path) = self.connection_file {
            return Ok(path.clone());
        }

        let mut found = connection_files_from_args(&self.args);
        match found.len() {
            0 => Err(KernelIdError::NoKernel),
            1 => Ok(found.remove(0)),
            _ => Err(KernelIdError::Ambiguous(found)),
        }
    }

    fn ide_notebook_file(&self) -> Option<PathBuf> {
        ide_file_from(std::env::var_os(IDE_NOTEBOOK_VAR))
    }

    fn env_var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Notebook file from a raw IDE variable value; empty counts as unset.
fn ide_file_from(value: Option<OsString>) -> Option<PathBuf> {
    value.filter(|v| !v.is_empty()).map(PathBuf::from)
}

/// Distinct connection-file paths named in `args`, in order of appearance.
fn connection_files_from_args(args: &[String]) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = Vec::new();
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        let value = if CONNECTION_FILE_FLAGS.contains(&arg.as_str()) {
            iter.next().cloned()
        } else {
            CONNECTION_FILE_FLAGS.iter().find_map(|flag| {
                arg.strip_prefix(flag)
                    .and_then(|rest| rest.strip_prefix('='))
                    .map(str::to_string)
            })
        };

        if let Some(value) = value.filter(|v| !v.is_empty()) {
            let path = PathBuf::from(value);
            if !found.contains(&path) {
                found.push(path);
            }
        }
    }

    found
}

/// Extract the kernel id from a connection file path.
///
/// `kernel-<id>.json` yields `<id>`: everything after the first `-` up to
/// the first `.`.
///
/// # Errors
/// Returns error if the file name has no `-` or an empty id.
pub fn kernel_id_from_connection_file(path: &Path) -> Result<String, KernelIdError> {
    let malformed = || KernelIdError::MalformedConnectionFile(path.display().to_string());

    let file_name = path.file_name().and_then(OsStr::to_str).ok_or_else(malformed)?;
    let (_, rest) = file_name.split_once('-').ok_or_else(malformed)?;
    let id = rest.split('.').next().unwrap_or_default();

    if id.is_empty() {
        Err(malformed())
    } else {
        Ok(id.to_string())
    }
}

/// Kernel id of the kernel `ctx` runs in.
///
/// # Errors
/// Returns error if the kernel cannot be identified.
pub fn kernel_id<C: ExecutionContext + ?Sized>(ctx: &C) -> Result<String, KernelIdError> {
    kernel_id_from_connection_file(&ctx.connection_file()?)
}
