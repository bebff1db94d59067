//! Print the name or path of the notebook that owns a Jupyter kernel.
//!
//! Run with: cargo run -p nbname-cli -- path --connection-file <kernel-*.json>
//!
//! Set `RUST_LOG=nbname_core=debug` to see which servers were tried.

use std::{path::PathBuf, process::ExitCode, time::Duration};

use clap::{Parser, ValueEnum};
use nbname_core::{KernelProcess, LocatorConfig, Mode, NotebookLocator};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "nbname",
    about = "Find the notebook file that launched a Jupyter kernel",
    version
)]
struct Cli {
    /// What to print.
    #[arg(value_enum, default_value_t = Target::Path)]
    target: Target,

    /// Kernel connection file (`kernel-<id>.json` in the runtime directory).
    #[arg(long = "connection-file", short = 'f')]
    connection_file: PathBuf,

    /// Directory holding server metadata files.
    #[arg(long = "runtime-dir", env = "JUPYTER_RUNTIME_DIR")]
    runtime_dir: Option<PathBuf>,

    /// Per-server request timeout in milliseconds. Overrides
    /// `NBNAME_TIMEOUT_MS`.
    #[arg(long = "timeout-ms")]
    timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Target {
    /// Notebook file name without extension.
    Name,
    /// Absolute path of the notebook file.
    Path,
}

impl From<Target> for Mode {
    fn from(target: Target) -> Self {
        match target {
            Target::Name => Self::Name,
            Target::Path => Self::Path,
        }
    }
}

fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();

    match run(&cli) {
        Ok(found) => {
            println!("{found}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Environment configuration with command-line overrides applied.
fn build_config(cli: &Cli) -> LocatorConfig {
    let mut config = LocatorConfig::from_env();
    if let Some(ref dir) = cli.runtime_dir {
        config = config.with_runtime_dir(dir);
    }
    if let Some(ms) = cli.timeout_ms.filter(|ms| *ms > 0) {
        config = config.with_request_timeout(Duration::from_millis(ms));
    }
    config
}

fn run(cli: &Cli) -> anyhow::Result<String> {
    let config = build_config(cli);
    let context = KernelProcess::default().with_connection_file(&cli.connection_file);

    tracing::debug!(?config, "Locating notebook");
    let locator = NotebookLocator::with_config(context, config);
    let found = locator.resolve(cli.target.into())?;
    Ok(found.to_string())
}
