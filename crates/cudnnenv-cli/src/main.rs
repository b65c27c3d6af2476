mod completion;
mod dispatch;
mod progress;
mod prompt;
mod render;


use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use cudnnenv_installer::StoreError;
use tracing_subscriber::EnvFilter;

use crate::dispatch::{run_command, Session};
use crate::prompt::PromptConfirm;
use crate::render::EnvShell;

const LOG_ENV: &str = "CUDNNENV_LOG";
const DEFAULT_LOG_DIRECTIVE: &str = "warn";

#[derive(Parser, Debug)]
#[command(name = "cudnnenv", version)]
#[command(about = "Install and switch between cuDNN versions", long_about = None)]
struct Cli {
    /// Store root; defaults to $CUDNN_HOME, then ~/.cudnn.
    #[arg(long, global = true)]
    root: Option<PathBuf>,
    /// Release catalog TOML; defaults to $CUDNNENV_CATALOG, then the built-in table.
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,
    /// Log filter directive such as `debug` or `cudnnenv_installer=trace`.
    #[arg(long, global = true)]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Download a catalog version and make it active.
    Install { version: String },
    /// Install a local cuDNN archive under VERSION and make it active.
    InstallFile { file: PathBuf, version: String },
    /// Point the active link at an installed version.
    Activate { version: String },
    /// Remove an installed version.
    Uninstall {
        version: String,
        /// Skip the confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },
    /// Print the active version.
    Version,
    /// List catalog and installed versions.
    Versions {
        #[arg(long)]
        json: bool,
    },
    /// Remove the active link.
    Deactivate,
    /// Print environment exports for the active version.
    Env {
        #[arg(long, value_enum, default_value_t = EnvShell::Posix)]
        shell: EnvShell,
    },
    /// Print a shell completion script.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = err.exit_code();
            let _ = err.print();
            return ExitCode::from(u8::try_from(code).unwrap_or(2));
        }
    };

    initialize_tracing(cli.log_level.as_deref());

    let result = Session::from_cli(&cli).and_then(|session| {
        let stdin = io::stdin();
        let mut confirm = PromptConfirm::new(stdin.lock(), io::stdout());
        run_command(&session, cli.command, &mut io::stdout(), &mut confirm)
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(exit_code_for(&err))
        }
    }
}

/// Logs go to stderr so stdout stays machine-readable.
fn initialize_tracing(log_level: Option<&str>) {
    let filter = match log_level {
        Some(directive) => EnvFilter::try_new(directive).ok(),
        None => EnvFilter::try_from_env(LOG_ENV).ok(),
    }
    .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_DIRECTIVE));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn exit_code_for(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<StoreError>()
        .map(StoreError::exit_code)
        .and_then(|code| u8::try_from(code).ok())
        .unwrap_or(1)
}
