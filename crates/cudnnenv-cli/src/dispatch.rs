use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use cudnnenv_core::{Catalog, Platform};
use cudnnenv_installer::{
    default_user_root, Confirm, HttpFetcher, InstallOutcome, StoreLayout, TarExtractor,
    UninstallOutcome, VersionStore,
};
use tracing::debug;

use crate::completion::write_completions_script;
use crate::progress::DownloadProgress;
use crate::render::{
    current_output_style, format_activation_lines, format_env_lines, format_versions_json,
    format_versions_output, render_status_line, OutputStyle, NO_ACTIVE_VERSION,
};
use crate::{Cli, Commands};

const ROOT_ENV: &str = "CUDNN_HOME";
const CATALOG_ENV: &str = "CUDNNENV_CATALOG";

/// Everything one invocation needs, resolved once from flags and the
/// environment.
pub(crate) struct Session {
    store: VersionStore,
    platform: Option<Platform>,
    catalog_path: Option<PathBuf>,
    style: OutputStyle,
}

impl Session {
    pub(crate) fn from_cli(cli: &Cli) -> Result<Self> {
        let root = resolve_root(cli.root.as_deref())?;
        let style = current_output_style();
        let store = VersionStore::new(
            StoreLayout::new(root),
            Box::new(HttpFetcher::with_progress(DownloadProgress::for_style(style))),
            Box::new(TarExtractor),
        );
        Ok(Self::new(
            store,
            Platform::host(),
            resolve_catalog_path(cli.catalog.as_deref()),
            style,
        ))
    }

    pub(crate) fn new(
        store: VersionStore,
        platform: Option<Platform>,
        catalog_path: Option<PathBuf>,
        style: OutputStyle,
    ) -> Self {
        Self {
            store,
            platform,
            catalog_path,
            style,
        }
    }

    fn platform(&self) -> Result<Platform> {
        self.platform
            .ok_or_else(|| anyhow!("unsupported platform: {}", std::env::consts::OS))
    }

    fn catalog(&self) -> Result<Catalog> {
        let platform = self.platform()?;
        match &self.catalog_path {
            Some(path) => {
                debug!(path = %path.display(), "loading catalog from file");
                Catalog::from_path(path, platform)
            }
            None => Catalog::embedded(platform),
        }
    }

    fn lib_dir(&self) -> &'static str {
        self.platform.unwrap_or(Platform::Linux).lib_dir()
    }

    fn root(&self) -> &Path {
        self.store.layout().root()
    }
}

pub(crate) fn run_command<W: Write>(
    session: &Session,
    command: Commands,
    out: &mut W,
    confirm: &mut dyn Confirm,
) -> Result<()> {
    let store = &session.store;
    match command {
        Commands::Install { version } => {
            let catalog = session.catalog()?;
            let outcome = store.install(&catalog, &version)?;
            if outcome == InstallOutcome::AlreadyPresent {
                debug!(version = %version, "already installed; activated existing copy");
            }
            print_activation(session, &version, out)?;
        }
        Commands::InstallFile { file, version } => {
            store.install_file(&file, &version)?;
            print_activation(session, &version, out)?;
        }
        Commands::Activate { version } => {
            store.activate(&version)?;
            print_activation(session, &version, out)?;
        }
        Commands::Uninstall { version, yes } => {
            let outcome = if yes {
                store.uninstall(&version, &mut |_: &str| -> Result<bool> { Ok(true) })?
            } else {
                store.uninstall(&version, confirm)?
            };
            if outcome == UninstallOutcome::Removed {
                print_lines(
                    out,
                    &[render_status_line(
                        session.style,
                        "ok",
                        &format!("Uninstalled {version}"),
                    )],
                )?;
            }
        }
        Commands::Version => {
            let current = store.current()?;
            print_lines(
                out,
                &[current.unwrap_or_else(|| NO_ACTIVE_VERSION.to_string())],
            )?;
        }
        Commands::Versions { json } => {
            let available = session.catalog()?.ids();
            let installed = store.list_installed()?;
            let active = store.current()?;
            if json {
                let rendered = format_versions_json(&available, &installed, active.as_deref())?;
                print_lines(out, &[rendered])?;
            } else {
                print_lines(
                    out,
                    &format_versions_output(
                        &available,
                        &installed,
                        active.as_deref(),
                        session.style,
                    ),
                )?;
            }
        }
        Commands::Deactivate => store.deactivate()?,
        Commands::Env { shell } => {
            print_lines(out, &format_env_lines(shell, session.root(), session.lib_dir()))?;
        }
        Commands::Completions { shell } => write_completions_script(shell, out)?,
    }
    Ok(())
}

fn print_activation<W: Write>(session: &Session, id: &str, out: &mut W) -> Result<()> {
    print_lines(
        out,
        &format_activation_lines(session.style, id, session.root(), session.lib_dir()),
    )
}

fn print_lines<W: Write>(out: &mut W, lines: &[String]) -> Result<()> {
    for line in lines {
        writeln!(out, "{line}").context("failed to write output")?;
    }
    out.flush().context("failed to flush output")
}

pub(crate) fn resolve_root(flag: Option<&Path>) -> Result<PathBuf> {
    if let Some(root) = flag {
        return Ok(root.to_path_buf());
    }
    match std::env::var_os(ROOT_ENV) {
        Some(value) if !value.is_empty() => Ok(PathBuf::from(value)),
        _ => default_user_root(),
    }
}

fn resolve_catalog_path(flag: Option<&Path>) -> Option<PathBuf> {
    flag.map(Path::to_path_buf).or_else(|| {
        std::env::var_os(CATALOG_ENV)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
    })
}
