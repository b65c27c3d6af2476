use std::collections::BTreeSet;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use anstyle::{AnsiColor, Effects, Style};
use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Serialize;

pub(crate) const NO_ACTIVE_VERSION: &str = "(none)";

const ENV_VARIABLES: [EnvVariable; 3] = [
    EnvVariable::Library("LD_LIBRARY_PATH"),
    EnvVariable::Include("CPATH"),
    EnvVariable::Library("LIBRARY_PATH"),
];

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum OutputStyle {
    Plain,
    Rich,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub(crate) enum EnvShell {
    Posix,
    Fish,
}

#[derive(Copy, Clone, Debug)]
enum EnvVariable {
    Include(&'static str),
    Library(&'static str),
}

pub(crate) fn current_output_style() -> OutputStyle {
    let no_color = std::env::var_os("NO_COLOR").is_some_and(|value| !value.is_empty());
    if no_color || !std::io::stdout().is_terminal() {
        OutputStyle::Plain
    } else {
        OutputStyle::Rich
    }
}

pub(crate) fn render_status_line(style: OutputStyle, status: &str, message: &str) -> String {
    match style {
        OutputStyle::Plain => message.to_string(),
        OutputStyle::Rich => format!("[{}] {message}", status.to_ascii_uppercase()),
    }
}

/// One line per id, sorted, with `* ` marking the active id.
pub(crate) fn format_version_lines<I, S>(ids: I, active: Option<&str>) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let sorted = ids
        .into_iter()
        .map(|id| id.as_ref().to_string())
        .collect::<BTreeSet<_>>();
    sorted
        .into_iter()
        .map(|id| {
            let marker = if active == Some(id.as_str()) { "* " } else { "  " };
            format!("{marker}{id}")
        })
        .collect()
}

pub(crate) fn format_versions_output(
    available: &[String],
    installed: &BTreeSet<String>,
    active: Option<&str>,
    style: OutputStyle,
) -> Vec<String> {
    let mut lines = vec![section_title(style, "Available versions:")];
    lines.extend(highlight_active(
        style,
        format_version_lines(available, active),
    ));
    lines.push(String::new());
    lines.push(section_title(style, "Installed versions:"));
    lines.extend(highlight_active(
        style,
        format_version_lines(installed, active),
    ));
    lines
}

#[derive(Debug, Serialize)]
struct VersionsReport<'a> {
    active: Option<&'a str>,
    available: &'a [String],
    installed: &'a BTreeSet<String>,
}

pub(crate) fn format_versions_json(
    available: &[String],
    installed: &BTreeSet<String>,
    active: Option<&str>,
) -> Result<String> {
    serde_json::to_string_pretty(&VersionsReport {
        active,
        available,
        installed,
    })
    .context("failed to serialize versions report")
}

/// Printed after a version becomes active.
pub(crate) fn format_activation_lines(
    style: OutputStyle,
    id: &str,
    root: &Path,
    lib_dir: &str,
) -> Vec<String> {
    let mut lines = vec![
        render_status_line(style, "ok", &format!("Successfully installed {id}")),
        "Set your environment variables:".to_string(),
        String::new(),
    ];
    let active = root.join("active").join("cuda");
    for variable in ENV_VARIABLES {
        let (name, dir) = variable.resolve(&active, lib_dir);
        lines.push(format!("  {name}={}:${name}", dir.display()));
    }
    lines
}

/// Shell statements suitable for `eval "$(cudnnenv env)"`.
pub(crate) fn format_env_lines(shell: EnvShell, root: &Path, lib_dir: &str) -> Vec<String> {
    let active = root.join("active").join("cuda");
    ENV_VARIABLES
        .iter()
        .map(|variable| {
            let (name, dir) = variable.resolve(&active, lib_dir);
            let dir = escape_double_quote_shell(&dir.display().to_string());
            match shell {
                EnvShell::Posix => format!("export {name}=\"{dir}${{{name}:+:${name}}}\""),
                EnvShell::Fish => format!("set -gx {name} \"{dir}\" ${name}"),
            }
        })
        .collect()
}

impl EnvVariable {
    fn resolve(self, active_cuda: &Path, lib_dir: &str) -> (&'static str, PathBuf) {
        match self {
            Self::Include(name) => (name, active_cuda.join("include")),
            Self::Library(name) => (name, active_cuda.join(lib_dir)),
        }
    }
}

fn escape_double_quote_shell(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('$', "\\$")
        .replace('`', "\\`")
}

fn section_title(style: OutputStyle, title: &str) -> String {
    match style {
        OutputStyle::Plain => title.to_string(),
        OutputStyle::Rich => colorize(section_style(), title),
    }
}

fn highlight_active(style: OutputStyle, lines: Vec<String>) -> Vec<String> {
    if style == OutputStyle::Plain {
        return lines;
    }
    lines
        .into_iter()
        .map(|line| {
            if line.starts_with("* ") {
                colorize(active_style(), &line)
            } else {
                line
            }
        })
        .collect()
}

fn section_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::BrightBlue.into()))
        .effects(Effects::BOLD)
}

fn active_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::BrightGreen.into()))
        .effects(Effects::BOLD)
}

fn colorize(style: Style, text: &str) -> String {
    format!("{}{}{}", style.render(), text, style.render_reset())
}
