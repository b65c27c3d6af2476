use std::time::Duration;

use cudnnenv_installer::{FetchProgress, NoProgress};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::render::OutputStyle;

const SIZED_TEMPLATE: &str =
    "{spinner:.cyan.bold} {msg:<24} [{bar:30.cyan/blue}] {bytes}/{total_bytes} {bytes_per_sec} {eta}";
const UNSIZED_TEMPLATE: &str = "{spinner:.cyan.bold} {msg:<24} {bytes} {bytes_per_sec}";

/// Download bar on stderr; only used when stdout is an interactive terminal.
pub(crate) struct DownloadProgress {
    bar: ProgressBar,
}

impl DownloadProgress {
    pub(crate) fn for_style(style: OutputStyle) -> Box<dyn FetchProgress> {
        match style {
            OutputStyle::Plain => Box::new(NoProgress),
            OutputStyle::Rich => Box::new(Self {
                bar: ProgressBar::hidden(),
            }),
        }
    }
}

impl FetchProgress for DownloadProgress {
    fn start(&self, url: &str, total_bytes: Option<u64>) {
        let template = if total_bytes.is_some() {
            SIZED_TEMPLATE
        } else {
            UNSIZED_TEMPLATE
        };
        if let Ok(style) = ProgressStyle::with_template(template) {
            self.bar.set_style(style.progress_chars("=>-"));
        }
        if let Some(total) = total_bytes {
            self.bar.set_length(total);
        }
        self.bar.set_message(download_label(url).to_string());
        self.bar.set_draw_target(ProgressDrawTarget::stderr());
        self.bar.enable_steady_tick(Duration::from_millis(80));
    }

    fn advance(&self, bytes: u64) {
        self.bar.inc(bytes);
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

pub(crate) fn download_label(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or(url)
}
