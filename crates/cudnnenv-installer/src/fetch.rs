use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context};
use tracing::debug;

use crate::error::StoreError;
use crate::interrupt;

/// Retrieves a release archive into `dest`. Implementations must leave
/// nothing at `dest` when they fail.
pub trait ArchiveFetcher {
    fn fetch(&self, url: &str, dest: &Path) -> Result<u64, StoreError>;
}

/// Download progress sink; the CLI renders it, tests ignore it.
pub trait FetchProgress {
    fn start(&self, url: &str, total_bytes: Option<u64>);
    fn advance(&self, bytes: u64);
    fn finish(&self);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl FetchProgress for NoProgress {
    fn start(&self, _url: &str, _total_bytes: Option<u64>) {}
    fn advance(&self, _bytes: u64) {}
    fn finish(&self) {}
}

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);
const POLL_INTERVAL: Duration = Duration::from_millis(100);
const CHUNK_SIZE: usize = 64 * 1024;

/// Streams archives over HTTP(S) with `reqwest`'s blocking client.
///
/// The transfer runs on a worker thread so the calling thread can keep
/// polling the interrupt flag and the idle deadline even while the server
/// sends nothing. A stalled worker is abandoned; its partial file lives in
/// the install's scratch directory and goes away with it.
pub struct HttpFetcher {
    progress: Box<dyn FetchProgress>,
    user_agent: String,
    idle_timeout: Duration,
}

enum DownloadEvent {
    Started(Option<u64>),
    Chunk(u64),
    Done(anyhow::Result<u64>),
}

/// Forwards progress from the worker thread to the caller.
struct ChannelProgress {
    events: Sender<DownloadEvent>,
}

impl FetchProgress for ChannelProgress {
    fn start(&self, _url: &str, total_bytes: Option<u64>) {
        let _ = self.events.send(DownloadEvent::Started(total_bytes));
    }

    fn advance(&self, bytes: u64) {
        let _ = self.events.send(DownloadEvent::Chunk(bytes));
    }

    fn finish(&self) {}
}

/// Finishes the progress display on every exit path once it was started.
struct ProgressScope<'a> {
    progress: &'a dyn FetchProgress,
    started: bool,
}

impl Drop for ProgressScope<'_> {
    fn drop(&mut self) {
        if self.started {
            self.progress.finish();
        }
    }
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::with_progress(Box::new(NoProgress))
    }

    pub fn with_progress(progress: Box<dyn FetchProgress>) -> Self {
        Self {
            progress,
            user_agent: format!("cudnnenv/{}", env!("CARGO_PKG_VERSION")),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }

    /// How long the transfer may go without receiving any data.
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    fn download_to(&self, url: &str, part_path: &Path) -> Result<u64, StoreError> {
        let (events, receiver) = mpsc::channel();
        let worker_url = url.to_string();
        let worker_path = part_path.to_path_buf();
        let user_agent = self.user_agent.clone();
        thread::Builder::new()
            .name("cudnnenv-download".to_string())
            .spawn(move || {
                let progress = ChannelProgress {
                    events: events.clone(),
                };
                let result = download_blocking(&worker_url, &user_agent, &worker_path, &progress);
                let _ = events.send(DownloadEvent::Done(result));
            })
            .context("failed to spawn download thread")?;

        self.await_download(url, &receiver)
    }

    fn await_download(
        &self,
        url: &str,
        receiver: &Receiver<DownloadEvent>,
    ) -> Result<u64, StoreError> {
        let mut scope = ProgressScope {
            progress: self.progress.as_ref(),
            started: false,
        };
        let mut last_activity = Instant::now();
        loop {
            match receiver.recv_timeout(POLL_INTERVAL) {
                Ok(DownloadEvent::Started(total_bytes)) => {
                    self.progress.start(url, total_bytes);
                    scope.started = true;
                    last_activity = Instant::now();
                }
                Ok(DownloadEvent::Chunk(bytes)) => {
                    self.progress.advance(bytes);
                    last_activity = Instant::now();
                }
                Ok(DownloadEvent::Done(result)) => {
                    let written = result.with_context(|| format!("failed to download {url}"))?;
                    if interrupt::interrupted() {
                        return Err(StoreError::Interrupted);
                    }
                    return Ok(written);
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(anyhow!("download worker for {url} exited without a result").into());
                }
            }

            if interrupt::interrupted() {
                debug!(url, "download interrupted; abandoning transfer");
                return Err(StoreError::Interrupted);
            }
            if last_activity.elapsed() >= self.idle_timeout {
                return Err(anyhow!(
                    "download of {url} stalled: no data received for {}s",
                    self.idle_timeout.as_secs_f32()
                )
                .into());
            }
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveFetcher for HttpFetcher {
    fn fetch(&self, url: &str, dest: &Path) -> Result<u64, StoreError> {
        let part_path = part_path_for(dest);
        debug!(url, dest = %dest.display(), "downloading archive");

        let written = match self.download_to(url, &part_path) {
            Ok(written) => written,
            Err(err) => {
                let _ = fs::remove_file(&part_path);
                return Err(err);
            }
        };

        fs::rename(&part_path, dest).with_context(|| {
            format!(
                "failed to move downloaded archive into place: {}",
                dest.display()
            )
        })?;
        debug!(url, bytes = written, "download complete");
        Ok(written)
    }
}

fn download_blocking(
    url: &str,
    user_agent: &str,
    part_path: &Path,
    progress: &dyn FetchProgress,
) -> anyhow::Result<u64> {
    // Built per fetch: the blocking client spawns a runtime thread, which
    // commands that never download should not pay for. The caller enforces
    // the idle deadline, so no overall timeout caps large archives here.
    let client = reqwest::blocking::Client::builder()
        .user_agent(user_agent)
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(None)
        .build()
        .context("failed to build HTTP client")?;

    let mut response = client
        .get(url)
        .send()
        .with_context(|| format!("failed to request {url}"))?;
    let status = response.status();
    if !status.is_success() {
        return Err(anyhow!("download of {url} failed with HTTP status {status}"));
    }
    if interrupt::interrupted() {
        return Ok(0);
    }

    let file = File::create(part_path)
        .with_context(|| format!("failed to create {}", part_path.display()))?;
    let mut writer = BufWriter::new(file);

    progress.start(url, response.content_length());
    let written = stream_body(&mut response, &mut writer, progress)?;
    writer
        .flush()
        .with_context(|| format!("failed to flush {}", part_path.display()))?;
    Ok(written)
}

/// Copies `reader` into `writer` chunk by chunk, stopping early once an
/// interrupt has been recorded.
pub(crate) fn stream_body<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    progress: &dyn FetchProgress,
) -> anyhow::Result<u64> {
    let mut buffer = vec![0_u8; CHUNK_SIZE];
    let mut written = 0_u64;
    loop {
        if interrupt::interrupted() {
            return Ok(written);
        }
        let read = reader.read(&mut buffer).context("failed to read response body")?;
        if read == 0 {
            return Ok(written);
        }
        writer
            .write_all(&buffer[..read])
            .context("failed to write archive chunk")?;
        written += read as u64;
        progress.advance(read as u64);
    }
}

fn part_path_for(dest: &Path) -> PathBuf {
    dest.with_file_name(format!(
        "{}.part",
        dest.file_name()
            .and_then(|v| v.to_str())
            .unwrap_or("archive")
    ))
}
