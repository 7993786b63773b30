//! Decode process supervision
//!
//! The relay does not decode video itself; an external `ffmpeg` process
//! turns the upstream feed into a continuous MJPEG byte stream on its
//! stdout. [`DecoderSupervisor`] owns that process and the cached
//! [`SourceLocator`](super::locator::SourceLocator): it resolves the address
//! lazily (honoring the TTL), spawns the process, hands the caller its raw
//! output, and reports process exit through the stream handle.

use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use super::error::SourceError;
use super::locator::{SourceLocator, SourceResolver, SourceTarget, YtDlpResolver, LOCATOR_TTL};
use super::{ByteStream, ExitNotice, MediaSource};

/// Decode pipeline configuration
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// How the upstream feed is located
    pub target: SourceTarget,

    /// Resolver binary name or path
    pub ytdlp_bin: String,

    /// Decoder binary name or path
    pub ffmpeg_bin: String,

    /// Output frame rate
    pub frame_rate: u32,

    /// JPEG quality (lower is better)
    pub quality: u32,

    /// Output width; height follows the aspect ratio
    pub scale_width: u32,

    /// Extra video filter appended after scaling (e.g. brightness/contrast)
    pub extra_filter: Option<String>,

    /// Time-to-live of the cached resolved address
    pub locator_ttl: Duration,
}

impl SourceConfig {
    /// Configure a direct-URL source with default decode settings.
    pub fn url(url: impl Into<String>) -> Self {
        Self::new(SourceTarget::Url(url.into()))
    }

    /// Configure a search-query source with default decode settings.
    pub fn search(query: impl Into<String>) -> Self {
        Self::new(SourceTarget::Search(query.into()))
    }

    /// Configure a source with default decode settings.
    pub fn new(target: SourceTarget) -> Self {
        Self {
            target,
            ytdlp_bin: "yt-dlp".into(),
            ffmpeg_bin: "ffmpeg".into(),
            frame_rate: 10,
            quality: 2,
            scale_width: 1280,
            extra_filter: None,
            locator_ttl: LOCATOR_TTL,
        }
    }

    /// Set the output frame rate
    pub fn frame_rate(mut self, fps: u32) -> Self {
        self.frame_rate = fps.max(1);
        self
    }

    /// Set the JPEG quality factor
    pub fn quality(mut self, quality: u32) -> Self {
        self.quality = quality;
        self
    }

    /// Set the output width
    pub fn scale_width(mut self, width: u32) -> Self {
        self.scale_width = width;
        self
    }

    /// Append an extra video filter after scaling
    pub fn extra_filter(mut self, filter: impl Into<String>) -> Self {
        self.extra_filter = Some(filter.into());
        self
    }

    /// Set the locator time-to-live
    pub fn locator_ttl(mut self, ttl: Duration) -> Self {
        self.locator_ttl = ttl;
        self
    }

    /// Set the resolver binary
    pub fn ytdlp_bin(mut self, bin: impl Into<String>) -> Self {
        self.ytdlp_bin = bin.into();
        self
    }

    /// Set the decoder binary
    pub fn ffmpeg_bin(mut self, bin: impl Into<String>) -> Self {
        self.ffmpeg_bin = bin.into();
        self
    }

    /// Decoder argv for the given resolved URL.
    pub(crate) fn ffmpeg_args(&self, url: &str) -> Vec<String> {
        let mut filter = format!("scale={}:-1", self.scale_width);
        if let Some(extra) = &self.extra_filter {
            filter.push(',');
            filter.push_str(extra);
        }
        vec![
            "-reconnect".into(),
            "1".into(),
            "-reconnect_streamed".into(),
            "1".into(),
            "-reconnect_delay_max".into(),
            "5".into(),
            "-i".into(),
            url.into(),
            "-f".into(),
            "image2pipe".into(),
            "-vcodec".into(),
            "mjpeg".into(),
            "-q:v".into(),
            self.quality.to_string(),
            "-r".into(),
            self.frame_rate.to_string(),
            "-vf".into(),
            filter,
            "-threads".into(),
            "1".into(),
            "pipe:1".into(),
        ]
    }
}

/// Owns the decode process and the cached source address.
///
/// One supervisor instance exists per relay; the broadcaster drives it
/// through the [`MediaSource`] contract.
pub struct DecoderSupervisor<R: SourceResolver = YtDlpResolver> {
    config: SourceConfig,
    resolver: R,
    locator: Mutex<Option<SourceLocator>>,
    /// Kill switch of the currently running process, if any.
    current: Mutex<Option<CancellationToken>>,
}

impl DecoderSupervisor<YtDlpResolver> {
    /// Create a supervisor using the yt-dlp resolver from the config.
    pub fn new(config: SourceConfig) -> Self {
        let resolver = YtDlpResolver::new(config.ytdlp_bin.clone());
        Self::with_resolver(config, resolver)
    }
}

impl<R: SourceResolver> DecoderSupervisor<R> {
    /// Create a supervisor with a custom resolver.
    pub fn with_resolver(config: SourceConfig, resolver: R) -> Self {
        Self {
            config,
            resolver,
            locator: Mutex::new(None),
            current: Mutex::new(None),
        }
    }

    /// The resolved stream URL, from cache when still within its TTL.
    pub async fn resolve_locator(&self) -> Result<String, SourceError> {
        if let Some(locator) = &*self.locator.lock().unwrap() {
            if !locator.is_expired(self.config.locator_ttl) {
                return Ok(locator.url().to_owned());
            }
            tracing::info!(age = ?locator.age(), "cached stream address expired");
        }

        let url = self.resolver.resolve(&self.config.target).await?;
        *self.locator.lock().unwrap() = Some(SourceLocator::new(url.clone()));
        Ok(url)
    }
}

impl<R: SourceResolver> MediaSource for DecoderSupervisor<R> {
    async fn start(&self) -> Result<ByteStream, SourceError> {
        let url = self.resolve_locator().await?;

        let mut child = Command::new(&self.config.ffmpeg_bin)
            .args(self.config.ffmpeg_args(&url))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(SourceError::Spawn)?;

        let Some(stdout) = child.stdout.take() else {
            return Err(SourceError::Spawn(std::io::Error::other(
                "decode process stdout not captured",
            )));
        };

        let last_stderr = Arc::new(Mutex::new(None));
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(drain_stderr(stderr, Arc::clone(&last_stderr)));
        }

        tracing::info!(pid = ?child.id(), "decode process started");

        let token = CancellationToken::new();
        if let Some(previous) = self.current.lock().unwrap().replace(token.clone()) {
            previous.cancel();
        }

        let (exit_tx, exit_rx) = oneshot::channel();
        tokio::spawn(watch_process(child, token, exit_tx, last_stderr));

        Ok(ByteStream::new(stdout, exit_rx))
    }

    async fn stop(&self) {
        if let Some(token) = self.current.lock().unwrap().take() {
            tracing::info!("stopping decode process");
            token.cancel();
        }
    }
}

/// Logs decoder diagnostics and retains the last line for the exit notice.
async fn drain_stderr(stderr: ChildStderr, last: Arc<Mutex<Option<String>>>) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if line.contains("Error") {
            tracing::warn!("decoder: {}", line);
        } else {
            tracing::debug!("decoder: {}", line);
        }
        *last.lock().unwrap() = Some(line);
    }
}

/// Waits for process exit (or the kill switch) and sends the exit notice.
async fn watch_process(
    mut child: Child,
    cancel: CancellationToken,
    exit_tx: oneshot::Sender<ExitNotice>,
    last_stderr: Arc<Mutex<Option<String>>>,
) {
    let notice = tokio::select! {
        status = child.wait() => {
            let code = status.ok().and_then(|s| s.code());
            let reason = last_stderr
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| "process exited".into());
            ExitNotice { code, reason }
        }
        _ = cancel.cancelled() => {
            let _ = child.start_kill();
            let _ = child.wait().await;
            ExitNotice { code: None, reason: "stopped".into() }
        }
    };

    tracing::debug!(code = ?notice.code, reason = %notice.reason, "decode process finished");
    let _ = exit_tx.send(notice);
}
