//! Source address resolution
//!
//! The upstream video feed is not addressed directly: a resolver turns a
//! target (direct page URL or search query) into the raw stream URL, which
//! stays valid for a limited time. The resolved address is cached as a
//! [`SourceLocator`] with a 5-minute time-to-live and refreshed lazily.

use std::future::Future;
use std::time::Duration;

use tokio::process::Command;
use tokio::time::Instant;

use super::error::SourceError;

/// Default time-to-live of a resolved address.
pub const LOCATOR_TTL: Duration = Duration::from_millis(300_000);

/// How the upstream feed is located.
#[derive(Debug, Clone)]
pub enum SourceTarget {
    /// Direct video page URL.
    Url(String),
    /// Search query; the first result wins.
    Search(String),
}

impl SourceTarget {
    /// Argument handed to the resolver binary.
    pub fn lookup_arg(&self) -> String {
        match self {
            SourceTarget::Url(url) => url.clone(),
            SourceTarget::Search(query) => format!("ytsearch1:{}", query),
        }
    }
}

impl std::fmt::Display for SourceTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceTarget::Url(url) => write!(f, "{}", url),
            SourceTarget::Search(query) => write!(f, "search \"{}\"", query),
        }
    }
}

/// Resolved address of the raw stream.
#[derive(Debug, Clone)]
pub struct SourceLocator {
    url: String,
    resolved_at: Instant,
}

impl SourceLocator {
    /// Record a freshly resolved address.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            resolved_at: Instant::now(),
        }
    }

    /// The resolved stream URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Time since resolution.
    pub fn age(&self) -> Duration {
        self.resolved_at.elapsed()
    }

    /// Whether the address has outlived the given time-to-live.
    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.resolved_at.elapsed() > ttl
    }
}

/// Resolves a [`SourceTarget`] to a raw stream URL.
///
/// The seam exists so the relay lifecycle can be exercised without external
/// binaries; production uses [`YtDlpResolver`].
pub trait SourceResolver: Send + Sync + 'static {
    /// Resolve the target to a direct stream URL.
    fn resolve(
        &self,
        target: &SourceTarget,
    ) -> impl Future<Output = Result<String, SourceError>> + Send;
}

/// Resolver backed by the `yt-dlp` binary.
#[derive(Debug, Clone)]
pub struct YtDlpResolver {
    bin: String,
}

impl YtDlpResolver {
    /// Create a resolver invoking the given binary.
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }
}

impl SourceResolver for YtDlpResolver {
    async fn resolve(&self, target: &SourceTarget) -> Result<String, SourceError> {
        tracing::info!(target = %target, "resolving stream address");

        let output = Command::new(&self.bin)
            .args(["--no-playlist", "--quiet", "--get-url", "-f", "best[ext=mp4]"])
            .arg(target.lookup_arg())
            .output()
            .await
            .map_err(|e| SourceError::Resolve(format!("failed to run {}: {}", self.bin, e)))?;

        if !output.status.success() {
            return Err(SourceError::Resolve(format!(
                "{} exited with {:?}",
                self.bin,
                output.status.code()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let url = stdout
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_owned)
            .ok_or_else(|| SourceError::Resolve("resolver produced no address".into()))?;

        tracing::info!("stream address resolved");
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_arg() {
        let direct = SourceTarget::Url("https://example.com/watch?v=abc".into());
        assert_eq!(direct.lookup_arg(), "https://example.com/watch?v=abc");

        let search = SourceTarget::Search("city skyline live".into());
        assert_eq!(search.lookup_arg(), "ytsearch1:city skyline live");
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_boundaries() {
        let locator = SourceLocator::new("https://cdn.example.com/live.mp4");
        assert!(!locator.is_expired(LOCATOR_TTL));

        tokio::time::advance(Duration::from_millis(299_999)).await;
        assert!(!locator.is_expired(LOCATOR_TTL));

        tokio::time::advance(Duration::from_millis(2)).await;
        assert!(locator.is_expired(LOCATOR_TTL));
    }

    #[tokio::test(start_paused = true)]
    async fn test_age_tracks_clock() {
        let locator = SourceLocator::new("u");
        tokio::time::advance(Duration::from_secs(7)).await;
        assert_eq!(locator.age(), Duration::from_secs(7));
    }
}
