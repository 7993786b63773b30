//! Upstream source boundary
//!
//! This module provides:
//! - The [`MediaSource`] contract the broadcaster drives
//! - Source address resolution with TTL caching
//! - The [`DecoderSupervisor`] owning the external decode process

pub mod error;
pub mod locator;
pub mod supervisor;

use std::future::Future;

use tokio::io::AsyncRead;
use tokio::sync::oneshot;

pub use error::SourceError;
pub use locator::{SourceLocator, SourceResolver, SourceTarget, YtDlpResolver, LOCATOR_TTL};
pub use supervisor::{DecoderSupervisor, SourceConfig};

/// Why and how the decode process ended.
#[derive(Debug, Clone)]
pub struct ExitNotice {
    /// Process exit code; `None` when the process was killed.
    pub code: Option<i32>,
    /// Last diagnostic line, or a fixed reason for deliberate stops.
    pub reason: String,
}

/// A started decode pipeline: its raw output plus the exit notification.
pub struct ByteStream {
    reader: Box<dyn AsyncRead + Send + Unpin>,
    exit: oneshot::Receiver<ExitNotice>,
}

impl ByteStream {
    /// Wrap a raw byte reader and its exit channel.
    pub fn new(
        reader: impl AsyncRead + Send + Unpin + 'static,
        exit: oneshot::Receiver<ExitNotice>,
    ) -> Self {
        Self {
            reader: Box::new(reader),
            exit,
        }
    }

    /// Split the handle into the reader and the exit notification.
    pub fn into_parts(
        self,
    ) -> (
        Box<dyn AsyncRead + Send + Unpin>,
        oneshot::Receiver<ExitNotice>,
    ) {
        (self.reader, self.exit)
    }
}

impl std::fmt::Debug for ByteStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteStream").finish_non_exhaustive()
    }
}

/// Boundary contract of the upstream decode pipeline.
///
/// The broadcaster starts the pipeline when the first subscriber arrives and
/// stops it when the last one leaves; both operations must be safe to call
/// repeatedly.
pub trait MediaSource: Send + Sync + 'static {
    /// Start (or restart) the decode pipeline and hand back its raw output.
    fn start(&self) -> impl Future<Output = Result<ByteStream, SourceError>> + Send;

    /// Stop the decode pipeline if one is running.
    fn stop(&self) -> impl Future<Output = ()> + Send;
}
