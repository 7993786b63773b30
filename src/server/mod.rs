//! Relay server
//!
//! Binds the wire channel (WebSocket push plus the multipart HTTP flavor)
//! over a [`FanoutBroadcaster`] and serves it until shutdown.

pub mod config;
mod ws;

use std::future::Future;
use std::sync::Arc;

use crate::error::Result;
use crate::relay::FanoutBroadcaster;
use crate::source::{DecoderSupervisor, MediaSource};

pub use config::ServerConfig;

/// MJPEG relay server
pub struct RelayServer<S: MediaSource = DecoderSupervisor> {
    config: ServerConfig,
    hub: Arc<FanoutBroadcaster<S>>,
}

impl RelayServer<DecoderSupervisor> {
    /// Create a server whose frames come from the configured decode
    /// pipeline.
    pub fn new(config: ServerConfig) -> Self {
        let supervisor = DecoderSupervisor::new(config.source.clone());
        Self::with_source(config, supervisor)
    }
}

impl<S: MediaSource> RelayServer<S> {
    /// Create a server over a custom media source.
    pub fn with_source(config: ServerConfig, source: S) -> Self {
        let hub = FanoutBroadcaster::new(source, config.relay.clone());
        Self { config, hub }
    }

    /// The broadcaster behind this server.
    pub fn broadcaster(&self) -> &Arc<FanoutBroadcaster<S>> {
        &self.hub
    }

    /// Run the server
    ///
    /// This method blocks until the server is shut down.
    pub async fn run(&self) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(addr = %self.config.bind_addr, "MJPEG relay listening");

        axum::serve(listener, ws::router(Arc::clone(&self.hub))).await?;
        Ok(())
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(addr = %self.config.bind_addr, "MJPEG relay listening");

        axum::serve(listener, ws::router(Arc::clone(&self.hub)))
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("shutdown signal received");
        Ok(())
    }
}
