//! Server configuration

use std::net::SocketAddr;

use crate::relay::RelayConfig;
use crate::source::SourceConfig;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Fanout and pipeline options
    pub relay: RelayConfig,

    /// Upstream decode pipeline options
    pub source: SourceConfig,
}

impl ServerConfig {
    /// Create a config for the given source with defaults elsewhere
    pub fn new(source: SourceConfig) -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            relay: RelayConfig::default(),
            source,
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the relay options
    pub fn relay(mut self, relay: RelayConfig) -> Self {
        self.relay = relay;
        self
    }
}
