//! Transport service - orchestrates different transport types.
//!
//! This service provides a unified interface for starting the MCP gateway
//! with different transport mechanisms. It also owns the background sweeper
//! and the final teardown, which are the same for every transport.

use tracing::info;

use super::{TransportConfig, TransportResult};
use crate::core::McpServer;

#[cfg(feature = "stdio")]
use super::stdio::StdioTransport;

#[cfg(feature = "http")]
use super::http::HttpTransport;

/// Transport service - manages the transport layer for the MCP server.
pub struct TransportService {
    config: TransportConfig,
}

impl TransportService {
    /// Create a new transport service with the given configuration.
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }

    /// Get the transport configuration.
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Log information about the configured transport.
    pub fn log_info(&self) {
        info!("Starting transport: {}", self.config.description());
    }

    /// Start the transport with the given MCP server.
    ///
    /// Blocks until the transport is shut down, then tears down every
    /// session and pending authorization.
    pub async fn run(self, server: McpServer) -> TransportResult<()> {
        self.log_info();
        let sweeper = server.spawn_sweeper();

        let result = match self.config {
            #[cfg(feature = "stdio")]
            TransportConfig::Stdio => StdioTransport::run(server.clone()).await,
            #[cfg(feature = "http")]
            TransportConfig::Http(cfg) => HttpTransport::new(cfg).run(server.clone()).await,
        };

        sweeper.abort();
        server.shutdown();
        result
    }
}
