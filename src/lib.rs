//! Box MCP Gateway
//!
//! Exposes Box content management (search, file transfer, folders, metadata,
//! Box AI and Doc Gen) to MCP clients as tools, over stdio or HTTP.
//!
//! # Architecture
//!
//! - **core**: configuration, error handling, the server and its transports
//! - **domains**: business logic organized by bounded contexts
//!   - **auth**: sessions, OAuth authorization and the callback correlator
//!   - **box_api**: the authenticated Box REST client
//!   - **tools**: the tool registry, dispatcher and tool definitions
//!
//! # Example
//!
//! ```rust,no_run
//! use box_mcp_server::core::{Config, McpServer, TransportService};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env();
//!     let transport = TransportService::new(config.transport.clone());
//!     let server = McpServer::new(config)?;
//!     transport.run(server).await?;
//!     Ok(())
//! }
//! ```

pub mod core;
pub mod domains;

// Re-export commonly used types for convenience
pub use core::{Config, Error, McpServer, Result};
