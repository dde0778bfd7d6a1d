//! Core module containing shared infrastructure components.
//!
//! This module provides the foundational building blocks for the MCP gateway,
//! including error handling, configuration, server lifecycle management,
//! local path confinement and the transport layer.

pub mod config;
pub mod error;
pub mod security;
pub mod server;
pub mod transport;

pub use config::Config;
pub use error::{Error, Result};
pub use security::{PathSecurityError, validate_destination, validate_path};
pub use server::{McpServer, SessionHandler};
pub use transport::{TransportConfig, TransportService};
