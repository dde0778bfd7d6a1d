//! Transport layer for the MCP gateway.
//!
//! This module provides two interchangeable front ends:
//! - **STDIO**: Standard input/output, one client and one session for the
//!   lifetime of the pipe - feature: `stdio`
//! - **HTTP**: JSON-RPC over POST, many concurrent clients, session scope
//!   resolved per request; also serves the OAuth callback - feature: `http`
//!
//! Each transport resolves a session scope and hands tool calls to the
//! dispatcher owned by [`McpServer`](crate::core::McpServer).

mod config;
mod error;
mod service;

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "stdio")]
pub mod stdio;

pub use config::TransportConfig;
pub use error::{TransportError, TransportResult};
pub use service::TransportService;

#[cfg(feature = "http")]
pub use config::{HttpConfig, HttpSessionMode};
