//! Domains module containing business logic organized by bounded contexts.
//!
//! - **auth**: sessions, credentials and the OAuth callback correlator
//! - **box_api**: the authenticated Box REST client
//! - **tools**: the tool registry, dispatcher and tool bodies

pub mod auth;
pub mod box_api;
pub mod tools;
