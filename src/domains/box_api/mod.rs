//! Box platform collaborator.
//!
//! The gateway never interprets Box REST semantics beyond building requests;
//! everything goes through the [`BoxApi`] trait so tool bodies can be tested
//! without the network.

mod client;
mod error;
mod request;

#[cfg(test)]
pub(crate) mod fake;

pub use client::{BoxApi, BoxApiClient, BoxConnector, HttpConnector};
pub use error::UpstreamError;
pub use request::{ApiBody, ApiHost, ApiRequest, UploadPart};
