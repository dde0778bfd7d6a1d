//! Per-invocation context handed to tool bodies.

use std::sync::Arc;

use super::error::ToolError;
use crate::core::config::Config;
use crate::domains::auth::{CallbackCorrelator, SessionContext};
use crate::domains::box_api::BoxApi;

/// Everything a tool body may touch: the bound session, the correlator (for
/// the authorize tool) and the server configuration.
#[derive(Clone)]
pub struct ToolContext {
    pub session: Arc<SessionContext>,
    pub correlator: Arc<CallbackCorrelator>,
    pub config: Arc<Config>,
}

impl ToolContext {
    pub fn new(
        session: Arc<SessionContext>,
        correlator: Arc<CallbackCorrelator>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            session,
            correlator,
            config,
        }
    }

    /// The session's Box client, or an authorization-required error.
    pub fn client(&self) -> Result<Arc<dyn BoxApi>, ToolError> {
        Ok(self.session.client()?)
    }
}
