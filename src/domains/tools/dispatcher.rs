//! Dispatcher - routes one invocation to its registered handler.

use futures::FutureExt;
use rmcp::ErrorData as McpError;
use rmcp::model::{CallToolResult, JsonObject, Tool};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument, warn};

use super::context::ToolContext;
use super::error::ToolError;
use super::handlers::ToolOutput;
use super::registry::ToolRegistry;
use crate::core::config::Config;
use crate::domains::auth::{CallbackCorrelator, SessionContext};

/// One tool call, bound to the session it runs in.
pub struct ToolInvocation {
    pub name: String,
    pub arguments: JsonObject,
    pub session: Arc<SessionContext>,
}

impl ToolInvocation {
    pub fn new(name: impl Into<String>, arguments: JsonObject, session: Arc<SessionContext>) -> Self {
        Self {
            name: name.into(),
            arguments,
            session,
        }
    }
}

pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
    correlator: Arc<CallbackCorrelator>,
    config: Arc<Config>,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<ToolRegistry>,
        correlator: Arc<CallbackCorrelator>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            registry,
            correlator,
            config,
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn list_tools(&self) -> Vec<Tool> {
        self.registry.list_tools()
    }

    /// Resolve, validate and run an invocation.
    ///
    /// Nothing is invoked unless the name resolves and the arguments pass the
    /// schema. A panicking handler is reported as an internal error.
    #[instrument(skip_all, fields(tool = %invocation.name, session = %invocation.session.id()))]
    pub async fn dispatch(&self, invocation: ToolInvocation) -> Result<ToolOutput, ToolError> {
        let tool = self.registry.resolve(&invocation.name)?;

        let problems = tool.input_schema.validate(&invocation.arguments);
        if !problems.is_empty() {
            return Err(ToolError::Validation {
                tool: tool.name.to_string(),
                problems,
            });
        }

        let ctx = ToolContext::new(
            invocation.session,
            self.correlator.clone(),
            self.config.clone(),
        );
        let started = Instant::now();
        let outcome = AssertUnwindSafe((tool.handler)(ctx, invocation.arguments))
            .catch_unwind()
            .await;

        let result = match outcome {
            Ok(Err(ToolError::Validation { tool: _, problems })) => Err(ToolError::Validation {
                tool: tool.name.to_string(),
                problems,
            }),
            Ok(result) => result,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(tool = tool.name, %message, "Tool handler panicked");
                Err(ToolError::internal(format!("handler panicked: {}", message)))
            }
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => info!(elapsed_ms, "Tool call succeeded"),
            Err(e) => warn!(elapsed_ms, kind = e.kind(), error = %e, "Tool call failed"),
        }
        result
    }

    /// Dispatch and wrap the outcome in the protocol envelope.
    pub async fn call(&self, invocation: ToolInvocation) -> Result<CallToolResult, McpError> {
        match self.dispatch(invocation).await {
            Ok(output) => Ok(output.into_call_result()),
            Err(err) => err.into_envelope(),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
