//! Tool handler plumbing.
//!
//! Every tool is a typed parameter struct plus an async function taking a
//! [`ToolContext`] and those parameters. [`ToolDefinition::typed`] erases the
//! parameter type so the registry can store all tools in one table.

use rmcp::handler::server::tool::cached_schema_for_type;
use rmcp::model::{CallToolResult, Content, JsonObject};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use super::context::ToolContext;
use super::error::{ParamProblem, Problem, ToolError};
use super::registry::SideEffect;

/// Output from a tool execution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolOutput {
    /// One-line human-readable summary.
    pub summary: String,

    /// The result data from the tool.
    pub data: Value,
}

impl ToolOutput {
    pub fn new(summary: impl Into<String>, data: Value) -> Self {
        Self {
            summary: summary.into(),
            data,
        }
    }

    /// Wrap into a protocol success result. Non-object data is nested under
    /// `result` since structured content must be an object.
    pub fn into_call_result(self) -> CallToolResult {
        let structured = match self.data {
            Value::Object(_) => self.data,
            other => json!({ "result": other }),
        };
        let text = match serde_json::to_string_pretty(&structured) {
            Ok(body) => format!("{}\n\n{}", self.summary, body),
            Err(_) => self.summary,
        };
        let mut result = CallToolResult::success(vec![Content::text(text)]);
        result.structured_content = Some(structured);
        result
    }
}

pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<ToolOutput, ToolError>> + Send>>;

/// Type-erased handler.
pub type Handler = Arc<dyn Fn(ToolContext, JsonObject) -> HandlerFuture + Send + Sync>;

/// A tool ready to be registered.
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub side_effect: SideEffect,
    pub schema: Arc<JsonObject>,
    pub handler: Handler,
}

impl ToolDefinition {
    /// Build a definition from a typed handler.
    ///
    /// The input schema is generated from `P`. Arguments are deserialized
    /// into `P` after schema validation; a deserialization failure (e.g. a
    /// number out of range) is reported as a validation error on the field.
    pub fn typed<P, F, Fut>(
        name: &'static str,
        description: &'static str,
        side_effect: SideEffect,
        handler: F,
    ) -> Self
    where
        P: DeserializeOwned + JsonSchema + Send + 'static,
        F: Fn(ToolContext, P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ToolOutput, ToolError>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        let erased: Handler = Arc::new(move |ctx: ToolContext, arguments: JsonObject| {
            let handler = handler.clone();
            Box::pin(async move {
                let params: P = parse_arguments(name, arguments)?;
                handler(ctx, params).await
            }) as HandlerFuture
        });

        Self {
            name,
            description,
            side_effect,
            schema: cached_schema_for_type::<P>(),
            handler: erased,
        }
    }
}

/// Deserialize arguments into `P`, naming the offending field on failure.
fn parse_arguments<P: DeserializeOwned>(tool: &str, arguments: JsonObject) -> Result<P, ToolError> {
    let err = match serde_json::from_value(Value::Object(arguments.clone())) {
        Ok(params) => return Ok(params),
        Err(err) => err,
    };
    let reason = err.to_string();
    let field = offending_field::<P>(&arguments, &reason).unwrap_or_else(|| "arguments".to_string());
    Err(ToolError::Validation {
        tool: tool.to_string(),
        problems: vec![ParamProblem::new(field, Problem::Invalid { reason })],
    })
}

/// The first argument whose removal changes the deserialization error.
///
/// Struct fields are visited in input order and missing fields are only
/// reported at the end, so dropping an unrelated field leaves the error as is.
fn offending_field<P: DeserializeOwned>(arguments: &JsonObject, reason: &str) -> Option<String> {
    arguments.keys().find_map(|key| {
        let mut rest = arguments.clone();
        rest.remove(key);
        match serde_json::from_value::<P>(Value::Object(rest)) {
            Ok(_) => Some(key.clone()),
            Err(e) if e.to_string() != reason => Some(key.clone()),
            Err(_) => None,
        }
    })
}

/// Parameters for tools that take no arguments.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct NoParams {}
