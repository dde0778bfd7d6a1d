//! Tool-specific error types.

use rmcp::ErrorData as McpError;
use rmcp::model::{CallToolResult, Content};
use serde::Serialize;
use serde_json::{Value, json};
use std::fmt;
use thiserror::Error;

use crate::core::security::PathSecurityError;
use crate::domains::auth::{AuthorizeError, SessionError};
use crate::domains::box_api::UpstreamError;

/// What is wrong with one argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "problem", rename_all = "snake_case")]
pub enum Problem {
    Missing,
    Null,
    WrongType { expected: String, found: String },
    Unknown,
    BelowMinimum { minimum: i64 },
    NotAllowed { allowed: Vec<Value> },
    /// Well-typed but rejected, e.g. a blank id.
    Invalid { reason: String },
}

/// One offending argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParamProblem {
    pub name: String,
    #[serde(flatten)]
    pub problem: Problem,
}

impl ParamProblem {
    pub fn new(name: impl Into<String>, problem: Problem) -> Self {
        Self {
            name: name.into(),
            problem,
        }
    }
}

impl fmt::Display for ParamProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.problem {
            Problem::Missing => write!(f, "'{}' is required", self.name),
            Problem::Null => write!(f, "'{}' must not be null", self.name),
            Problem::WrongType { expected, found } => {
                write!(f, "'{}' must be {}, got {}", self.name, expected, found)
            }
            Problem::Unknown => write!(f, "'{}' is not a parameter of this tool", self.name),
            Problem::BelowMinimum { minimum } => {
                write!(f, "'{}' must be at least {}", self.name, minimum)
            }
            Problem::NotAllowed { allowed } => {
                let allowed: Vec<String> = allowed.iter().map(ToString::to_string).collect();
                write!(f, "'{}' must be one of {}", self.name, allowed.join(", "))
            }
            Problem::Invalid { reason } => write!(f, "'{}' {}", self.name, reason),
        }
    }
}

fn join_problems(problems: &[ParamProblem]) -> String {
    problems
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors that can occur during tool operations.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The requested tool is not registered.
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Arguments do not match the tool's input schema.
    #[error("Invalid arguments for {tool}: {}", join_problems(.problems))]
    Validation {
        tool: String,
        problems: Vec<ParamProblem>,
    },

    /// Arguments passed the schema but the handler could not use them.
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// The session has no usable credential.
    #[error("{0}")]
    AuthorizationRequired(String),

    /// Authorization was requested without a server-held session.
    #[error("{0}")]
    StatelessSession(String),

    #[error("Box API error: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("Path security validation failed: {0}")]
    PathSecurity(#[from] PathSecurityError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Not configured: {0}")]
    NotConfigured(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ToolError {
    pub fn invalid_arguments(msg: impl Into<String>) -> Self {
        Self::InvalidArguments(msg.into())
    }

    /// One argument rejected by a handler. The dispatcher fills in the tool.
    pub fn invalid_param(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            tool: String::new(),
            problems: vec![ParamProblem::new(
                name,
                Problem::Invalid {
                    reason: reason.into(),
                },
            )],
        }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Stable machine-readable kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownTool(_) => "unknown_tool",
            Self::Validation { .. } => "validation",
            Self::InvalidArguments(_) => "invalid_arguments",
            Self::AuthorizationRequired(_) => "authorization_required",
            Self::StatelessSession(_) => "stateless_session",
            Self::Upstream(_) => "upstream",
            Self::PathSecurity(_) => "path_security",
            Self::NotFound(_) => "not_found",
            Self::NotConfigured(_) => "not_configured",
            Self::Io(_) => "io",
            Self::Internal(_) => "internal",
        }
    }

    /// Map into the protocol envelope.
    ///
    /// Unknown tools and schema violations become `-32602` protocol errors,
    /// internal failures become `-32603`, and everything else is a tool result
    /// with `isError` set so the calling model can read and react to it.
    pub fn into_envelope(self) -> Result<CallToolResult, McpError> {
        let message = self.to_string();
        match self {
            Self::UnknownTool(tool) => Err(McpError::invalid_params(
                message,
                Some(json!({ "kind": "unknown_tool", "tool": tool })),
            )),
            Self::Validation { tool, problems } => Err(McpError::invalid_params(
                message,
                Some(json!({ "kind": "validation", "tool": tool, "parameters": problems })),
            )),
            Self::Internal(_) => Err(McpError::internal_error(
                message,
                Some(json!({ "kind": "internal" })),
            )),
            other => {
                let mut error = json!({ "kind": other.kind(), "message": message });
                if let Self::Upstream(upstream) = &other {
                    error["status"] = json!(upstream.status);
                    error["code"] = json!(upstream.code);
                }
                let mut result = CallToolResult::error(vec![Content::text(message)]);
                result.structured_content = Some(json!({ "error": error }));
                Ok(result)
            }
        }
    }

    /// Structured form used by logs and tests.
    pub fn to_value(&self) -> Value {
        json!({ "kind": self.kind(), "message": self.to_string() })
    }
}

impl From<SessionError> for ToolError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Connect(upstream) => Self::Upstream(upstream),
            other => Self::AuthorizationRequired(other.to_string()),
        }
    }
}

impl From<AuthorizeError> for ToolError {
    fn from(err: AuthorizeError) -> Self {
        match err {
            AuthorizeError::StatelessSession => Self::StatelessSession(err.to_string()),
            AuthorizeError::NotConfigured(msg) => Self::NotConfigured(msg),
        }
    }
}

impl From<serde_json::Error> for ToolError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidArguments(err.to_string())
    }
}

/// Errors raised while building the registry at startup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Tool '{0}' is registered more than once")]
    DuplicateName(String),

    #[error("Tool '{tool}' has an invalid input schema: {reason}")]
    InvalidSchema { tool: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_tool_is_protocol_error() {
        let err = ToolError::UnknownTool("nope".into()).into_envelope().unwrap_err();
        assert_eq!(err.code.0, -32602);
        assert_eq!(err.data.unwrap()["kind"], "unknown_tool");
    }

    #[test]
    fn test_validation_lists_parameters() {
        let err = ToolError::Validation {
            tool: "box_read_tool".into(),
            problems: vec![
                ParamProblem::new("file_id", Problem::Missing),
                ParamProblem::new("extra", Problem::Unknown),
            ],
        };
        assert!(err.to_string().contains("'file_id' is required"));

        let envelope = err.into_envelope().unwrap_err();
        let data = envelope.data.unwrap();
        assert_eq!(data["parameters"][0]["name"], "file_id");
        assert_eq!(data["parameters"][0]["problem"], "missing");
        assert_eq!(data["parameters"][1]["problem"], "unknown");
    }

    #[test]
    fn test_constraint_problems_render() {
        let err = ToolError::Validation {
            tool: "box_search_tool".into(),
            problems: vec![
                ParamProblem::new("limit", Problem::BelowMinimum { minimum: 0 }),
                ParamProblem::new(
                    "mode",
                    Problem::NotAllowed {
                        allowed: vec![json!("fast"), json!("slow")],
                    },
                ),
            ],
        };
        let message = err.to_string();
        assert!(message.contains("'limit' must be at least 0"));
        assert!(message.contains(r#"'mode' must be one of "fast", "slow""#));

        let data = err.into_envelope().unwrap_err().data.unwrap();
        assert_eq!(data["parameters"][0]["problem"], "below_minimum");
        assert_eq!(data["parameters"][0]["minimum"], 0);
        assert_eq!(data["parameters"][1]["allowed"], json!(["fast", "slow"]));
    }

    #[test]
    fn test_invalid_param_is_protocol_error() {
        let err = ToolError::invalid_param("file_id", "must not be empty");
        assert_eq!(err.kind(), "validation");
        let envelope = err.into_envelope().unwrap_err();
        assert_eq!(envelope.code.0, -32602);
        let data = envelope.data.unwrap();
        assert_eq!(data["parameters"][0]["name"], "file_id");
        assert_eq!(data["parameters"][0]["problem"], "invalid");
        assert_eq!(data["parameters"][0]["reason"], "must not be empty");
    }

    #[test]
    fn test_upstream_is_tool_error_result() {
        let err = ToolError::Upstream(UpstreamError::from_response(
            404,
            r#"{"code":"not_found","message":"Not Found"}"#,
        ));
        let result = err.into_envelope().unwrap();
        assert_eq!(result.is_error, Some(true));
        let structured = result.structured_content.unwrap();
        assert_eq!(structured["error"]["kind"], "upstream");
        assert_eq!(structured["error"]["status"], 404);
        assert_eq!(structured["error"]["code"], "not_found");
    }

    #[test]
    fn test_session_error_maps_to_authorization_required() {
        let err: ToolError = SessionError::NotAuthorized.into();
        assert_eq!(err.kind(), "authorization_required");
        assert!(err.to_string().contains("box_authorize_app_tool"));
        let result = err.into_envelope().unwrap();
        assert_eq!(result.is_error, Some(true));
    }

    #[test]
    fn test_internal_is_protocol_error() {
        let err = ToolError::internal("boom").into_envelope().unwrap_err();
        assert_eq!(err.code.0, -32603);
    }
}
