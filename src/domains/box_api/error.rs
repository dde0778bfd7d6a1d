//! Errors reported by the Box platform.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A failed call to the remote platform.
///
/// Carries the upstream HTTP status and Box error code when the platform
/// answered, or only a message when the request never completed.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[error("{}", self.describe())]
pub struct UpstreamError {
    /// HTTP status returned by the platform, if any.
    pub status: Option<u16>,

    /// Box error code (e.g. `not_found`, `item_name_in_use`).
    pub code: Option<String>,

    /// Human-readable message.
    pub message: String,
}

/// Shape of a Box error body.
#[derive(Debug, Deserialize)]
struct BoxErrorBody {
    code: Option<String>,
    message: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

impl UpstreamError {
    /// The request could not be sent or the response could not be read.
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            code: None,
            message: message.into(),
        }
    }

    /// Build an error from a non-success response.
    ///
    /// Understands both the content API body (`code`/`message`) and the
    /// OAuth body (`error`/`error_description`); falls back to the raw text.
    pub fn from_response(status: u16, body: &str) -> Self {
        let parsed: Option<BoxErrorBody> = serde_json::from_str(body).ok();
        let (code, message) = match parsed {
            Some(b) => (
                b.code.or(b.error),
                b.message
                    .or(b.error_description)
                    .unwrap_or_else(|| truncate(body)),
            ),
            None => (None, truncate(body)),
        };
        Self {
            status: Some(status),
            code,
            message: if message.is_empty() {
                format!("HTTP {}", status)
            } else {
                message
            },
        }
    }

    /// Whether the platform rejected the credential.
    pub fn is_unauthorized(&self) -> bool {
        self.status == Some(401)
    }

    fn describe(&self) -> String {
        match (self.status, &self.code) {
            (Some(status), Some(code)) => format!("{} ({}): {}", status, code, self.message),
            (Some(status), None) => format!("{}: {}", status, self.message),
            _ => self.message.clone(),
        }
    }
}

fn truncate(body: &str) -> String {
    const MAX: usize = 500;
    let body = body.trim();
    if body.len() <= MAX {
        return body.to_string();
    }
    let mut end = MAX;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        Self {
            status: err.status().map(|s| s.as_u16()),
            code: None,
            message: err.to_string(),
        }
    }
}
