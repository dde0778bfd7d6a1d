//! Authorization error types.

use thiserror::Error;

use crate::domains::box_api::UpstreamError;

/// Why a callback's state token was not accepted.
///
/// Every variant is reported to the browser as an unknown state; the reason
/// is kept so the page can say what happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StateRejection {
    #[error("no authorization request matches this state")]
    Unknown,

    #[error("the authorization request has expired")]
    Expired,

    #[error("the authorization request was replaced by a newer one")]
    Superseded,

    #[error("the authorization request was already completed")]
    AlreadyRedeemed,

    #[error("the session that started this authorization has ended")]
    SessionClosed,
}

/// The code-for-credential exchange failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ExchangeError(pub String);

impl From<UpstreamError> for ExchangeError {
    fn from(err: UpstreamError) -> Self {
        Self(err.to_string())
    }
}

/// Errors raised while handling an OAuth redirect.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallbackError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Authorization was denied: {0}")]
    ProviderDenied(String),

    #[error("Unknown authorization state: {0}")]
    UnknownState(StateRejection),

    #[error("Code exchange failed: {0}")]
    Exchange(#[from] ExchangeError),
}

impl CallbackError {
    /// HTTP status for the callback page.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Exchange(_) => 502,
            _ => 400,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingParameter(_) => "missing_parameter",
            Self::ProviderDenied(_) => "provider_denied",
            Self::UnknownState(_) => "unknown_state",
            Self::Exchange(_) => "exchange_failed",
        }
    }
}

impl From<StateRejection> for CallbackError {
    fn from(reason: StateRejection) -> Self {
        Self::UnknownState(reason)
    }
}

/// Errors raised when starting an authorization flow.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthorizeError {
    #[error(
        "This request has no server-held session; send an Mcp-Session-Id header or an Authorization bearer token"
    )]
    StatelessSession,

    #[error("OAuth is not configured: {0}")]
    NotConfigured(String),
}

/// Errors raised when a session cannot produce a client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Not authorized. Call box_authorize_app_tool to start the Box OAuth flow")]
    NotAuthorized,

    #[error(
        "Authorization is pending. Complete the Box OAuth flow in your browser, or call box_authorize_app_tool again"
    )]
    AuthorizationPending,

    #[error("The Box access token has expired. Call box_authorize_app_tool to sign in again")]
    TokenExpired,

    #[error("The session has ended")]
    Closed,

    #[error("Failed to create Box client: {0}")]
    Connect(UpstreamError),
}
