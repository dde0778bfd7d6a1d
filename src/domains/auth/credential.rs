//! OAuth credentials held by authenticated sessions.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Token endpoint response (`grant_type=authorization_code`).
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    /// Lifetime in seconds.
    #[serde(default)]
    pub expires_in: Option<i64>,
}

/// An access credential for the remote platform.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credential {
    access_token: String,
    refresh_token: Option<String>,
    token_type: String,
    expires_at: Option<DateTime<Utc>>,
}

impl Credential {
    /// A bare bearer token with no known expiry, as supplied by a client in an
    /// `Authorization` header.
    pub fn bearer(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            token_type: "bearer".to_string(),
            expires_at: None,
        }
    }

    /// Build a credential from a token endpoint response received at `now`.
    pub fn from_token_response(response: TokenResponse, now: DateTime<Utc>) -> Self {
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            token_type: response.token_type.unwrap_or_else(|| "bearer".to_string()),
            expires_at: response
                .expires_in
                .map(|secs| {
                    ChronoDuration::try_seconds(secs.max(0))
                        .and_then(|lifetime| now.checked_add_signed(lifetime))
                        .unwrap_or(DateTime::<Utc>::MAX_UTC)
                }),
        }
    }

    /// Set an explicit expiry.
    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn token_type(&self) -> &str {
        &self.token_type
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token.is_some()
    }

    /// Whether the credential is past its expiry at `now`. Credentials
    /// without an expiry never expire locally.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_token_response_computes_expiry() {
        let now = Utc::now();
        let response: TokenResponse = serde_json::from_str(
            r#"{"access_token":"at","refresh_token":"rt","expires_in":3600,"token_type":"bearer"}"#,
        )
        .unwrap();
        let cred = Credential::from_token_response(response, now);

        assert_eq!(cred.access_token(), "at");
        assert!(cred.has_refresh_token());
        assert_eq!(cred.expires_at(), Some(now + ChronoDuration::seconds(3600)));
        assert!(!cred.is_expired_at(now));
        assert!(cred.is_expired_at(now + ChronoDuration::seconds(3600)));
    }

    #[test]
    fn test_out_of_range_lifetime_saturates() {
        let now = Utc::now();
        let response: TokenResponse =
            serde_json::from_str(r#"{"access_token":"at","expires_in":9223372036854775807}"#).unwrap();
        let cred = Credential::from_token_response(response, now);
        assert_eq!(cred.expires_at(), Some(DateTime::<Utc>::MAX_UTC));
        assert!(!cred.is_expired_at(now));
    }

    #[test]
    fn test_bearer_never_expires() {
        let cred = Credential::bearer("tok");
        assert_eq!(cred.token_type(), "bearer");
        assert!(!cred.is_expired_at(Utc::now() + ChronoDuration::days(365)));
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let cred = Credential::bearer("super-secret");
        let debug = format!("{:?}", cred);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
