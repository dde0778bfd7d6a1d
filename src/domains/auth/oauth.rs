//! OAuth authorization-code flow against Box.

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, warn};

use super::credential::{Credential, TokenResponse};
use super::error::{AuthorizeError, ExchangeError};
use crate::core::config::BoxConfig;
use crate::domains::box_api::UpstreamError;

/// Exchanges an authorization code for a credential.
#[async_trait]
pub trait CodeExchanger: Send + Sync {
    async fn exchange(&self, code: &str) -> Result<Credential, ExchangeError>;
}

/// Token endpoint client for Box.
pub struct BoxOAuthClient {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    redirect_url: String,
}

impl BoxOAuthClient {
    /// Build a client, or `None` when the client id/secret are not set.
    pub fn from_config(config: &BoxConfig) -> Result<Option<Self>, UpstreamError> {
        let (Some(client_id), Some(client_secret)) =
            (config.client_id.clone(), config.client_secret.clone())
        else {
            return Ok(None);
        };
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Some(Self {
            http,
            token_url: config.token_url.clone(),
            client_id,
            client_secret,
            redirect_url: config.redirect_url.clone(),
        }))
    }
}

#[async_trait]
impl CodeExchanger for BoxOAuthClient {
    async fn exchange(&self, code: &str) -> Result<Credential, ExchangeError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("redirect_uri", self.redirect_url.as_str()),
        ];

        debug!(token_url = %self.token_url, "Exchanging authorization code");
        let response = self
            .http
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| ExchangeError(format!("Token request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = UpstreamError::from_response(status.as_u16(), &body);
            warn!(status = status.as_u16(), code = ?err.code, "Token exchange rejected");
            return Err(err.into());
        }

        let tokens: TokenResponse = response
            .json()
            .await
            .map_err(|e| ExchangeError(format!("Invalid token response: {}", e)))?;
        Ok(Credential::from_token_response(tokens, Utc::now()))
    }
}

/// Exchanger used when no client credentials are configured.
pub struct UnconfiguredExchanger;

#[async_trait]
impl CodeExchanger for UnconfiguredExchanger {
    async fn exchange(&self, _code: &str) -> Result<Credential, ExchangeError> {
        Err(ExchangeError(
            "BOX_CLIENT_ID and BOX_CLIENT_SECRET are not set".to_string(),
        ))
    }
}

/// Build the browser URL that starts the authorization-code flow.
pub fn build_authorize_url(config: &BoxConfig, state_token: &str) -> Result<String, AuthorizeError> {
    let client_id = config
        .client_id
        .as_deref()
        .ok_or_else(|| AuthorizeError::NotConfigured("BOX_CLIENT_ID is not set".to_string()))?;

    let query = serde_urlencoded::to_string([
        ("response_type", "code"),
        ("client_id", client_id),
        ("redirect_uri", config.redirect_url.as_str()),
        ("state", state_token),
    ])
    .map_err(|e| AuthorizeError::NotConfigured(e.to_string()))?;

    let separator = if config.authorize_url.contains('?') { '&' } else { '?' };
    Ok(format!("{}{}{}", config.authorize_url, separator, query))
}
