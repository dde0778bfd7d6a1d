//! Box API client collaborator.
//!
//! [`BoxApi`] is the seam between tool bodies and the remote platform. The
//! production implementation, [`BoxApiClient`], sends requests with `reqwest`
//! using the session's access token. Sessions obtain clients lazily through a
//! [`BoxConnector`].

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use super::error::UpstreamError;
use super::request::{ApiBody, ApiHost, ApiRequest};
use crate::core::config::BoxConfig;
use crate::domains::auth::Credential;

/// Authenticated access to the remote platform.
///
/// Implementations must not retry on their own; a failed call is reported as
/// an [`UpstreamError`] and surfaced to the caller unchanged.
#[async_trait]
pub trait BoxApi: Send + Sync {
    /// Send a request and decode the JSON response. Empty responses
    /// (e.g. `204 No Content`) decode to `Value::Null`.
    async fn send(&self, request: ApiRequest) -> Result<Value, UpstreamError>;

    /// Send a request and return the raw response body.
    async fn fetch_bytes(&self, request: ApiRequest) -> Result<Bytes, UpstreamError>;
}

/// Factory producing a client bound to one credential.
pub trait BoxConnector: Send + Sync {
    /// Build a client for `credential`. Called at most once per credential
    /// per session; the session owns the result until teardown.
    fn connect(&self, credential: &Credential) -> Result<Arc<dyn BoxApi>, UpstreamError>;
}

/// `reqwest`-backed Box client.
pub struct BoxApiClient {
    http: reqwest::Client,
    api_base_url: String,
    upload_base_url: String,
    access_token: String,
}

impl BoxApiClient {
    /// Create a client for the given endpoints and access token.
    pub fn new(config: &BoxConfig, access_token: impl Into<String>) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!("box-mcp-server/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            upload_base_url: config.upload_base_url.trim_end_matches('/').to_string(),
            access_token: access_token.into(),
        })
    }

    fn url_for(&self, request: &ApiRequest) -> String {
        match request.host {
            ApiHost::Api => format!("{}{}", self.api_base_url, request.path),
            ApiHost::Upload => format!("{}{}", self.upload_base_url, request.path),
            ApiHost::Absolute => request.path.clone(),
        }
    }

    async fn execute(&self, request: ApiRequest) -> Result<reqwest::Response, UpstreamError> {
        let url = self.url_for(&request);
        debug!(method = %request.method, %url, "Sending Box API request");

        let mut builder = self
            .http
            .request(request.method.clone(), &url)
            .bearer_auth(&self.access_token);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        builder = match request.body {
            ApiBody::Empty => builder,
            ApiBody::Json(body) => builder.json(&body),
            ApiBody::JsonPatch(body) => builder
                .header(CONTENT_TYPE, "application/json-patch+json")
                .body(serde_json::to_vec(&body).map_err(|e| UpstreamError::transport(e.to_string()))?),
            ApiBody::Multipart(part) => {
                let file = reqwest::multipart::Part::bytes(part.content.to_vec())
                    .file_name(part.file_name);
                let form = reqwest::multipart::Form::new()
                    .text("attributes", part.attributes.to_string())
                    .part("file", file);
                builder.multipart(form)
            }
        };

        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let err = UpstreamError::from_response(status.as_u16(), &body);
        warn!(%url, status = status.as_u16(), code = ?err.code, "Box API request failed");
        Err(err)
    }
}

#[async_trait]
impl BoxApi for BoxApiClient {
    #[instrument(skip_all, fields(method = %request.method, path = %request.path))]
    async fn send(&self, request: ApiRequest) -> Result<Value, UpstreamError> {
        let response = self.execute(request).await?;
        let body = response.bytes().await?;
        if body.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&body)
            .map_err(|e| UpstreamError::transport(format!("Invalid JSON from Box: {}", e)))
    }

    #[instrument(skip_all, fields(method = %request.method, path = %request.path))]
    async fn fetch_bytes(&self, request: ApiRequest) -> Result<Bytes, UpstreamError> {
        let response = self.execute(request).await?;
        Ok(response.bytes().await?)
    }
}

/// Connector producing [`BoxApiClient`]s from the configured endpoints.
pub struct HttpConnector {
    config: BoxConfig,
}

impl HttpConnector {
    pub fn new(config: BoxConfig) -> Self {
        Self { config }
    }
}

impl BoxConnector for HttpConnector {
    fn connect(&self, credential: &Credential) -> Result<Arc<dyn BoxApi>, UpstreamError> {
        let client = BoxApiClient::new(&self.config, credential.access_token())?;
        Ok(Arc::new(client))
    }
}
