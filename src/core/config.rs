//! Configuration management for the MCP gateway.
//!
//! This module provides a centralized configuration structure that can be
//! populated from environment variables, command-line overrides, or defaults.

use super::transport::TransportConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

/// Main configuration structure for the MCP gateway.
///
/// This struct contains all configurable aspects of the server, organized
/// by concern for clarity and maintainability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server identification and metadata.
    pub server: ServerConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,

    /// Transport configuration.
    pub transport: TransportConfig,

    /// Box platform endpoints and OAuth application credentials.
    pub box_api: BoxConfig,

    /// Authorization lifecycle policy (pending expiry, session idle eviction).
    pub auth: AuthConfig,

    /// Security and path validation configuration.
    pub security: SecurityConfig,
}

/// Server identification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The name of the server as reported to clients.
    pub name: String,

    /// The version of the server.
    pub version: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "trace").
    pub level: String,

    /// Whether to include timestamps in log output.
    pub with_timestamps: bool,
}

/// Box platform configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct BoxConfig {
    /// OAuth client id of the Box application.
    pub client_id: Option<String>,

    /// OAuth client secret of the Box application.
    pub client_secret: Option<String>,

    /// Redirect URL registered with the Box application. Its path is the
    /// callback route served by the gateway.
    pub redirect_url: String,

    /// Base URL of the Box content API.
    pub api_base_url: String,

    /// Base URL of the Box upload API.
    pub upload_base_url: String,

    /// Browser-facing authorization endpoint.
    pub authorize_url: String,

    /// Token endpoint used for the code exchange.
    pub token_url: String,

    /// Timeout applied to every outbound request, in seconds.
    pub request_timeout_secs: u64,
}

/// Custom Debug implementation to redact secrets from logs.
impl std::fmt::Debug for BoxConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxConfig")
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("redirect_url", &self.redirect_url)
            .field("api_base_url", &self.api_base_url)
            .field("upload_base_url", &self.upload_base_url)
            .field("authorize_url", &self.authorize_url)
            .field("token_url", &self.token_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl BoxConfig {
    /// Path component of the redirect URL, used as the callback route.
    pub fn callback_path(&self) -> String {
        reqwest::Url::parse(&self.redirect_url)
            .ok()
            .map(|url| url.path().to_string())
            .filter(|path| path.len() > 1)
            .unwrap_or_else(|| "/callback".to_string())
    }

    /// Outbound request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Authorization lifecycle policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Seconds a pending authorization waits for its callback before expiring.
    pub pending_ttl_secs: u64,

    /// Seconds of inactivity after which a keyed HTTP session is evicted.
    pub session_idle_ttl_secs: u64,

    /// Seconds between background sweeps of pending records and idle sessions.
    pub sweep_interval_secs: u64,

    /// Whether the pipe transport binds a callback-only HTTP listener on the
    /// redirect URL's host and port.
    pub callback_listener: bool,
}

impl AuthConfig {
    /// Bounded waiting period for pending authorizations.
    pub fn pending_ttl(&self) -> Duration {
        Duration::from_secs(self.pending_ttl_secs)
    }

    /// Idle period after which keyed sessions are evicted.
    pub fn session_idle_ttl(&self) -> Duration {
        Duration::from_secs(self.session_idle_ttl_secs)
    }

    /// Interval of the background sweeper (never zero).
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

/// Configuration for security and path validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Optional root directory for local path operations (upload from path,
    /// download to path). If None, no path restrictions are enforced.
    pub root_path: Option<PathBuf>,

    /// Whether to allow symlinks in path validation.
    /// If true, symlinks are followed and their targets are validated.
    /// If false, symlinks pointing outside the root are rejected.
    pub allow_symlinks: bool,
}

impl Default for BoxConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            redirect_url: "http://localhost:10000/callback".to_string(),
            api_base_url: "https://api.box.com/2.0".to_string(),
            upload_base_url: "https://upload.box.com/api/2.0".to_string(),
            authorize_url: "https://account.box.com/api/oauth2/authorize".to_string(),
            token_url: "https://api.box.com/oauth2/token".to_string(),
            request_timeout_secs: 60,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            pending_ttl_secs: 300,
            session_idle_ttl_secs: 3600,
            sweep_interval_secs: 30,
            callback_listener: true,
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            // No root path restriction by default
            root_path: None,
            // Allow symlinks by default with validation
            allow_symlinks: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                name: "box-mcp-server".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                with_timestamps: true,
            },
            transport: TransportConfig::default(),
            box_api: BoxConfig::default(),
            auth: AuthConfig::default(),
            security: SecurityConfig::default(),
        }
    }
}

/// Read a numeric environment variable, warning when it does not parse.
fn env_u64(key: &str) -> Option<u64> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring {}={:?}: not a non-negative integer", key, raw);
            None
        }
    }
}

impl Config {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables.
    ///
    /// Gateway settings are prefixed with `MCP_`, Box application settings
    /// with `BOX_`. For example: `MCP_SERVER_NAME`, `BOX_CLIENT_ID`.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let mut config = Self::default();

        if let Ok(name) = std::env::var("MCP_SERVER_NAME") {
            config.server.name = name;
        }

        if let Ok(level) = std::env::var("MCP_LOG_LEVEL") {
            config.logging.level = level;
        }

        // Load transport configuration from environment
        config.transport = TransportConfig::from_env();

        // Box application
        if let Ok(client_id) = std::env::var("BOX_CLIENT_ID") {
            config.box_api.client_id = Some(client_id);
        }
        if let Ok(client_secret) = std::env::var("BOX_CLIENT_SECRET") {
            config.box_api.client_secret = Some(client_secret);
            info!("Box client secret loaded from environment");
        }
        if config.box_api.client_id.is_none() || config.box_api.client_secret.is_none() {
            warn!(
                "BOX_CLIENT_ID / BOX_CLIENT_SECRET not set - the authorize tool will be unavailable. \
                 Bearer tokens can still be supplied per request over HTTP."
            );
        }
        if let Ok(redirect) = std::env::var("BOX_REDIRECT_URL") {
            config.box_api.redirect_url = redirect;
        }
        if let Ok(url) = std::env::var("BOX_API_BASE_URL") {
            config.box_api.api_base_url = url;
        }
        if let Ok(url) = std::env::var("BOX_UPLOAD_BASE_URL") {
            config.box_api.upload_base_url = url;
        }
        if let Ok(url) = std::env::var("BOX_AUTHORIZE_URL") {
            config.box_api.authorize_url = url;
        }
        if let Ok(url) = std::env::var("BOX_TOKEN_URL") {
            config.box_api.token_url = url;
        }
        if let Some(secs) = env_u64("BOX_REQUEST_TIMEOUT_SECS") {
            config.box_api.request_timeout_secs = secs;
        }

        // Authorization lifecycle
        if let Some(secs) = env_u64("MCP_OAUTH_PENDING_TTL_SECS") {
            config.auth.pending_ttl_secs = secs;
        }
        if let Some(secs) = env_u64("MCP_SESSION_IDLE_TTL_SECS") {
            config.auth.session_idle_ttl_secs = secs;
        }
        if let Some(secs) = env_u64("MCP_SWEEP_INTERVAL_SECS") {
            config.auth.sweep_interval_secs = secs;
        }
        if let Ok(value) = std::env::var("MCP_OAUTH_CALLBACK_LISTENER") {
            config.auth.callback_listener = value.to_lowercase() != "false" && value != "0";
        }

        // Load security configuration
        if let Ok(root_path) = std::env::var("MCP_ROOT_PATH") {
            config.security.root_path = Some(PathBuf::from(root_path));
            info!(
                "Path security enabled: root directory set to {:?}",
                config.security.root_path
            );
        } else {
            warn!(
                "MCP_ROOT_PATH not set - no path restrictions active. \
                 Uploads and downloads may touch any local path."
            );
        }

        if let Ok(allow_symlinks) = std::env::var("MCP_ALLOW_SYMLINKS") {
            config.security.allow_symlinks = allow_symlinks.parse().unwrap_or(true);
            info!("Symlinks allowed: {}", config.security.allow_symlinks);
        }

        config
    }
}
