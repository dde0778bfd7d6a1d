//! Transport configuration types.

use serde::{Deserialize, Serialize};

/// Transport configuration options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransportConfig {
    /// Standard input/output transport (default for MCP).
    #[cfg(feature = "stdio")]
    Stdio,

    /// HTTP transport with JSON-RPC over POST.
    #[cfg(feature = "http")]
    Http(HttpConfig),
}

/// How HTTP requests are mapped onto sessions.
///
/// The HTTP transport never requires protocol-level continuity between
/// calls. This policy only decides whether a client-supplied session key is
/// honoured.
#[cfg(feature = "http")]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HttpSessionMode {
    /// Requests carrying `Mcp-Session-Id` share a server-held session;
    /// requests without it run on an ephemeral session.
    #[default]
    Keyed,

    /// Every request runs on an ephemeral session. Credentials must be
    /// supplied per request as a bearer token.
    PerRequest,
}

#[cfg(feature = "http")]
impl HttpSessionMode {
    /// Parse the mode from its configuration spelling.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "keyed" => Some(Self::Keyed),
            "per-request" | "per_request" | "stateless" => Some(Self::PerRequest),
            _ => None,
        }
    }

    /// Configuration spelling of the mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Keyed => "keyed",
            Self::PerRequest => "per-request",
        }
    }
}

/// HTTP transport configuration.
#[cfg(feature = "http")]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Port number to listen on.
    pub port: u16,

    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Path for JSON-RPC endpoint.
    #[serde(default = "default_rpc_path")]
    pub rpc_path: String,

    /// Enable CORS for browser clients.
    #[serde(default = "default_cors")]
    pub enable_cors: bool,

    /// Session scoping policy.
    #[serde(default)]
    pub session_mode: HttpSessionMode,
}

#[cfg(feature = "http")]
fn default_host() -> String {
    "0.0.0.0".to_string()
}

#[cfg(feature = "http")]
fn default_rpc_path() -> String {
    "/mcp".to_string()
}

#[cfg(feature = "http")]
fn default_cors() -> bool {
    true
}

#[cfg(feature = "http")]
const DEFAULT_HTTP_PORT: u16 = 10000;

impl Default for TransportConfig {
    fn default() -> Self {
        #[cfg(feature = "stdio")]
        {
            Self::Stdio
        }

        #[cfg(all(not(feature = "stdio"), feature = "http"))]
        {
            Self::Http(HttpConfig::default())
        }

        #[cfg(not(any(feature = "stdio", feature = "http")))]
        {
            compile_error!("At least one transport feature must be enabled: stdio or http");
        }
    }
}

#[cfg(feature = "http")]
impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_HTTP_PORT,
            host: default_host(),
            rpc_path: default_rpc_path(),
            enable_cors: default_cors(),
            session_mode: HttpSessionMode::default(),
        }
    }
}

impl TransportConfig {
    /// Create a STDIO transport config.
    #[cfg(feature = "stdio")]
    pub fn stdio() -> Self {
        Self::Stdio
    }

    /// Create an HTTP transport config.
    #[cfg(feature = "http")]
    pub fn http(port: u16, host: impl Into<String>) -> Self {
        Self::Http(HttpConfig {
            port,
            host: host.into(),
            ..Default::default()
        })
    }

    /// Load transport config from environment variables.
    pub fn from_env() -> Self {
        let transport = std::env::var("MCP_TRANSPORT")
            .unwrap_or_default()
            .to_lowercase();

        match transport.as_str() {
            #[cfg(feature = "http")]
            "http" => Self::Http(HttpConfig::from_env()),
            #[cfg(feature = "stdio")]
            _ => Self::Stdio,
            #[cfg(all(not(feature = "stdio"), feature = "http"))]
            _ => Self::Http(HttpConfig::from_env()),
        }
    }

    /// Select a transport by name (`stdio` or `http`), keeping HTTP settings
    /// already present in this config.
    pub fn select(&self, name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            #[cfg(feature = "stdio")]
            "stdio" => Some(Self::Stdio),
            #[cfg(feature = "http")]
            "http" => match self {
                Self::Http(cfg) => Some(Self::Http(cfg.clone())),
                #[allow(unreachable_patterns)]
                _ => Some(Self::Http(HttpConfig::from_env())),
            },
            _ => None,
        }
    }

    /// Get a description of this transport for logging.
    pub fn description(&self) -> String {
        match self {
            #[cfg(feature = "stdio")]
            Self::Stdio => "STDIO (standard MCP mode)".to_string(),
            #[cfg(feature = "http")]
            Self::Http(cfg) => format!(
                "HTTP on {}:{}{} (sessions: {})",
                cfg.host,
                cfg.port,
                cfg.rpc_path,
                cfg.session_mode.as_str()
            ),
        }
    }

    /// Short transport name reported by diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            #[cfg(feature = "stdio")]
            Self::Stdio => "stdio",
            #[cfg(feature = "http")]
            Self::Http(_) => "http",
        }
    }

    /// Check if this transport is the standard STDIO mode.
    pub fn is_stdio(&self) -> bool {
        #[cfg(feature = "stdio")]
        {
            matches!(self, Self::Stdio)
        }
        #[cfg(not(feature = "stdio"))]
        {
            false
        }
    }
}

#[cfg(feature = "http")]
impl HttpConfig {
    /// Load HTTP settings from `MCP_HTTP_*` environment variables.
    pub fn from_env() -> Self {
        let port = std::env::var("MCP_HTTP_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_HTTP_PORT);
        let host = std::env::var("MCP_HTTP_HOST").unwrap_or_else(|_| default_host());
        let rpc_path = std::env::var("MCP_HTTP_PATH").unwrap_or_else(|_| default_rpc_path());
        let enable_cors = std::env::var("MCP_HTTP_CORS")
            .map(|v| v.to_lowercase() != "false" && v != "0")
            .unwrap_or(true);
        let session_mode = match std::env::var("MCP_HTTP_SESSION_MODE") {
            Ok(raw) => HttpSessionMode::parse(&raw).unwrap_or_else(|| {
                tracing::warn!("Unknown MCP_HTTP_SESSION_MODE {:?}, using keyed", raw);
                HttpSessionMode::Keyed
            }),
            Err(_) => HttpSessionMode::default(),
        };
        Self {
            port,
            host,
            rpc_path,
            enable_cors,
            session_mode,
        }
    }

    /// Bind address.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::tests::ENV_TEST_LOCK;

    #[cfg(feature = "http")]
    #[test]
    fn test_http_from_env() {
        let _lock = ENV_TEST_LOCK.lock().unwrap();
        unsafe {
            std::env::set_var("MCP_TRANSPORT", "http");
            std::env::set_var("MCP_HTTP_PORT", "9100");
            std::env::set_var("MCP_HTTP_HOST", "127.0.0.1");
            std::env::set_var("MCP_HTTP_SESSION_MODE", "per-request");
        }
        let config = TransportConfig::from_env();
        match config {
            TransportConfig::Http(cfg) => {
                assert_eq!(cfg.port, 9100);
                assert_eq!(cfg.host, "127.0.0.1");
                assert_eq!(cfg.session_mode, HttpSessionMode::PerRequest);
            }
            #[allow(unreachable_patterns)]
            other => panic!("expected HTTP transport, got {other:?}"),
        }
        unsafe {
            std::env::remove_var("MCP_TRANSPORT");
            std::env::remove_var("MCP_HTTP_PORT");
            std::env::remove_var("MCP_HTTP_HOST");
            std::env::remove_var("MCP_HTTP_SESSION_MODE");
        }
    }

    #[cfg(feature = "http")]
    #[test]
    fn test_http_defaults_listen_on_all_interfaces() {
        let config = HttpConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 10000);
        assert_eq!(config.rpc_path, "/mcp");
    }

    #[cfg(feature = "http")]
    #[test]
    fn test_session_mode_parse() {
        assert_eq!(HttpSessionMode::parse("keyed"), Some(HttpSessionMode::Keyed));
        assert_eq!(
            HttpSessionMode::parse(" Stateless "),
            Some(HttpSessionMode::PerRequest)
        );
        assert_eq!(HttpSessionMode::parse("sticky"), None);
    }

    #[cfg(all(feature = "stdio", feature = "http"))]
    #[test]
    fn test_select_transport_by_name() {
        let stdio = TransportConfig::Stdio;
        assert!(stdio.select("STDIO").is_some_and(|t| t.is_stdio()));

        let http = TransportConfig::http(9000, "0.0.0.0");
        match http.select("http") {
            Some(TransportConfig::Http(cfg)) => assert_eq!(cfg.port, 9000),
            other => panic!("unexpected selection: {other:?}"),
        }
        assert!(http.select("tcp").is_none());
    }

    #[cfg(feature = "http")]
    #[test]
    fn test_description_mentions_session_mode() {
        let config = TransportConfig::http(8080, "127.0.0.1");
        assert_eq!(
            config.description(),
            "HTTP on 127.0.0.1:8080/mcp (sessions: keyed)"
        );
    }
}
