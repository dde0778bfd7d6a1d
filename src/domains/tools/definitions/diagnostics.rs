//! Server diagnostics.

use serde_json::{Value, json};

use crate::core::transport::TransportConfig;
use crate::domains::tools::{NoParams, SideEffect, ToolContext, ToolDefinition, ToolError, ToolOutput};

/// Reports what this server is and how it is reachable. Needs no
/// authorization.
pub struct ServerInfoTool;

impl ServerInfoTool {
    pub const NAME: &'static str = "mcp_server_info";

    pub const DESCRIPTION: &'static str =
        "Report the MCP server's name, version and transport (with host and port for HTTP).";

    pub async fn execute(ctx: ToolContext, _params: NoParams) -> Result<ToolOutput, ToolError> {
        let config = &ctx.config;
        let (host, port) = match &config.transport {
            #[cfg(feature = "http")]
            TransportConfig::Http(http) => (json!(http.host), json!(http.port)),
            #[allow(unreachable_patterns)]
            _ => (Value::Null, Value::Null),
        };

        Ok(ToolOutput::new(
            format!(
                "{} v{} over {}",
                config.server.name,
                config.server.version,
                config.transport.description()
            ),
            json!({
                "name": config.server.name,
                "version": config.server.version,
                "transport": config.transport.name(),
                "host": host,
                "port": port,
            }),
        ))
    }

    pub fn definition() -> ToolDefinition {
        ToolDefinition::typed(Self::NAME, Self::DESCRIPTION, SideEffect::ReadOnly, Self::execute)
    }
}
