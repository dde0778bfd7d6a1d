//! STDIO transport implementation.
//!
//! Standard input/output transport for MCP - the default mode. One client,
//! one connection session for the lifetime of the pipe.

use rmcp::ServiceExt;
use tracing::info;

use super::{TransportError, TransportResult};
use crate::core::McpServer;
use crate::domains::auth::{SessionId, SessionScope};

/// STDIO transport handler.
pub struct StdioTransport;

impl StdioTransport {
    /// Run the STDIO transport.
    ///
    /// The connection session is torn down when the pipe closes, whether the
    /// client disconnects cleanly or not.
    pub async fn run(server: McpServer) -> TransportResult<()> {
        // The browser still needs somewhere to land after authorizing.
        #[cfg(feature = "http")]
        let callback_listener = if server.config().auth.callback_listener {
            super::http::spawn_callback_listener(&server)
        } else {
            None
        };

        let handler = server.connect(SessionScope::Connection(SessionId::generate()));
        info!(
            session = %handler.session().id(),
            "Ready - communicating via stdin/stdout"
        );

        let result = serve(handler).await;

        #[cfg(feature = "http")]
        if let Some(listener) = callback_listener {
            listener.abort();
        }

        info!("STDIO transport finished");
        result
    }
}

async fn serve(handler: crate::core::server::SessionHandler) -> TransportResult<()> {
    let service = handler
        .serve(rmcp::transport::stdio())
        .await
        .map_err(|e| TransportError::init(e.to_string()))?;

    service
        .waiting()
        .await
        .map_err(|e| TransportError::service(e.to_string()))?;
    Ok(())
}
