//! MCP Server implementation and lifecycle management.
//!
//! [`McpServer`] owns the gateway's stores: the tool registry (behind the
//! dispatcher), the session manager and the callback correlator. They are
//! built once at startup and passed to the transports explicitly.
//!
//! ## Sessions
//!
//! A transport binds a session scope with [`McpServer::connect`] and serves
//! the returned [`SessionHandler`]. The handler holds the session guard, so
//! the session is torn down however the connection ends.
//!
//! **Adding a new tool does NOT require modifying this file!** Tools are
//! listed in `domains/tools/definitions/mod.rs`.

use rmcp::{
    ErrorData as McpError, RoleServer, ServerHandler, model::*, service::RequestContext,
};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, instrument};

use super::config::Config;
use super::error::Result;
use crate::domains::auth::{
    BoxOAuthClient, CallbackCorrelator, CodeExchanger, SessionGuard, SessionManager, SessionScope,
    UnconfiguredExchanger, spawn_sweeper,
};
use crate::domains::box_api::{BoxConnector, HttpConnector};
use crate::domains::tools::{Dispatcher, ToolInvocation, ToolRegistry, catalog};

const INSTRUCTIONS: &str = "Box content tools. Call box_who_am_i to check the session's \
authorization; if it is not authorized, call box_authorize_app_tool and ask the user to open \
the returned URL. Over HTTP a bearer token may be sent instead.";

/// The gateway: registry, dispatcher, sessions and callback correlator.
#[derive(Clone)]
pub struct McpServer {
    /// Server configuration.
    config: Arc<Config>,

    /// Resolves and runs tool invocations.
    dispatcher: Arc<Dispatcher>,

    /// Live sessions.
    sessions: Arc<SessionManager>,

    /// Pending authorizations and the OAuth code exchange.
    correlator: Arc<CallbackCorrelator>,
}

impl McpServer {
    /// Create a new MCP server talking to Box with the given configuration.
    ///
    /// Fails if the tool catalog cannot be registered.
    pub fn new(config: Config) -> Result<Self> {
        let connector = Arc::new(HttpConnector::new(config.box_api.clone()));
        let exchanger: Arc<dyn CodeExchanger> = match BoxOAuthClient::from_config(&config.box_api)? {
            Some(client) => Arc::new(client),
            None => Arc::new(UnconfiguredExchanger),
        };
        Self::with_collaborators(config, connector, exchanger)
    }

    /// Create a server with explicit platform collaborators.
    pub fn with_collaborators(
        config: Config,
        connector: Arc<dyn BoxConnector>,
        exchanger: Arc<dyn CodeExchanger>,
    ) -> Result<Self> {
        let registry = ToolRegistry::from_definitions(catalog())?;
        Ok(Self::with_registry(config, registry, connector, exchanger))
    }

    /// Create a server over an explicit tool registry.
    pub fn with_registry(
        config: Config,
        registry: ToolRegistry,
        connector: Arc<dyn BoxConnector>,
        exchanger: Arc<dyn CodeExchanger>,
    ) -> Self {
        let config = Arc::new(config);
        let registry = Arc::new(registry);
        info!("Registered {} tools", registry.len());

        let sessions = Arc::new(SessionManager::new(
            connector,
            config.auth.session_idle_ttl(),
        ));
        let correlator = Arc::new(CallbackCorrelator::new(
            config.box_api.clone(),
            config.auth.pending_ttl(),
            exchanger,
        ));
        let dispatcher = Arc::new(Dispatcher::new(registry, correlator.clone(), config.clone()));

        Self {
            config,
            dispatcher,
            sessions,
            correlator,
        }
    }

    /// Get the server name.
    pub fn name(&self) -> &str {
        &self.config.server.name
    }

    /// Get the server version.
    pub fn version(&self) -> &str {
        &self.config.server.version
    }

    /// Get the server configuration.
    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub fn correlator(&self) -> &Arc<CallbackCorrelator> {
        &self.correlator
    }

    /// Protocol-level description of the server, returned by `initialize`.
    pub fn server_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(INSTRUCTIONS.to_string()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: self.config.server.name.clone(),
                version: self.config.server.version.clone(),
                ..Implementation::from_build_env()
            },
            ..Default::default()
        }
    }

    /// All tools in registration order.
    pub fn list_tools(&self) -> Vec<Tool> {
        self.dispatcher.list_tools()
    }

    /// Dispatch one invocation and wrap the outcome for the protocol.
    pub async fn call(&self, invocation: ToolInvocation) -> std::result::Result<CallToolResult, McpError> {
        self.dispatcher.call(invocation).await
    }

    /// Bind a session scope and return a protocol handler for it.
    pub fn connect(&self, scope: SessionScope) -> SessionHandler {
        SessionHandler {
            server: self.clone(),
            guard: self.sessions.acquire(scope),
        }
    }

    /// Start the background sweeper of pending authorizations and idle sessions.
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        spawn_sweeper(
            self.correlator.clone(),
            self.sessions.clone(),
            self.config.auth.sweep_interval(),
        )
    }

    /// Tear down every session and drop pending authorizations.
    #[instrument(skip(self))]
    pub fn shutdown(&self) {
        let closed = self.sessions.teardown_all();
        self.correlator.shutdown();
        info!(sessions = closed, "Gateway stores torn down");
    }
}

/// Protocol handler bound to one session.
///
/// Dropping the handler releases the session (for connection and ephemeral
/// scopes).
pub struct SessionHandler {
    server: McpServer,
    guard: SessionGuard,
}

impl SessionHandler {
    pub fn session(&self) -> &SessionGuard {
        &self.guard
    }
}

impl ServerHandler for SessionHandler {
    fn get_info(&self) -> ServerInfo {
        self.server.server_info()
    }

    #[instrument(skip_all)]
    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> std::result::Result<ListToolsResult, McpError> {
        Ok(ListToolsResult {
            tools: self.server.list_tools(),
            next_cursor: None,
            meta: None,
        })
    }

    #[instrument(skip_all, fields(tool = %request.name))]
    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> std::result::Result<CallToolResult, McpError> {
        self.guard.touch();
        let invocation = ToolInvocation::new(
            request.name,
            request.arguments.unwrap_or_default(),
            self.guard.session().clone(),
        );
        self.server.call(invocation).await
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::core::config::BoxConfig;
    use crate::domains::auth::fake::FakeExchanger;
    use crate::domains::auth::SessionContext;
    use crate::domains::box_api::fake::{FakeBoxApi, FakeConnector};
    use crate::domains::tools::{NoParams, SideEffect, ToolContext, ToolDefinition, ToolError, ToolOutput};
    use tokio::sync::mpsc::UnboundedSender;

    /// Server over in-memory collaborators with OAuth configured.
    pub fn server_with(mut config: Config) -> (McpServer, Arc<FakeBoxApi>) {
        config.box_api = BoxConfig {
            client_id: Some("client".to_string()),
            client_secret: Some("secret".to_string()),
            ..config.box_api
        };
        let api = FakeBoxApi::new();
        let server = McpServer::with_collaborators(
            config,
            FakeConnector::new(api.clone()),
            FakeExchanger::new(),
        )
        .unwrap();
        (server, api)
    }

    pub fn server() -> (McpServer, Arc<FakeBoxApi>) {
        server_with(Config::default())
    }

    /// Server whose only tools are `definitions`.
    pub fn server_with_tools(definitions: Vec<ToolDefinition>) -> McpServer {
        McpServer::with_registry(
            Config::default(),
            ToolRegistry::from_definitions(definitions).unwrap(),
            FakeConnector::new(FakeBoxApi::new()),
            FakeExchanger::new(),
        )
    }

    /// A tool named `stall` that reports its session and never completes.
    pub fn stalling_tool(seen: UnboundedSender<Arc<SessionContext>>) -> ToolDefinition {
        ToolDefinition::typed(
            "stall",
            "Never finishes.",
            SideEffect::ReadOnly,
            move |ctx: ToolContext, _params: NoParams| {
                let _ = seen.send(ctx.session.clone());
                std::future::pending::<std::result::Result<ToolOutput, ToolError>>()
            },
        )
    }
}
