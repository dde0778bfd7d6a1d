//! HTTP transport implementation.
//!
//! JSON-RPC over POST requests, plus the OAuth redirect endpoint. Each call
//! resolves its own session scope:
//!
//! 1. `Authorization: Bearer <token>` runs on an ephemeral session holding
//!    that token.
//! 2. In keyed mode, `Mcp-Session-Id` names a server-held session created by
//!    `initialize`. Unknown ids get a 404 so the client re-initializes.
//! 3. Anything else runs on an unauthenticated ephemeral session.

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Query, State},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use ::http::{HeaderMap, HeaderValue, StatusCode, header::AUTHORIZATION};
use rmcp::{ErrorData as McpError, model::JsonObject};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, instrument, warn};

use super::{TransportConfig, TransportError, TransportResult, config::HttpConfig};
use super::config::HttpSessionMode;
use crate::core::McpServer;
use crate::domains::auth::{CallbackParams, Credential, SessionId, SessionScope, pages};
use crate::domains::tools::ToolInvocation;

/// Header naming a keyed session.
pub const SESSION_HEADER: &str = "mcp-session-id";

/// JSON-RPC code sent with a 404 for a session id the server does not hold.
const UNKNOWN_SESSION_CODE: i32 = -32001;

/// HTTP transport handler.
pub struct HttpTransport {
    config: HttpConfig,
}

/// JSON-RPC request structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

/// JSON-RPC response structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC error structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcResponse {
    /// Create a success response.
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response.
    pub fn error(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }

    /// Body was not valid JSON-RPC.
    pub fn parse_error(msg: impl Into<String>) -> Self {
        Self::error(None, -32700, msg)
    }

    /// Method not found error.
    pub fn method_not_found(id: Option<Value>) -> Self {
        Self::error(id, -32601, "Method not found")
    }

    /// Invalid request error.
    pub fn invalid_request(id: Option<Value>) -> Self {
        Self::error(id, -32600, "Invalid Request")
    }

    /// Invalid params error.
    pub fn invalid_params(id: Option<Value>, msg: impl Into<String>) -> Self {
        Self::error(id, -32602, msg)
    }

    /// Internal error.
    pub fn internal_error(id: Option<Value>, msg: impl Into<String>) -> Self {
        Self::error(id, -32603, msg)
    }

    /// Protocol-level failure raised by the dispatcher.
    pub fn from_mcp_error(id: Option<Value>, err: McpError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code: err.code.0,
                message: err.message.into_owned(),
                data: err.data,
            }),
        }
    }
}

/// Application state shared across HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    server: McpServer,
    session_mode: HttpSessionMode,
    rpc_path: String,
    callback_path: String,
}

impl HttpTransport {
    /// Create a new HTTP transport with the given config.
    pub fn new(config: HttpConfig) -> Self {
        Self { config }
    }

    /// Create from TransportConfig (extracts HTTP config).
    pub fn from_transport_config(config: &TransportConfig) -> Option<Self> {
        match config {
            TransportConfig::Http(http_config) => Some(Self::new(http_config.clone())),
            #[allow(unreachable_patterns)]
            _ => None,
        }
    }

    /// Get the bind address.
    pub fn address(&self) -> String {
        self.config.address()
    }

    /// Run the HTTP transport until Ctrl-C.
    pub async fn run(self, server: McpServer) -> TransportResult<()> {
        let addr = self.address();
        let callback_path = server.config().box_api.callback_path();
        let app = router(server, &self.config)?;

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| TransportError::bind(&addr, e))?;

        let cors_status = if self.config.enable_cors {
            "enabled"
        } else {
            "disabled"
        };
        info!(
            "Ready - listening on {} (JSON-RPC over HTTP, CORS {}, sessions {})",
            addr,
            cors_status,
            self.config.session_mode.as_str()
        );
        info!("  → JSON-RPC: POST {}", self.config.rpc_path);
        info!("  → OAuth:    GET {}", callback_path);
        info!("  → Health:   GET /health");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| TransportError::http(e.to_string()))?;

        info!("HTTP transport finished");
        Ok(())
    }
}

/// Build the full router: JSON-RPC, session deletion, OAuth callback and
/// health endpoints.
pub fn router(server: McpServer, config: &HttpConfig) -> TransportResult<Router> {
    let callback_path = server.config().box_api.callback_path();
    if [config.rpc_path.as_str(), "/", "/health"].contains(&callback_path.as_str()) {
        return Err(TransportError::init(format!(
            "OAuth callback path {} collides with another route",
            callback_path
        )));
    }

    let state = AppState {
        server,
        session_mode: config.session_mode,
        rpc_path: config.rpc_path.clone(),
        callback_path: callback_path.clone(),
    };

    let mut app = Router::new()
        .route(&config.rpc_path, post(handle_rpc).delete(handle_session_delete))
        .route(&callback_path, get(handle_callback))
        .route("/health", get(health_check))
        .route("/", get(root_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if config.enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
            .expose_headers(Any);
        app = app.layer(cors);
    }
    Ok(app)
}

/// Router with only the OAuth callback and health endpoints, for when the
/// tools are served over stdio.
pub fn callback_router(server: McpServer) -> Router {
    let callback_path = server.config().box_api.callback_path();
    let state = AppState {
        server,
        session_mode: HttpSessionMode::Keyed,
        rpc_path: String::new(),
        callback_path: callback_path.clone(),
    };
    Router::new()
        .route(&callback_path, get(handle_callback))
        .route("/health", get(health_check))
        .with_state(state)
}

/// Serve [`callback_router`] on the host and port of the configured redirect
/// URL. A failed bind is logged, not fatal.
pub fn spawn_callback_listener(server: &McpServer) -> Option<JoinHandle<()>> {
    let redirect_url = &server.config().box_api.redirect_url;
    let url = match reqwest::Url::parse(redirect_url) {
        Ok(url) => url,
        Err(e) => {
            warn!(%redirect_url, error = %e, "Redirect URL does not parse; no callback listener");
            return None;
        }
    };
    let (Some(host), Some(port)) = (url.host_str(), url.port_or_known_default()) else {
        warn!(%redirect_url, "Redirect URL has no host; no callback listener");
        return None;
    };

    let addr = format!("{}:{}", host, port);
    let app = callback_router(server.clone());
    Some(tokio::spawn(async move {
        match tokio::net::TcpListener::bind(&addr).await {
            Ok(listener) => {
                info!("OAuth callback listener on {}", addr);
                if let Err(e) = axum::serve(listener, app).await {
                    warn!(error = %e, "Callback listener stopped");
                }
            }
            Err(e) => warn!(
                %addr,
                error = %e,
                "Could not bind callback listener; browser authorization will not complete"
            ),
        }
    }))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Could not listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Root handler - provides API info.
async fn root_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "name": state.server.name(),
        "version": state.server.version(),
        "transport": "HTTP",
        "endpoints": {
            "rpc": state.rpc_path,
            "oauth_callback": state.callback_path,
            "health": "/health"
        },
        "protocol": "JSON-RPC 2.0",
        "session_mode": state.session_mode.as_str(),
    }))
}

/// Health check endpoint.
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "sessions": state.server.sessions().len(),
        "pending_authorizations": state.server.correlator().pending().waiting(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

fn session_header(headers: &HeaderMap) -> Option<SessionId> {
    let value = headers.get(SESSION_HEADER)?.to_str().ok()?.trim();
    (!value.is_empty()).then(|| SessionId::from(value))
}

/// Decide the session scope of one request.
fn resolve_scope(mode: HttpSessionMode, headers: &HeaderMap) -> SessionScope {
    if let Some(token) = bearer_token(headers) {
        return SessionScope::Ephemeral {
            bearer: Some(Credential::bearer(token)),
        };
    }
    match (mode, session_header(headers)) {
        (HttpSessionMode::Keyed, Some(id)) => SessionScope::Keyed(id),
        _ => SessionScope::Ephemeral { bearer: None },
    }
}

/// Handle JSON-RPC requests.
#[instrument(skip_all, fields(method))]
async fn handle_rpc(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let request: JsonRpcRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "Unparseable JSON-RPC body");
            return Json(JsonRpcResponse::parse_error(format!("Parse error: {}", e))).into_response();
        }
    };
    tracing::Span::current().record("method", request.method.as_str());

    if request.jsonrpc != "2.0" {
        return Json(JsonRpcResponse::invalid_request(request.id)).into_response();
    }

    match request.method.as_str() {
        "initialize" => handle_initialize(&state, &headers, request),
        "ping" => Json(JsonRpcResponse::success(request.id, json!({}))).into_response(),
        "tools/list" => Json(handle_tools_list(&state, request)).into_response(),
        "tools/call" => handle_tools_call(&state, &headers, request).await,

        // Notifications get no JSON-RPC response.
        method if method.starts_with("notifications/") => {
            info!("Received notification: {}", method);
            StatusCode::ACCEPTED.into_response()
        }

        _ => {
            warn!("Unknown method: {}", request.method);
            Json(JsonRpcResponse::method_not_found(request.id)).into_response()
        }
    }
}

/// Handle initialize. In keyed mode a session id is returned in the
/// `Mcp-Session-Id` header, reusing the caller's if it names a live session.
fn handle_initialize(state: &AppState, headers: &HeaderMap, request: JsonRpcRequest) -> Response {
    let info = match serde_json::to_value(state.server.server_info()) {
        Ok(info) => info,
        Err(e) => {
            return Json(JsonRpcResponse::internal_error(request.id, e.to_string())).into_response();
        }
    };
    let mut response = Json(JsonRpcResponse::success(request.id, info)).into_response();

    if state.session_mode == HttpSessionMode::Keyed && bearer_token(headers).is_none() {
        let id = session_header(headers)
            .filter(|id| state.server.sessions().get(id).is_some())
            .unwrap_or_else(SessionId::generate);
        // Keyed guards do not release on drop; this registers the session.
        drop(state.server.sessions().acquire(SessionScope::Keyed(id.clone())));
        info!(session = %id, "Session initialized");
        if let Ok(value) = HeaderValue::from_str(id.as_str()) {
            response.headers_mut().insert(SESSION_HEADER, value);
        }
    }
    response
}

fn handle_tools_list(state: &AppState, request: JsonRpcRequest) -> JsonRpcResponse {
    JsonRpcResponse::success(request.id, json!({ "tools": state.server.list_tools() }))
}

async fn handle_tools_call(state: &AppState, headers: &HeaderMap, request: JsonRpcRequest) -> Response {
    let Some(params) = request.params else {
        return Json(JsonRpcResponse::invalid_params(request.id, "Missing params")).into_response();
    };
    let Some(name) = params.get("name").and_then(Value::as_str) else {
        return Json(JsonRpcResponse::invalid_params(request.id, "Missing tool name")).into_response();
    };
    let arguments: JsonObject = match params.get("arguments") {
        None | Some(Value::Null) => JsonObject::new(),
        Some(Value::Object(args)) => args.clone(),
        Some(_) => {
            return Json(JsonRpcResponse::invalid_params(request.id, "'arguments' must be an object"))
                .into_response();
        }
    };

    // Held until the call completes; ephemeral sessions end with it.
    let sessions = state.server.sessions();
    let guard = match resolve_scope(state.session_mode, headers) {
        SessionScope::Keyed(id) => match sessions.resume(&id) {
            Some(guard) => guard,
            None => {
                warn!(session = %id, "Call on unknown session");
                let body = JsonRpcResponse::error(
                    request.id,
                    UNKNOWN_SESSION_CODE,
                    format!("Session '{}' not found; initialize a new one", id),
                );
                return (StatusCode::NOT_FOUND, Json(body)).into_response();
            }
        },
        scope => sessions.acquire(scope),
    };
    let invocation = ToolInvocation::new(name, arguments, guard.session().clone());

    let response = match state.server.call(invocation).await {
        Ok(result) => match serde_json::to_value(result) {
            Ok(value) => JsonRpcResponse::success(request.id, value),
            Err(e) => JsonRpcResponse::internal_error(request.id, e.to_string()),
        },
        Err(err) => JsonRpcResponse::from_mcp_error(request.id, err),
    };
    Json(response).into_response()
}

/// End a keyed session.
async fn handle_session_delete(State(state): State<AppState>, headers: HeaderMap) -> StatusCode {
    let Some(id) = session_header(&headers) else {
        return StatusCode::BAD_REQUEST;
    };
    if state.server.sessions().teardown_by_id(&id) {
        info!(session = %id, "Session deleted by client");
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

/// OAuth redirect target. Always answers with a human-readable page.
async fn handle_callback(State(state): State<AppState>, Query(params): Query<CallbackParams>) -> Response {
    match state.server.correlator().handle_redirect(params).await {
        Ok(session) => {
            info!(%session, "Browser authorization completed");
            Html(pages::success_page()).into_response()
        }
        Err(err) => {
            let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::BAD_REQUEST);
            warn!(kind = err.kind(), error = %err, "OAuth callback failed");
            (status, Html(pages::error_page(&err.to_string()))).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Config;
    use crate::core::server::testing::{server_with, server_with_tools, stalling_tool};
    use crate::domains::box_api::fake::FakeBoxApi;
    use axum::body::Body;
    use ::http::{Method as HttpMethod, Request};
    use http_body_util::BodyExt;
    use reqwest::Method;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tower::ServiceExt;

    fn app(mode: HttpSessionMode) -> (Router, McpServer, Arc<FakeBoxApi>) {
        let config = HttpConfig {
            session_mode: mode,
            ..Default::default()
        };
        let (server, api) = server_with(Config {
            transport: TransportConfig::Http(config.clone()),
            ..Default::default()
        });
        (router(server.clone(), &config).unwrap(), server, api)
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, String) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, headers, String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn rpc(app: &Router, headers: &[(&str, &str)], body: Value) -> (StatusCode, HeaderMap, Value) {
        let mut builder = Request::builder()
            .method(HttpMethod::POST)
            .uri("/mcp")
            .header("content-type", "application/json");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let (status, headers, text) = send(app, builder.body(Body::from(body.to_string())).unwrap()).await;
        let value = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap()
        };
        (status, headers, value)
    }

    fn call(id: u64, name: &str, arguments: Value) -> Value {
        json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "tools/call",
            "params": { "name": name, "arguments": arguments }
        })
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[test]
    fn test_resolve_scope_precedence() {
        let mut headers = HeaderMap::new();
        headers.insert(SESSION_HEADER, HeaderValue::from_static("abc"));
        assert!(matches!(
            resolve_scope(HttpSessionMode::Keyed, &headers),
            SessionScope::Keyed(id) if id.as_str() == "abc"
        ));
        assert!(matches!(
            resolve_scope(HttpSessionMode::PerRequest, &headers),
            SessionScope::Ephemeral { bearer: None }
        ));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer tok"));
        match resolve_scope(HttpSessionMode::Keyed, &headers) {
            SessionScope::Ephemeral { bearer: Some(cred) } => assert_eq!(cred.access_token(), "tok"),
            other => panic!("unexpected scope {:?}", other),
        }

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic xyz"));
        assert!(bearer_token(&headers).is_none());
    }

    #[tokio::test]
    async fn test_initialize_returns_session_header() {
        let (app, server, _api) = app(HttpSessionMode::Keyed);
        let (status, headers, body) = rpc(
            &app,
            &[],
            json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}}),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"]["serverInfo"]["name"], "box-mcp-server");
        assert!(body["result"]["capabilities"]["tools"].is_object());
        let id = headers.get(SESSION_HEADER).unwrap().to_str().unwrap();
        assert!(server.sessions().get(&SessionId::from(id)).is_some());
    }

    #[tokio::test]
    async fn test_per_request_mode_issues_no_session() {
        let (app, server, _api) = app(HttpSessionMode::PerRequest);
        let (_, headers, _) = rpc(
            &app,
            &[],
            json!({"jsonrpc": "2.0", "id": 1, "method": "initialize"}),
        )
        .await;
        assert!(headers.get(SESSION_HEADER).is_none());
        assert!(server.sessions().is_empty());
    }

    #[tokio::test]
    async fn test_tools_list_and_unknown_method() {
        let (app, _server, _api) = app(HttpSessionMode::Keyed);
        let (_, _, body) = rpc(&app, &[], json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"})).await;
        assert_eq!(body["result"]["tools"].as_array().unwrap().len(), 36);
        assert_eq!(body["result"]["tools"][0]["name"], "box_who_am_i");

        let (_, _, body) = rpc(&app, &[], json!({"jsonrpc": "2.0", "id": 3, "method": "resources/list"})).await;
        assert_eq!(body["error"]["code"], -32601);
    }

    #[tokio::test]
    async fn test_malformed_body_is_parse_error() {
        let (app, _server, _api) = app(HttpSessionMode::Keyed);
        let request = Request::builder()
            .method(HttpMethod::POST)
            .uri("/mcp")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, _, text) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        let body: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(body["error"]["code"], -32700);
    }

    #[tokio::test]
    async fn test_notification_is_accepted_without_body() {
        let (app, _server, _api) = app(HttpSessionMode::Keyed);
        let (status, _, body) = rpc(
            &app,
            &[],
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert!(body.is_null());
    }

    #[tokio::test]
    async fn test_unknown_tool_is_protocol_error() {
        let (app, _server, api) = app(HttpSessionMode::Keyed);
        let (_, _, body) = rpc(&app, &[], call(4, "box_nope", json!({}))).await;
        assert!(body["error"]["code"].is_i64());
        assert!(body.get("result").is_none());
        assert_eq!(api.call_count(), 0);
    }

    #[tokio::test]
    async fn test_authorize_callback_then_call_on_keyed_session() {
        let (app, server, api) = app(HttpSessionMode::Keyed);
        api.on(Method::GET, "/users/me", json!({"name": "Ada", "login": "ada@example.com"}));

        let (_, headers, _) = rpc(
            &app,
            &[],
            json!({"jsonrpc": "2.0", "id": 1, "method": "initialize"}),
        )
        .await;
        let session = headers.get(SESSION_HEADER).unwrap().to_str().unwrap().to_string();
        let keyed = [(SESSION_HEADER, session.as_str())];

        let (_, _, body) = rpc(&app, &keyed, call(2, "box_who_am_i", json!({}))).await;
        assert_eq!(body["result"]["isError"], true);

        let (_, _, body) = rpc(&app, &keyed, call(3, "box_authorize_app_tool", json!({}))).await;
        let token = body["result"]["structuredContent"]["state_token"]
            .as_str()
            .unwrap()
            .to_string();
        assert!(
            body["result"]["structuredContent"]["authorization_url"]
                .as_str()
                .unwrap()
                .contains(&token)
        );

        let (status, _, page) = send(&app, get(&format!("/callback?code=abc&state={}", token))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(page.contains("Authorization successful"));

        let (_, _, body) = rpc(&app, &keyed, call(4, "box_who_am_i", json!({}))).await;
        assert_eq!(body["result"]["isError"], false);
        assert_eq!(body["result"]["structuredContent"]["login"], "ada@example.com");

        // A replayed redirect finds nothing to complete.
        let (status, _, _) = send(&app, get(&format!("/callback?code=abc&state={}", token))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(server.sessions().len(), 1);
    }

    #[tokio::test]
    async fn test_callback_rejections() {
        let (app, _server, _api) = app(HttpSessionMode::Keyed);

        let (status, _, page) = send(&app, get("/callback?code=abc&state=nope")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(page.contains("Authorization"));

        let (status, _, _) = send(&app, get("/callback?state=nope")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _, page) = send(&app, get("/callback?error=access_denied&error_description=User+denied")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(page.contains("User denied"));
    }

    #[tokio::test]
    async fn test_bearer_request_runs_on_ephemeral_session() {
        let (app, server, api) = app(HttpSessionMode::PerRequest);
        api.on(Method::GET, "/users/me", json!({"name": "Bo", "login": "bo@example.com"}));

        let (_, _, body) = rpc(&app, &[], call(1, "box_who_am_i", json!({}))).await;
        assert_eq!(body["result"]["isError"], true);

        let (_, _, body) = rpc(
            &app,
            &[("authorization", "Bearer tok")],
            call(2, "box_who_am_i", json!({})),
        )
        .await;
        assert_eq!(body["result"]["isError"], false);

        // Ephemeral sessions cannot start a browser flow.
        let (_, _, body) = rpc(
            &app,
            &[("authorization", "Bearer tok")],
            call(3, "box_authorize_app_tool", json!({})),
        )
        .await;
        assert_eq!(body["result"]["isError"], true);
        assert!(server.sessions().is_empty());
    }

    #[tokio::test]
    async fn test_delete_session() {
        let (app, server, _api) = app(HttpSessionMode::Keyed);
        let (_, headers, _) = rpc(
            &app,
            &[],
            json!({"jsonrpc": "2.0", "id": 1, "method": "initialize"}),
        )
        .await;
        let session = headers.get(SESSION_HEADER).unwrap().clone();

        let delete = |value: HeaderValue| {
            Request::builder()
                .method(HttpMethod::DELETE)
                .uri("/mcp")
                .header(SESSION_HEADER, value)
                .body(Body::empty())
                .unwrap()
        };
        let (status, _, _) = send(&app, delete(session.clone())).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(server.sessions().is_empty());

        let (status, _, _) = send(&app, delete(session)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_call_on_unknown_session_is_not_found() {
        let (app, server, api) = app(HttpSessionMode::Keyed);
        let (status, _, body) = rpc(
            &app,
            &[(SESSION_HEADER, "made-up")],
            call(1, "box_who_am_i", json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], UNKNOWN_SESSION_CODE);
        assert!(server.sessions().is_empty());
        assert_eq!(api.call_count(), 0);

        // Deleted sessions are not revived either.
        let (_, headers, _) = rpc(
            &app,
            &[],
            json!({"jsonrpc": "2.0", "id": 2, "method": "initialize"}),
        )
        .await;
        let session = headers.get(SESSION_HEADER).unwrap().to_str().unwrap().to_string();
        assert!(server.sessions().teardown_by_id(&SessionId::from(session.as_str())));
        let (status, _, _) = rpc(
            &app,
            &[(SESSION_HEADER, session.as_str())],
            call(3, "box_who_am_i", json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(server.sessions().is_empty());
    }

    #[tokio::test]
    async fn test_aborted_request_releases_ephemeral_session_once() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let server = server_with_tools(vec![stalling_tool(tx)]);
        let app = router(server.clone(), &HttpConfig::default()).unwrap();

        let request = rpc(
            &app,
            &[("authorization", "Bearer tok")],
            call(1, "stall", json!({})),
        );
        assert!(tokio::time::timeout(Duration::from_millis(50), request).await.is_err());

        let session = rx.try_recv().unwrap();
        assert!(session.is_closed());
        assert!(!session.close());
        assert!(server.sessions().is_empty());
    }

    #[tokio::test]
    async fn test_health_reports_sessions() {
        let (app, _server, _api) = app(HttpSessionMode::Keyed);
        let (status, _, text) = send(&app, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        let body: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["sessions"], 0);
    }

    #[test]
    fn test_callback_path_collision_is_rejected() {
        let (server, _api) = server_with(Config::default());
        let config = HttpConfig {
            rpc_path: "/callback".to_string(),
            ..Default::default()
        };
        assert!(matches!(router(server, &config), Err(TransportError::InitError(_))));
    }
}
