//! Identity and authorization tools.

use serde_json::{Value, json};
use tracing::{info, instrument};

use crate::domains::box_api::ApiRequest;
use crate::domains::tools::{NoParams, SideEffect, ToolContext, ToolDefinition, ToolError, ToolOutput};

// ============================================================================
// box_who_am_i
// ============================================================================

/// Reports the Box user the session is authenticated as.
pub struct WhoAmITool;

impl WhoAmITool {
    pub const NAME: &'static str = "box_who_am_i";

    pub const DESCRIPTION: &'static str =
        "Return the Box user the current session is authenticated as.";

    #[instrument(skip_all)]
    pub async fn execute(ctx: ToolContext, _params: NoParams) -> Result<ToolOutput, ToolError> {
        let client = ctx.client()?;
        let user = client.send(ApiRequest::get("/users/me")).await?;

        let name = user.get("name").and_then(Value::as_str).unwrap_or("unknown");
        let login = user.get("login").and_then(Value::as_str).unwrap_or("unknown");
        Ok(ToolOutput::new(format!("Authenticated as {} ({})", name, login), user))
    }

    pub fn definition() -> ToolDefinition {
        ToolDefinition::typed(Self::NAME, Self::DESCRIPTION, SideEffect::ReadOnly, Self::execute)
    }
}

// ============================================================================
// box_authorize_app_tool
// ============================================================================

/// Starts the OAuth authorization-code flow for the current session.
pub struct AuthorizeAppTool;

impl AuthorizeAppTool {
    pub const NAME: &'static str = "box_authorize_app_tool";

    pub const DESCRIPTION: &'static str = "Start Box OAuth authorization for this session. Returns a URL the user must open in a browser; once the user approves, the session is authenticated. Calling this again replaces any pending request and signs out the current user.";

    #[instrument(skip_all, fields(session = %ctx.session.id()))]
    pub async fn execute(ctx: ToolContext, _params: NoParams) -> Result<ToolOutput, ToolError> {
        let request = ctx.correlator.begin_authorization(&ctx.session)?;
        info!("Authorization URL issued");

        Ok(ToolOutput::new(
            format!(
                "Open this URL in a browser to authorize Box access: {}",
                request.authorization_url
            ),
            json!({
                "authorization_url": request.authorization_url,
                "state_token": request.state_token,
                "expires_at": request.expires_at,
            }),
        ))
    }

    pub fn definition() -> ToolDefinition {
        ToolDefinition::typed(Self::NAME, Self::DESCRIPTION, SideEffect::Session, Self::execute)
    }
}
