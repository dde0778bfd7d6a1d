//! Box AI tools: question answering and data extraction.

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::{info, instrument};

use super::common::{item_ref, metadata_scope, require_id, require_ids, require_text};
use crate::domains::box_api::ApiRequest;
use crate::domains::tools::{SideEffect, ToolContext, ToolDefinition, ToolError, ToolOutput};

/// Box AI accepts at most this many items per request.
const MAX_AI_ITEMS: usize = 25;

/// Agent used by the enhanced extraction tools.
const ENHANCED_AGENT_ID: &str = "enhanced_extract_agent";

fn agent_ref(id: &str) -> Value {
    json!({ "type": "ai_agent_id", "id": id })
}

/// Attach an `ai_agent` reference to a request body when one is given.
fn with_agent(mut body: Value, agent: Option<&str>) -> Value {
    if let (Some(id), Some(map)) = (agent.filter(|a| !a.trim().is_empty()), body.as_object_mut()) {
        map.insert("ai_agent".to_string(), agent_ref(id));
    }
    body
}

fn file_items(ids: &[String]) -> Vec<Value> {
    ids.iter().map(|id| item_ref("file", id)).collect()
}

fn answer_output(response: Value) -> ToolOutput {
    let answer = response
        .get("answer")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();
    let summary = if answer.is_empty() {
        "Box AI returned no answer".to_string()
    } else {
        answer.clone()
    };
    ToolOutput::new(
        summary,
        json!({
            "answer": answer,
            "completion_reason": response.get("completion_reason").cloned().unwrap_or(Value::Null),
            "created_at": response.get("created_at").cloned().unwrap_or(Value::Null),
        }),
    )
}

async fn ask(ctx: &ToolContext, body: Value) -> Result<ToolOutput, ToolError> {
    let client = ctx.client()?;
    let response = client.send(ApiRequest::post("/ai/ask").json(body)).await?;
    Ok(answer_output(response))
}

fn extraction_output(response: Value, item_count: usize) -> ToolOutput {
    let data = match response {
        Value::Object(_) => response,
        other => json!({ "answer": other }),
    };
    ToolOutput::new(
        format!("Extracted data from {} file(s)", item_count),
        data,
    )
}

// ============================================================================
// box_ai_ask_file_single_tool
// ============================================================================

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct AskFileSingleParams {
    /// Id of the file to ask about.
    pub file_id: String,

    /// The question.
    pub prompt: String,

    /// Optional AI agent id overriding the default agent.
    pub ai_agent_id: Option<String>,
}

/// Ask Box AI a question about one file.
pub struct AskFileSingleTool;

impl AskFileSingleTool {
    pub const NAME: &'static str = "box_ai_ask_file_single_tool";

    pub const DESCRIPTION: &'static str = "Ask Box AI a question about a single file. Returns the answer text.";

    #[instrument(skip_all, fields(file_id = %params.file_id))]
    pub async fn execute(ctx: ToolContext, params: AskFileSingleParams) -> Result<ToolOutput, ToolError> {
        require_id("file_id", &params.file_id)?;
        require_text("prompt", &params.prompt)?;

        let body = json!({
            "mode": "single_item_qa",
            "prompt": params.prompt,
            "items": [item_ref("file", &params.file_id)],
        });
        ask(&ctx, with_agent(body, params.ai_agent_id.as_deref())).await
    }

    pub fn definition() -> ToolDefinition {
        ToolDefinition::typed(Self::NAME, Self::DESCRIPTION, SideEffect::ReadOnly, Self::execute)
    }
}

// ============================================================================
// box_ai_ask_file_multi_tool
// ============================================================================

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct AskFileMultiParams {
    /// Ids of the files to ask about (at most 25).
    pub file_ids: Vec<String>,

    /// The question.
    pub prompt: String,

    /// Optional AI agent id overriding the default agent.
    pub ai_agent_id: Option<String>,
}

/// Ask Box AI a question spanning several files.
pub struct AskFileMultiTool;

impl AskFileMultiTool {
    pub const NAME: &'static str = "box_ai_ask_file_multi_tool";

    pub const DESCRIPTION: &'static str =
        "Ask Box AI a question that spans several files (up to 25). Returns the answer text.";

    #[instrument(skip_all, fields(files = params.file_ids.len()))]
    pub async fn execute(ctx: ToolContext, params: AskFileMultiParams) -> Result<ToolOutput, ToolError> {
        require_ids("file_ids", &params.file_ids, MAX_AI_ITEMS)?;
        require_text("prompt", &params.prompt)?;

        let body = json!({
            "mode": "multiple_item_qa",
            "prompt": params.prompt,
            "items": file_items(&params.file_ids),
        });
        ask(&ctx, with_agent(body, params.ai_agent_id.as_deref())).await
    }

    pub fn definition() -> ToolDefinition {
        ToolDefinition::typed(Self::NAME, Self::DESCRIPTION, SideEffect::ReadOnly, Self::execute)
    }
}

// ============================================================================
// box_ai_ask_hub_tool
// ============================================================================

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct AskHubParams {
    /// Id of the hub to ask about.
    pub hubs_id: String,

    /// The question.
    pub prompt: String,

    /// Optional AI agent id overriding the default agent.
    pub ai_agent_id: Option<String>,
}

/// Ask Box AI a question about a hub.
pub struct AskHubTool;

impl AskHubTool {
    pub const NAME: &'static str = "box_ai_ask_hub_tool";

    pub const DESCRIPTION: &'static str = "Ask Box AI a question about the content of a Box hub.";

    #[instrument(skip_all, fields(hubs_id = %params.hubs_id))]
    pub async fn execute(ctx: ToolContext, params: AskHubParams) -> Result<ToolOutput, ToolError> {
        require_id("hubs_id", &params.hubs_id)?;
        require_text("prompt", &params.prompt)?;

        let body = json!({
            "mode": "single_item_qa",
            "prompt": params.prompt,
            "items": [item_ref("hubs", &params.hubs_id)],
        });
        ask(&ctx, with_agent(body, params.ai_agent_id.as_deref())).await
    }

    pub fn definition() -> ToolDefinition {
        ToolDefinition::typed(Self::NAME, Self::DESCRIPTION, SideEffect::ReadOnly, Self::execute)
    }
}

// ============================================================================
// box_ai_extract_freeform_tool
// ============================================================================

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ExtractFreeformParams {
    /// Ids of the files to extract from (at most 25).
    pub file_ids: Vec<String>,

    /// Describes what to extract, e.g. "contract parties, start date, value".
    pub prompt: String,

    /// Optional AI agent id overriding the default agent.
    pub ai_agent_id: Option<String>,
}

/// Free-form extraction driven by a prompt.
pub struct ExtractFreeformTool;

impl ExtractFreeformTool {
    pub const NAME: &'static str = "box_ai_extract_freeform_tool";

    pub const DESCRIPTION: &'static str =
        "Extract data from files with Box AI using a free-form prompt describing the fields wanted.";

    #[instrument(skip_all, fields(files = params.file_ids.len()))]
    pub async fn execute(ctx: ToolContext, params: ExtractFreeformParams) -> Result<ToolOutput, ToolError> {
        require_ids("file_ids", &params.file_ids, MAX_AI_ITEMS)?;
        require_text("prompt", &params.prompt)?;
        let client = ctx.client()?;

        let body = with_agent(
            json!({ "prompt": params.prompt, "items": file_items(&params.file_ids) }),
            params.ai_agent_id.as_deref(),
        );
        let response = client.send(ApiRequest::post("/ai/extract").json(body)).await?;
        Ok(answer_output(response))
    }

    pub fn definition() -> ToolDefinition {
        ToolDefinition::typed(Self::NAME, Self::DESCRIPTION, SideEffect::ReadOnly, Self::execute)
    }
}

// ============================================================================
// Structured extraction
// ============================================================================

/// How structured extraction describes its targets.
enum Targets<'a> {
    Fields(&'a [Value]),
    Template { key: &'a str, scope: &'static str },
}

async fn extract_structured(
    ctx: &ToolContext,
    file_ids: &[String],
    targets: Targets<'_>,
    agent: Option<&str>,
) -> Result<ToolOutput, ToolError> {
    require_ids("file_ids", file_ids, MAX_AI_ITEMS)?;

    let mut body = Map::new();
    body.insert("items".to_string(), Value::Array(file_items(file_ids)));
    match targets {
        Targets::Fields(fields) => {
            if fields.is_empty() {
                return Err(ToolError::invalid_arguments("'fields' must not be empty"));
            }
            if let Some(bad) = fields.iter().find(|f| f.get("key").and_then(Value::as_str).is_none()) {
                return Err(ToolError::invalid_arguments(format!(
                    "every field needs a string 'key', got {}",
                    bad
                )));
            }
            body.insert("fields".to_string(), Value::Array(fields.to_vec()));
        }
        Targets::Template { key, scope } => {
            require_text("template_key", key)?;
            body.insert(
                "metadata_template".to_string(),
                json!({ "template_key": key, "scope": scope, "type": "metadata_template" }),
            );
        }
    }

    let client = ctx.client()?;
    let body = with_agent(Value::Object(body), agent);
    let response = client
        .send(ApiRequest::post("/ai/extract_structured").json(body))
        .await?;
    let output = extraction_output(response, file_ids.len());
    info!("{}", output.summary);
    Ok(output)
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ExtractFieldsParams {
    /// Ids of the files to extract from (at most 25).
    pub file_ids: Vec<String>,

    /// Field definitions: objects with `key` and optionally `type`,
    /// `displayName`, `description`, `prompt` and `options`.
    pub fields: Vec<Value>,

    /// Optional AI agent id overriding the default agent.
    pub ai_agent_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ExtractTemplateParams {
    /// Ids of the files to extract from (at most 25).
    pub file_ids: Vec<String>,

    /// Key of the metadata template whose fields are extracted.
    pub template_key: String,

    /// Template scope: `enterprise` (default) or `global`.
    pub scope: Option<String>,

    /// Optional AI agent id overriding the default agent.
    pub ai_agent_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ExtractEnhancedFieldsParams {
    /// Ids of the files to extract from (at most 25).
    pub file_ids: Vec<String>,

    /// Field definitions: objects with `key` and optionally `type`,
    /// `displayName`, `description`, `prompt` and `options`.
    pub fields: Vec<Value>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ExtractEnhancedTemplateParams {
    /// Ids of the files to extract from (at most 25).
    pub file_ids: Vec<String>,

    /// Key of the metadata template whose fields are extracted.
    pub template_key: String,

    /// Template scope: `enterprise` (default) or `global`.
    pub scope: Option<String>,
}

pub struct ExtractStructuredFieldsTool;

impl ExtractStructuredFieldsTool {
    pub const NAME: &'static str = "box_ai_extract_structured_using_fields_tool";

    pub const DESCRIPTION: &'static str =
        "Extract structured data from files with Box AI using explicit field definitions.";

    pub async fn execute(ctx: ToolContext, params: ExtractFieldsParams) -> Result<ToolOutput, ToolError> {
        extract_structured(
            &ctx,
            &params.file_ids,
            Targets::Fields(&params.fields),
            params.ai_agent_id.as_deref(),
        )
        .await
    }

    pub fn definition() -> ToolDefinition {
        ToolDefinition::typed(Self::NAME, Self::DESCRIPTION, SideEffect::ReadOnly, Self::execute)
    }
}

pub struct ExtractStructuredTemplateTool;

impl ExtractStructuredTemplateTool {
    pub const NAME: &'static str = "box_ai_extract_structured_using_template_tool";

    pub const DESCRIPTION: &'static str =
        "Extract structured data from files with Box AI using the fields of a metadata template.";

    pub async fn execute(ctx: ToolContext, params: ExtractTemplateParams) -> Result<ToolOutput, ToolError> {
        let scope = metadata_scope(params.scope.as_deref())?;
        extract_structured(
            &ctx,
            &params.file_ids,
            Targets::Template { key: &params.template_key, scope },
            params.ai_agent_id.as_deref(),
        )
        .await
    }

    pub fn definition() -> ToolDefinition {
        ToolDefinition::typed(Self::NAME, Self::DESCRIPTION, SideEffect::ReadOnly, Self::execute)
    }
}

pub struct ExtractEnhancedFieldsTool;

impl ExtractEnhancedFieldsTool {
    pub const NAME: &'static str = "box_ai_extract_structured_enhanced_using_fields_tool";

    pub const DESCRIPTION: &'static str = "Extract structured data from files using explicit field definitions and the enhanced extraction agent (better on long or complex documents, slower).";

    pub async fn execute(
        ctx: ToolContext,
        params: ExtractEnhancedFieldsParams,
    ) -> Result<ToolOutput, ToolError> {
        extract_structured(
            &ctx,
            &params.file_ids,
            Targets::Fields(&params.fields),
            Some(ENHANCED_AGENT_ID),
        )
        .await
    }

    pub fn definition() -> ToolDefinition {
        ToolDefinition::typed(Self::NAME, Self::DESCRIPTION, SideEffect::ReadOnly, Self::execute)
    }
}

pub struct ExtractEnhancedTemplateTool;

impl ExtractEnhancedTemplateTool {
    pub const NAME: &'static str = "box_ai_extract_structured_enhanced_using_template_tool";

    pub const DESCRIPTION: &'static str = "Extract structured data from files using a metadata template and the enhanced extraction agent.";

    pub async fn execute(
        ctx: ToolContext,
        params: ExtractEnhancedTemplateParams,
    ) -> Result<ToolOutput, ToolError> {
        let scope = metadata_scope(params.scope.as_deref())?;
        extract_structured(
            &ctx,
            &params.file_ids,
            Targets::Template { key: &params.template_key, scope },
            Some(ENHANCED_AGENT_ID),
        )
        .await
    }

    pub fn definition() -> ToolDefinition {
        ToolDefinition::typed(Self::NAME, Self::DESCRIPTION, SideEffect::ReadOnly, Self::execute)
    }
}
