//! Upload tools.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, instrument, warn};

use super::format_size;
use crate::core::security::validate_path;
use crate::domains::box_api::{ApiRequest, UploadPart};
use crate::domains::tools::definitions::common::{entries, item_summary, require_id, require_text};
use crate::domains::tools::{SideEffect, ToolContext, ToolDefinition, ToolError, ToolOutput};

const ROOT_FOLDER_ID: &str = "0";

fn target_folder(folder_id: Option<&str>) -> Result<String, ToolError> {
    match folder_id.map(str::trim).filter(|f| !f.is_empty()) {
        Some(id) => {
            require_id("folder_id", id)?;
            Ok(id.to_string())
        }
        None => Ok(ROOT_FOLDER_ID.to_string()),
    }
}

async fn upload(
    ctx: &ToolContext,
    file_name: &str,
    folder_id: &str,
    content: Bytes,
) -> Result<ToolOutput, ToolError> {
    require_text("file_name", file_name)?;
    if file_name.contains('/') || file_name.contains('\\') {
        return Err(ToolError::invalid_arguments(format!(
            "'{}' is not a plain file name",
            file_name
        )));
    }

    let client = ctx.client()?;
    let size = content.len() as u64;
    let request = ApiRequest::post("/files/content").upload(UploadPart {
        attributes: json!({ "name": file_name, "parent": { "id": folder_id } }),
        file_name: file_name.to_string(),
        content,
    });
    let response = client.send(request).await?;

    let file = entries(&response)
        .first()
        .map(item_summary)
        .unwrap_or(Value::Null);
    let id = file.get("id").and_then(Value::as_str).unwrap_or("?").to_string();
    info!(file_id = %id, size, "Uploaded file");
    Ok(ToolOutput::new(
        format!(
            "Uploaded '{}' ({}) to folder {} as file {}",
            file_name,
            format_size(size),
            folder_id,
            id
        ),
        json!({ "file": file }),
    ))
}

// ============================================================================
// box_upload_file_from_path_tool
// ============================================================================

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct UploadFromPathParams {
    /// Local path of the file to upload (must be inside the configured root).
    pub file_path: String,

    /// Destination folder id (default: root folder "0").
    pub folder_id: Option<String>,

    /// Name for the uploaded file (default: the local file name).
    pub new_file_name: Option<String>,
}

pub struct UploadFromPathTool;

impl UploadFromPathTool {
    pub const NAME: &'static str = "box_upload_file_from_path_tool";

    pub const DESCRIPTION: &'static str = "Upload a local file to a Box folder. The path must lie inside the server's configured root directory.";

    #[instrument(skip_all, fields(path = %params.file_path))]
    pub async fn execute(ctx: ToolContext, params: UploadFromPathParams) -> Result<ToolOutput, ToolError> {
        let folder_id = target_folder(params.folder_id.as_deref())?;

        let path = validate_path(&params.file_path, &ctx.config.security).map_err(|e| {
            warn!("Path security validation failed: {}", e);
            e
        })?;
        if !path.is_file() {
            return Err(ToolError::invalid_arguments(format!(
                "'{}' is not a regular file",
                params.file_path
            )));
        }

        let file_name = match params.new_file_name.filter(|n| !n.trim().is_empty()) {
            Some(name) => name,
            None => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };
        let content = tokio::fs::read(&path).await?;

        upload(&ctx, &file_name, &folder_id, Bytes::from(content)).await
    }

    pub fn definition() -> ToolDefinition {
        ToolDefinition::typed(Self::NAME, Self::DESCRIPTION, SideEffect::Mutating, Self::execute)
    }
}

// ============================================================================
// box_upload_file_from_content_tool
// ============================================================================

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct UploadFromContentParams {
    /// File content: text, or base64 when `is_base64` is set.
    pub content: String,

    /// Name of the new file, including extension.
    pub file_name: String,

    /// Destination folder id (default: root folder "0").
    pub folder_id: Option<String>,

    /// Treat `content` as base64-encoded binary.
    #[serde(default)]
    pub is_base64: bool,
}

pub struct UploadFromContentTool;

impl UploadFromContentTool {
    pub const NAME: &'static str = "box_upload_file_from_content_tool";

    pub const DESCRIPTION: &'static str = "Create a Box file from text content, or from base64 content when is_base64 is true.";

    #[instrument(skip_all, fields(file_name = %params.file_name))]
    pub async fn execute(
        ctx: ToolContext,
        params: UploadFromContentParams,
    ) -> Result<ToolOutput, ToolError> {
        let folder_id = target_folder(params.folder_id.as_deref())?;
        let content = if params.is_base64 {
            STANDARD
                .decode(params.content.trim())
                .map_err(|e| ToolError::invalid_arguments(format!("'content' is not valid base64: {}", e)))?
        } else {
            params.content.into_bytes()
        };

        upload(&ctx, &params.file_name, &folder_id, Bytes::from(content)).await
    }

    pub fn definition() -> ToolDefinition {
        ToolDefinition::typed(Self::NAME, Self::DESCRIPTION, SideEffect::Mutating, Self::execute)
    }
}
