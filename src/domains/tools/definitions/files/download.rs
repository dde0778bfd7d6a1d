//! Download a Box file, returning its content or saving it locally.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument, warn};

use super::{extension_of, file_info, file_name_of, format_size, is_text_extension};
use crate::core::security::validate_destination;
use crate::domains::box_api::ApiRequest;
use crate::domains::tools::definitions::common::require_id;
use crate::domains::tools::{SideEffect, ToolContext, ToolDefinition, ToolError, ToolOutput};

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DownloadParams {
    /// Id of the file to download.
    pub file_id: String,

    /// Local path to save to (inside the configured root). Without it the
    /// content is returned: as text for text files, base64 otherwise.
    pub save_path: Option<String>,

    /// Replace an existing local file.
    #[serde(default)]
    pub overwrite: bool,
}

pub struct DownloadFileTool;

impl DownloadFileTool {
    pub const NAME: &'static str = "box_download_file_tool";

    pub const DESCRIPTION: &'static str = "Download a Box file. With save_path the file is written locally (inside the configured root); otherwise the content is returned as text or base64.";

    #[instrument(skip_all, fields(file_id = %params.file_id))]
    pub async fn execute(ctx: ToolContext, params: DownloadParams) -> Result<ToolOutput, ToolError> {
        require_id("file_id", &params.file_id)?;

        // Validate the destination before touching the network.
        let destination = match params.save_path.as_deref().filter(|p| !p.trim().is_empty()) {
            Some(save_path) => {
                let path = validate_destination(save_path, &ctx.config.security).map_err(|e| {
                    warn!("Path security validation failed: {}", e);
                    e
                })?;
                if path.exists() && !params.overwrite {
                    return Err(ToolError::invalid_arguments(format!(
                        "'{}' already exists; set overwrite to replace it",
                        path.display()
                    )));
                }
                Some(path)
            }
            None => None,
        };

        let client = ctx.client()?;
        let info = file_info(client.as_ref(), &params.file_id).await?;
        let name = file_name_of(&info);
        let bytes = client
            .fetch_bytes(ApiRequest::get(format!("/files/{}/content", params.file_id)))
            .await?;
        let size = bytes.len() as u64;

        if let Some(path) = destination {
            tokio::fs::write(&path, &bytes).await?;
            info!(path = %path.display(), size, "Saved download");
            return Ok(ToolOutput::new(
                format!("Saved '{}' ({}) to {}", name, format_size(size), path.display()),
                json!({ "file_id": params.file_id, "name": name, "size": size, "saved_to": path.display().to_string() }),
            ));
        }

        let (encoding, content) = match std::str::from_utf8(&bytes) {
            Ok(text) if is_text_extension(&extension_of(&info)) => ("text", text.to_string()),
            _ => ("base64", STANDARD.encode(&bytes)),
        };
        Ok(ToolOutput::new(
            format!("Downloaded '{}' ({}) as {}", name, format_size(size), encoding),
            json!({
                "file_id": params.file_id,
                "name": name,
                "size": size,
                "encoding": encoding,
                "content": content,
            }),
        ))
    }

    pub fn definition() -> ToolDefinition {
        ToolDefinition::typed(Self::NAME, Self::DESCRIPTION, SideEffect::Mutating, Self::execute)
    }
}
