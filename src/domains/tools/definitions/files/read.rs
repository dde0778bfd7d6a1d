//! Read the text of a Box file.
//!
//! Plain-text files are returned as-is. Everything else goes through the
//! `extracted_text` representation, which Box may still be generating; in
//! that case the tool says so instead of failing.

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info, instrument};

use super::{extension_of, file_info, file_name_of, is_text_extension};
use crate::domains::box_api::{ApiRequest, BoxApi};
use crate::domains::tools::definitions::common::require_id;
use crate::domains::tools::{SideEffect, ToolContext, ToolDefinition, ToolError, ToolOutput};

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ReadParams {
    /// Id of the file to read.
    pub file_id: String,
}

/// What the representation endpoint reported.
enum Extraction {
    Ready(String),
    Pending(String),
    Unavailable(String),
}

async fn extracted_text(client: &dyn BoxApi, file_id: &str) -> Result<Extraction, ToolError> {
    let request = ApiRequest::get(format!("/files/{}", file_id))
        .query("fields", "representations")
        .header("x-rep-hints", "[extracted_text]");
    let response = client.send(request).await?;

    let Some(rep) = response
        .pointer("/representations/entries")
        .and_then(Value::as_array)
        .and_then(|e| e.first())
    else {
        return Ok(Extraction::Unavailable(
            "Box has no text representation for this file type".to_string(),
        ));
    };

    let state = rep
        .pointer("/status/state")
        .and_then(Value::as_str)
        .unwrap_or("unknown");
    debug!(state, "extracted_text representation");

    match state {
        "success" | "viewable" => {
            let Some(template) = rep.pointer("/content/url_template").and_then(Value::as_str) else {
                return Ok(Extraction::Unavailable(
                    "representation has no content URL".to_string(),
                ));
            };
            let url = template.replace("{+asset_path}", "");
            let bytes = client.fetch_bytes(ApiRequest::absolute(url)).await?;
            Ok(Extraction::Ready(String::from_utf8_lossy(&bytes).into_owned()))
        }
        "none" => {
            // Asking for the info URL starts generation.
            if let Some(info_url) = rep.pointer("/info/url").and_then(Value::as_str) {
                client.send(ApiRequest::absolute(info_url)).await?;
            }
            Ok(Extraction::Pending(
                "text extraction started, try again in a few seconds".to_string(),
            ))
        }
        "pending" => Ok(Extraction::Pending(
            "text extraction in progress, try again in a few seconds".to_string(),
        )),
        other => Ok(Extraction::Unavailable(format!(
            "text extraction failed (state '{}')",
            other
        ))),
    }
}

pub struct ReadTool;

impl ReadTool {
    pub const NAME: &'static str = "box_read_tool";

    pub const DESCRIPTION: &'static str = "Read the text content of a Box file. Text files are returned directly; documents (PDF, Office, ...) are returned as extracted text.";

    #[instrument(skip_all, fields(file_id = %params.file_id))]
    pub async fn execute(ctx: ToolContext, params: ReadParams) -> Result<ToolOutput, ToolError> {
        require_id("file_id", &params.file_id)?;
        let client = ctx.client()?;

        let info = file_info(client.as_ref(), &params.file_id).await?;
        let name = file_name_of(&info);

        if is_text_extension(&extension_of(&info)) {
            let bytes = client
                .fetch_bytes(ApiRequest::get(format!("/files/{}/content", params.file_id)))
                .await?;
            let content = String::from_utf8_lossy(&bytes).into_owned();
            info!(bytes = bytes.len(), "Read text file");
            return Ok(ToolOutput::new(
                format!("Read '{}' ({} bytes)", name, bytes.len()),
                json!({ "file_id": params.file_id, "name": name, "source": "content", "content": content }),
            ));
        }

        match extracted_text(client.as_ref(), &params.file_id).await? {
            Extraction::Ready(content) => Ok(ToolOutput::new(
                format!("Read extracted text of '{}' ({} chars)", name, content.chars().count()),
                json!({ "file_id": params.file_id, "name": name, "source": "extracted_text", "content": content }),
            )),
            Extraction::Pending(message) => Ok(ToolOutput::new(
                format!("'{}': {}", name, message),
                json!({ "file_id": params.file_id, "name": name, "status": "pending", "message": message }),
            )),
            Extraction::Unavailable(message) => Err(ToolError::not_found(format!(
                "cannot read '{}': {}",
                name, message
            ))),
        }
    }

    pub fn definition() -> ToolDefinition {
        ToolDefinition::typed(Self::NAME, Self::DESCRIPTION, SideEffect::ReadOnly, Self::execute)
    }
}
