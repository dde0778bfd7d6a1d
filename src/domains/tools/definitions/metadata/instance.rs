//! Metadata instance tools: attach, read, update and remove template data on
//! a file.

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::{info, instrument};

use crate::domains::box_api::ApiRequest;
use crate::domains::tools::definitions::common::{metadata_scope, require_id, require_text};
use crate::domains::tools::{SideEffect, ToolContext, ToolDefinition, ToolError, ToolOutput};

fn instance_path(file_id: &str, scope: &str, template_key: &str) -> String {
    format!("/files/{}/metadata/{}/{}", file_id, scope, template_key)
}

/// Validate the shared arguments and build the instance path.
fn resolve(file_id: &str, template_key: &str, scope: Option<&str>) -> Result<String, ToolError> {
    require_id("file_id", file_id)?;
    require_text("template_key", template_key)?;
    let scope = metadata_scope(scope)?;
    Ok(instance_path(file_id, scope, template_key.trim()))
}

/// User-visible fields of an instance (Box adds `$`-prefixed bookkeeping).
fn user_fields(instance: &Value) -> Map<String, Value> {
    instance
        .as_object()
        .map(|obj| {
            obj.iter()
                .filter(|(k, _)| !k.starts_with('$'))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        })
        .unwrap_or_default()
}

/// JSON Pointer escaping of a single path segment.
fn pointer(key: &str) -> String {
    format!("/{}", key.replace('~', "~0").replace('/', "~1"))
}

/// Build a JSON-Patch turning `current` into `desired`.
///
/// Keys in both are replaced, new keys added. With `remove_missing`, keys of
/// `current` absent from `desired` are removed.
fn build_patch(
    current: &Map<String, Value>,
    desired: &Map<String, Value>,
    remove_missing: bool,
) -> Vec<Value> {
    let mut ops = Vec::new();
    for (key, value) in desired {
        let op = if current.contains_key(key) { "replace" } else { "add" };
        ops.push(json!({ "op": op, "path": pointer(key), "value": value }));
    }
    if remove_missing {
        for key in current.keys().filter(|k| !desired.contains_key(*k)) {
            ops.push(json!({ "op": "remove", "path": pointer(key) }));
        }
    }
    ops
}

fn require_object(metadata: &Value) -> Result<&Map<String, Value>, ToolError> {
    metadata
        .as_object()
        .ok_or_else(|| ToolError::invalid_arguments("'metadata' must be an object"))
}

// ============================================================================
// box_metadata_set_instance_on_file_tool
// ============================================================================

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SetInstanceParams {
    /// File to attach metadata to.
    pub file_id: String,

    /// Template key.
    pub template_key: String,

    /// Field values keyed by template field key.
    pub metadata: Value,

    /// `enterprise` (default) or `global`.
    pub scope: Option<String>,
}

pub struct SetInstanceTool;

impl SetInstanceTool {
    pub const NAME: &'static str = "box_metadata_set_instance_on_file_tool";

    pub const DESCRIPTION: &'static str = "Attach a metadata template instance with the given field values to a file.";

    #[instrument(skip_all, fields(file_id = %params.file_id, template_key = %params.template_key))]
    pub async fn execute(ctx: ToolContext, params: SetInstanceParams) -> Result<ToolOutput, ToolError> {
        let path = resolve(&params.file_id, &params.template_key, params.scope.as_deref())?;
        require_object(&params.metadata)?;
        let client = ctx.client()?;

        let instance = client.send(ApiRequest::post(path).json(params.metadata)).await?;
        info!("Metadata instance created");
        Ok(ToolOutput::new(
            format!(
                "Set '{}' metadata on file {}",
                params.template_key.trim(),
                params.file_id
            ),
            instance,
        ))
    }

    pub fn definition() -> ToolDefinition {
        ToolDefinition::typed(Self::NAME, Self::DESCRIPTION, SideEffect::Mutating, Self::execute)
    }
}

// ============================================================================
// box_metadata_get_instance_on_file_tool / box_metadata_delete_instance_on_file_tool
// ============================================================================

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct InstanceParams {
    /// File holding the metadata.
    pub file_id: String,

    /// Template key.
    pub template_key: String,

    /// `enterprise` (default) or `global`.
    pub scope: Option<String>,
}

pub struct GetInstanceTool;

impl GetInstanceTool {
    pub const NAME: &'static str = "box_metadata_get_instance_on_file_tool";

    pub const DESCRIPTION: &'static str = "Get the metadata instance of a template on a file.";

    pub async fn execute(ctx: ToolContext, params: InstanceParams) -> Result<ToolOutput, ToolError> {
        let path = resolve(&params.file_id, &params.template_key, params.scope.as_deref())?;
        let client = ctx.client()?;
        let instance = client.send(ApiRequest::get(path)).await?;
        let fields = user_fields(&instance).len();
        Ok(ToolOutput::new(
            format!(
                "'{}' metadata on file {}: {} field(s)",
                params.template_key.trim(),
                params.file_id,
                fields
            ),
            instance,
        ))
    }

    pub fn definition() -> ToolDefinition {
        ToolDefinition::typed(Self::NAME, Self::DESCRIPTION, SideEffect::ReadOnly, Self::execute)
    }
}

pub struct DeleteInstanceTool;

impl DeleteInstanceTool {
    pub const NAME: &'static str = "box_metadata_delete_instance_on_file_tool";

    pub const DESCRIPTION: &'static str = "Remove a metadata template instance from a file.";

    #[instrument(skip_all, fields(file_id = %params.file_id, template_key = %params.template_key))]
    pub async fn execute(ctx: ToolContext, params: InstanceParams) -> Result<ToolOutput, ToolError> {
        let path = resolve(&params.file_id, &params.template_key, params.scope.as_deref())?;
        let client = ctx.client()?;
        client.send(ApiRequest::delete(path)).await?;
        info!("Metadata instance deleted");
        Ok(ToolOutput::new(
            format!(
                "Removed '{}' metadata from file {}",
                params.template_key.trim(),
                params.file_id
            ),
            json!({ "file_id": params.file_id, "template_key": params.template_key.trim(), "deleted": true }),
        ))
    }

    pub fn definition() -> ToolDefinition {
        ToolDefinition::typed(Self::NAME, Self::DESCRIPTION, SideEffect::Destructive, Self::execute)
    }
}

// ============================================================================
// box_metadata_update_instance_on_file_tool
// ============================================================================

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct UpdateInstanceParams {
    /// File holding the metadata.
    pub file_id: String,

    /// Template key.
    pub template_key: String,

    /// Field values to write, keyed by template field key.
    pub metadata: Value,

    /// Also remove fields not present in `metadata`.
    #[serde(default)]
    pub remove_non_included_data: bool,

    /// `enterprise` (default) or `global`.
    pub scope: Option<String>,
}

pub struct UpdateInstanceTool;

impl UpdateInstanceTool {
    pub const NAME: &'static str = "box_metadata_update_instance_on_file_tool";

    pub const DESCRIPTION: &'static str = "Update the metadata instance of a template on a file. Given fields are added or replaced; with remove_non_included_data, other fields are removed.";

    #[instrument(skip_all, fields(file_id = %params.file_id, template_key = %params.template_key))]
    pub async fn execute(ctx: ToolContext, params: UpdateInstanceParams) -> Result<ToolOutput, ToolError> {
        let path = resolve(&params.file_id, &params.template_key, params.scope.as_deref())?;
        let desired = require_object(&params.metadata)?;
        let client = ctx.client()?;

        let current = client.send(ApiRequest::get(path.clone())).await?;
        let patch = build_patch(&user_fields(&current), desired, params.remove_non_included_data);
        if patch.is_empty() {
            return Ok(ToolOutput::new("Nothing to update", current));
        }

        let count = patch.len();
        let instance = client
            .send(ApiRequest::put(path).json_patch(Value::Array(patch)))
            .await?;
        info!(operations = count, "Metadata instance updated");
        Ok(ToolOutput::new(
            format!(
                "Applied {} change(s) to '{}' metadata on file {}",
                count,
                params.template_key.trim(),
                params.file_id
            ),
            instance,
        ))
    }

    pub fn definition() -> ToolDefinition {
        ToolDefinition::typed(Self::NAME, Self::DESCRIPTION, SideEffect::Mutating, Self::execute)
    }
}
