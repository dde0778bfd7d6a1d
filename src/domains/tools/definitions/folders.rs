//! Folder tools.

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::collections::VecDeque;
use tracing::{debug, info, instrument};

use super::common::{
    DEFAULT_LIMIT, MAX_LIMIT, entries, item_ref, item_summary, page_limit, require_id,
};
use crate::domains::box_api::{ApiRequest, BoxApi};
use crate::domains::tools::{SideEffect, ToolContext, ToolDefinition, ToolError, ToolOutput};

/// Upper bound on items returned by a recursive listing.
const RECURSIVE_MAX_ITEMS: usize = 1000;

/// Upper bound on folder depth visited by a recursive listing.
const RECURSIVE_MAX_DEPTH: usize = 10;

const ITEM_FIELDS: &str = "type,id,name,description,size,created_at,modified_at,extension,parent";

/// Fetch up to `max` items of one folder, following offset paging.
async fn folder_items(
    client: &dyn BoxApi,
    folder_id: &str,
    max: usize,
) -> Result<(Vec<Value>, bool), ToolError> {
    let page = (max as u32).clamp(1, MAX_LIMIT);
    let mut items = Vec::new();
    let mut offset: u64 = 0;

    loop {
        let response = client
            .send(
                ApiRequest::get(format!("/folders/{}/items", folder_id))
                    .query("fields", ITEM_FIELDS)
                    .query("limit", page)
                    .query("offset", offset),
            )
            .await?;
        let batch = entries(&response);
        let total = response
            .get("total_count")
            .and_then(Value::as_u64)
            .unwrap_or(0);

        for item in batch {
            if items.len() == max {
                return Ok((items, true));
            }
            items.push(item.clone());
        }

        offset += batch.len() as u64;
        if batch.is_empty() || offset >= total {
            return Ok((items, false));
        }
    }
}

// ============================================================================
// box_list_folder_content_by_folder_id
// ============================================================================

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ListFolderParams {
    /// Folder id; "0" is the root folder.
    pub folder_id: String,

    /// Also list sub-folders (bounded to 1000 items and 10 levels).
    #[serde(default)]
    pub is_recursive: bool,

    /// Maximum number of items (default 100, max 1000).
    pub limit: Option<u32>,
}

pub struct ListFolderContentTool;

impl ListFolderContentTool {
    pub const NAME: &'static str = "box_list_folder_content_by_folder_id";

    pub const DESCRIPTION: &'static str = "List the files and folders in a Box folder. With is_recursive, sub-folders are walked breadth-first up to a bounded number of items.";

    #[instrument(skip_all, fields(folder_id = %params.folder_id, recursive = params.is_recursive))]
    pub async fn execute(ctx: ToolContext, params: ListFolderParams) -> Result<ToolOutput, ToolError> {
        require_id("folder_id", &params.folder_id)?;
        let client = ctx.client()?;

        let max = if params.is_recursive {
            params
                .limit
                .map(|l| l as usize)
                .unwrap_or(RECURSIVE_MAX_ITEMS)
                .clamp(1, RECURSIVE_MAX_ITEMS)
        } else {
            page_limit(params.limit, DEFAULT_LIMIT, MAX_LIMIT) as usize
        };

        let mut listed = Vec::new();
        let mut truncated = false;
        let mut queue = VecDeque::from([(params.folder_id.clone(), 0usize)]);

        while let Some((folder_id, depth)) = queue.pop_front() {
            let remaining = max - listed.len();
            let (items, more) = folder_items(client.as_ref(), &folder_id, remaining).await?;
            debug!(folder = %folder_id, depth, count = items.len(), "Listed folder");
            truncated |= more;

            for item in items {
                let mut summary = item_summary(&item);
                if params.is_recursive {
                    if let Some(map) = summary.as_object_mut() {
                        map.insert("depth".to_string(), json!(depth));
                    }
                    let is_folder = item.get("type").and_then(Value::as_str) == Some("folder");
                    if is_folder {
                        if let Some(id) = item.get("id").and_then(Value::as_str) {
                            if depth + 1 < RECURSIVE_MAX_DEPTH {
                                queue.push_back((id.to_string(), depth + 1));
                            } else {
                                truncated = true;
                            }
                        }
                    }
                }
                listed.push(summary);
            }

            if listed.len() >= max {
                truncated |= !queue.is_empty();
                break;
            }
        }

        let summary = format!(
            "{} item(s) in folder {}{}",
            listed.len(),
            params.folder_id,
            if truncated { " (truncated)" } else { "" }
        );
        info!("{}", summary);
        Ok(ToolOutput::new(
            summary,
            json!({ "folder_id": params.folder_id, "items": listed, "truncated": truncated }),
        ))
    }

    pub fn definition() -> ToolDefinition {
        ToolDefinition::typed(Self::NAME, Self::DESCRIPTION, SideEffect::ReadOnly, Self::execute)
    }
}

// ============================================================================
// box_manage_folder_tool
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum FolderAction {
    Create,
    Update,
    Delete,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ManageFolderParams {
    /// One of `create`, `update`, `delete`.
    pub action: FolderAction,

    /// Folder to update or delete.
    pub folder_id: Option<String>,

    /// Name of the new folder, or new name on update.
    pub name: Option<String>,

    /// Parent folder for create (default "0"), or new parent on update (moves the folder).
    pub parent_id: Option<String>,

    /// New description on update.
    pub description: Option<String>,

    /// On delete, also delete non-empty folders.
    #[serde(default)]
    pub recursive: bool,
}

pub struct ManageFolderTool;

impl ManageFolderTool {
    pub const NAME: &'static str = "box_manage_folder_tool";

    pub const DESCRIPTION: &'static str = "Create, update (rename, move, describe) or delete a Box folder. Deleting a non-empty folder requires recursive=true.";

    fn required<'a>(value: &'a Option<String>, field: &str, action: &str) -> Result<&'a str, ToolError> {
        match value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
            Some(v) => Ok(v),
            None => Err(ToolError::invalid_arguments(format!(
                "'{}' is required to {} a folder",
                field, action
            ))),
        }
    }

    #[instrument(skip_all, fields(action = ?params.action))]
    pub async fn execute(ctx: ToolContext, params: ManageFolderParams) -> Result<ToolOutput, ToolError> {
        match params.action {
            FolderAction::Create => {
                let name = Self::required(&params.name, "name", "create")?;
                let parent = params.parent_id.as_deref().unwrap_or("0");
                require_id("parent_id", parent)?;
                let client = ctx.client()?;

                let folder = client
                    .send(
                        ApiRequest::post("/folders")
                            .json(json!({ "name": name, "parent": { "id": parent } })),
                    )
                    .await?;
                let id = folder.get("id").and_then(Value::as_str).unwrap_or("?").to_string();
                info!(folder_id = %id, "Folder created");
                Ok(ToolOutput::new(
                    format!("Created folder '{}' ({}) in {}", name, id, parent),
                    item_summary(&folder),
                ))
            }
            FolderAction::Update => {
                let folder_id = Self::required(&params.folder_id, "folder_id", "update")?;
                require_id("folder_id", folder_id)?;

                let mut changes = Map::new();
                if let Some(name) = params.name.as_deref().filter(|n| !n.trim().is_empty()) {
                    changes.insert("name".to_string(), json!(name));
                }
                if let Some(description) = &params.description {
                    changes.insert("description".to_string(), json!(description));
                }
                if let Some(parent) = params.parent_id.as_deref() {
                    require_id("parent_id", parent)?;
                    changes.insert("parent".to_string(), item_ref("folder", parent));
                }
                if changes.is_empty() {
                    return Err(ToolError::invalid_arguments(
                        "update needs at least one of 'name', 'description', 'parent_id'",
                    ));
                }

                let client = ctx.client()?;
                let folder = client
                    .send(ApiRequest::put(format!("/folders/{}", folder_id)).json(Value::Object(changes)))
                    .await?;
                Ok(ToolOutput::new(
                    format!("Updated folder {}", folder_id),
                    item_summary(&folder),
                ))
            }
            FolderAction::Delete => {
                let folder_id = Self::required(&params.folder_id, "folder_id", "delete")?;
                require_id("folder_id", folder_id)?;
                if folder_id == "0" {
                    return Err(ToolError::invalid_arguments("the root folder cannot be deleted"));
                }
                let client = ctx.client()?;

                client
                    .send(
                        ApiRequest::delete(format!("/folders/{}", folder_id))
                            .query("recursive", params.recursive),
                    )
                    .await?;
                info!(folder_id, "Folder deleted");
                Ok(ToolOutput::new(
                    format!("Deleted folder {}", folder_id),
                    json!({ "folder_id": folder_id, "deleted": true, "recursive": params.recursive }),
                ))
            }
        }
    }

    pub fn definition() -> ToolDefinition {
        ToolDefinition::typed(Self::NAME, Self::DESCRIPTION, SideEffect::Destructive, Self::execute)
    }
}
