//! Search tools.

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, instrument};

use super::common::{describe_item, entries, item_summary, page_limit, require_text};
use crate::domains::box_api::ApiRequest;
use crate::domains::tools::{SideEffect, ToolContext, ToolDefinition, ToolError, ToolOutput};

const SEARCH_MAX_LIMIT: u32 = 200;
const SEARCH_DEFAULT_LIMIT: u32 = 30;

/// Where in an item the query is matched.
const CONTENT_TYPES: &[&str] = &["name", "description", "file_content", "comments", "tag"];

fn search_result(query: &str, response: Value) -> ToolOutput {
    let items: Vec<Value> = entries(&response).iter().map(item_summary).collect();
    let total = response
        .get("total_count")
        .and_then(Value::as_u64)
        .unwrap_or(items.len() as u64);
    let summary = match items.first() {
        Some(first) => format!(
            "Found {} result(s) for '{}' (showing {}), first: {}",
            total,
            query,
            items.len(),
            describe_item(first)
        ),
        None => format!("No results for '{}'", query),
    };
    ToolOutput::new(summary, json!({ "total_count": total, "items": items }))
}

// ============================================================================
// box_search_tool
// ============================================================================

/// Parameters for the search tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SearchParams {
    /// Text to search for.
    pub query: String,

    /// Only return files with these extensions (e.g. `pdf`, `docx`).
    pub file_extensions: Option<Vec<String>>,

    /// Where to match the query: name, description, file_content, comments, tag.
    pub where_to_look_for_query: Option<Vec<String>>,

    /// Only search inside these folders.
    pub ancestor_folder_ids: Option<Vec<String>>,

    /// Maximum number of results (1-200, default 30).
    pub limit: Option<u32>,
}

/// Full-text search over files.
pub struct SearchTool;

impl SearchTool {
    pub const NAME: &'static str = "box_search_tool";

    pub const DESCRIPTION: &'static str = "Search Box files by name, description, content, comments or tags. Optionally restrict to file extensions and ancestor folders.";

    #[instrument(skip_all, fields(query = %params.query))]
    pub async fn execute(ctx: ToolContext, params: SearchParams) -> Result<ToolOutput, ToolError> {
        require_text("query", &params.query)?;

        if let Some(where_to_look) = &params.where_to_look_for_query {
            if let Some(bad) = where_to_look.iter().find(|w| !CONTENT_TYPES.contains(&w.as_str())) {
                return Err(ToolError::invalid_arguments(format!(
                    "'where_to_look_for_query' entry '{}' must be one of {}",
                    bad,
                    CONTENT_TYPES.join(", ")
                )));
            }
        }

        let client = ctx.client()?;
        let request = ApiRequest::get("/search")
            .query("query", &params.query)
            .query("type", "file")
            .query_list("file_extensions", params.file_extensions.as_deref())
            .query_list("content_types", params.where_to_look_for_query.as_deref())
            .query_list("ancestor_folder_ids", params.ancestor_folder_ids.as_deref())
            .query(
                "limit",
                page_limit(params.limit, SEARCH_DEFAULT_LIMIT, SEARCH_MAX_LIMIT),
            );

        let response = client.send(request).await?;
        let output = search_result(&params.query, response);
        info!("{}", output.summary);
        Ok(output)
    }

    pub fn definition() -> ToolDefinition {
        ToolDefinition::typed(Self::NAME, Self::DESCRIPTION, SideEffect::ReadOnly, Self::execute)
    }
}

// ============================================================================
// box_search_folder_by_name_tool
// ============================================================================

/// Parameters for the folder search tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SearchFolderParams {
    /// Folder name (or part of it) to look for.
    pub folder_name: String,

    /// Maximum number of results (1-200, default 30).
    pub limit: Option<u32>,
}

/// Locate folders by name.
pub struct SearchFolderByNameTool;

impl SearchFolderByNameTool {
    pub const NAME: &'static str = "box_search_folder_by_name_tool";

    pub const DESCRIPTION: &'static str = "Find Box folders whose name matches the given text. Returns folder ids usable by other tools.";

    #[instrument(skip_all, fields(folder_name = %params.folder_name))]
    pub async fn execute(
        ctx: ToolContext,
        params: SearchFolderParams,
    ) -> Result<ToolOutput, ToolError> {
        require_text("folder_name", &params.folder_name)?;
        let client = ctx.client()?;

        let request = ApiRequest::get("/search")
            .query("query", &params.folder_name)
            .query("type", "folder")
            .query("content_types", "name")
            .query(
                "limit",
                page_limit(params.limit, SEARCH_DEFAULT_LIMIT, SEARCH_MAX_LIMIT),
            );

        let response = client.send(request).await?;
        Ok(search_result(&params.folder_name, response))
    }

    pub fn definition() -> ToolDefinition {
        ToolDefinition::typed(Self::NAME, Self::DESCRIPTION, SideEffect::ReadOnly, Self::execute)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::tools::definitions::testing::authed_context;
    use reqwest::Method;

    #[tokio::test]
    async fn test_search_builds_query() {
        let (ctx, api) = authed_context();
        api.on(
            Method::GET,
            "/search",
            json!({"total_count": 1, "entries": [{"type": "file", "id": "9", "name": "contract.pdf"}]}),
        );

        let output = SearchTool::execute(
            ctx,
            SearchParams {
                query: "contract".into(),
                file_extensions: Some(vec!["pdf".into()]),
                where_to_look_for_query: Some(vec!["name".into(), "file_content".into()]),
                ancestor_folder_ids: None,
                limit: Some(500),
            },
        )
        .await
        .unwrap();

        assert_eq!(output.data["total_count"], 1);
        assert_eq!(output.data["items"][0]["name"], "contract.pdf");

        let calls = api.calls();
        let call = &calls[0];
        assert_eq!(call.query_value("type"), Some("file"));
        assert_eq!(call.query_value("file_extensions"), Some("pdf"));
        assert_eq!(call.query_value("content_types"), Some("name,file_content"));
        assert_eq!(call.query_value("limit"), Some("200"));
        assert!(call.query_value("ancestor_folder_ids").is_none());
    }

    #[tokio::test]
    async fn test_search_rejects_bad_content_type() {
        let (ctx, api) = authed_context();
        let err = SearchTool::execute(
            ctx,
            SearchParams {
                query: "x".into(),
                file_extensions: None,
                where_to_look_for_query: Some(vec!["everywhere".into()]),
                ancestor_folder_ids: None,
                limit: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
        assert_eq!(api.call_count(), 0);
    }

    #[tokio::test]
    async fn test_folder_search_filters_type() {
        let (ctx, api) = authed_context();
        api.on(Method::GET, "/search", json!({"total_count": 0, "entries": []}));

        let output = SearchFolderByNameTool::execute(
            ctx,
            SearchFolderParams {
                folder_name: "Invoices".into(),
                limit: None,
            },
        )
        .await
        .unwrap();

        assert_eq!(output.summary, "No results for 'Invoices'");
        assert_eq!(api.calls()[0].query_value("type"), Some("folder"));
    }
}
