//! Box Doc Gen tools: templates, batches and generation jobs.

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, instrument};

use super::common::{
    DEFAULT_LIMIT, MAX_LIMIT, entries, item_ref, page_limit, require_id, require_text,
};
use crate::domains::box_api::ApiRequest;
use crate::domains::tools::{SideEffect, ToolContext, ToolDefinition, ToolError, ToolOutput};

/// Output formats Doc Gen can produce.
const OUTPUT_TYPES: &[&str] = &["pdf", "docx"];

fn output_type(requested: Option<&str>) -> Result<String, ToolError> {
    let value = requested.map(str::trim).filter(|s| !s.is_empty()).unwrap_or("pdf");
    let lowered = value.to_ascii_lowercase();
    if OUTPUT_TYPES.contains(&lowered.as_str()) {
        Ok(lowered)
    } else {
        Err(ToolError::invalid_arguments(format!(
            "'output_type' must be one of {}, got '{}'",
            OUTPUT_TYPES.join(", "),
            value
        )))
    }
}

/// Marker-paged listing request.
fn paged(path: String, marker: Option<&str>, limit: Option<u32>) -> ApiRequest {
    ApiRequest::get(path)
        .query_opt("marker", marker.filter(|m| !m.is_empty()))
        .query("limit", page_limit(limit, DEFAULT_LIMIT, MAX_LIMIT))
}

fn list_output(noun: &str, response: Value) -> ToolOutput {
    let count = entries(&response).len();
    let next_marker = response.get("next_marker").cloned().unwrap_or(Value::Null);
    let summary = if next_marker.is_null() {
        format!("{} {}(s)", count, noun)
    } else {
        format!("{} {}(s), more available", count, noun)
    };
    ToolOutput::new(
        summary,
        json!({ "entries": entries(&response), "next_marker": next_marker }),
    )
}

fn job_summary(job: &Value) -> String {
    let id = job.get("id").and_then(Value::as_str).unwrap_or("?");
    let status = job.get("status").and_then(Value::as_str).unwrap_or("unknown");
    format!("Doc Gen job {} is {}", id, status)
}

async fn submit_batch(
    ctx: &ToolContext,
    template_id: &str,
    destination_folder_id: &str,
    output_type: String,
    documents: Vec<Value>,
) -> Result<Value, ToolError> {
    let client = ctx.client()?;
    let body = json!({
        "file": item_ref("file", template_id),
        "input_source": "api",
        "destination_folder": item_ref("folder", destination_folder_id),
        "output_type": output_type,
        "document_generation_data": documents,
    });
    Ok(client.send(ApiRequest::post("/docgen_batches").json(body)).await?)
}

fn batch_output(batch: Value, documents: usize) -> ToolOutput {
    let id = batch.get("id").and_then(Value::as_str).unwrap_or("?").to_string();
    ToolOutput::new(
        format!("Submitted Doc Gen batch {} with {} document(s)", id, documents),
        batch,
    )
}

// ============================================================================
// box_docgen_create_batch_tool
// ============================================================================

/// One document of a batch.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GenerationInput {
    /// Name of the generated file (without extension).
    pub generated_file_name: String,

    /// Data merged into the template's tags.
    pub user_input: Value,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CreateBatchParams {
    /// File id of the Doc Gen template.
    pub docgen_template_id: String,

    /// Folder receiving the generated documents.
    pub destination_folder_id: String,

    /// `pdf` (default) or `docx`.
    pub output_type: Option<String>,

    /// One entry per document to generate.
    pub document_generation_data: Vec<GenerationInput>,
}

pub struct CreateBatchTool;

impl CreateBatchTool {
    pub const NAME: &'static str = "box_docgen_create_batch_tool";

    pub const DESCRIPTION: &'static str = "Generate documents from a Doc Gen template, one per entry of document_generation_data, into a destination folder.";

    #[instrument(skip_all, fields(template = %params.docgen_template_id))]
    pub async fn execute(ctx: ToolContext, params: CreateBatchParams) -> Result<ToolOutput, ToolError> {
        require_id("docgen_template_id", &params.docgen_template_id)?;
        require_id("destination_folder_id", &params.destination_folder_id)?;
        if params.document_generation_data.is_empty() {
            return Err(ToolError::invalid_arguments(
                "'document_generation_data' must not be empty",
            ));
        }
        let output_type = output_type(params.output_type.as_deref())?;

        let documents: Vec<Value> = params
            .document_generation_data
            .iter()
            .map(|d| json!({ "generated_file_name": d.generated_file_name, "user_input": d.user_input }))
            .collect();
        let count = documents.len();
        let batch = submit_batch(
            &ctx,
            &params.docgen_template_id,
            &params.destination_folder_id,
            output_type,
            documents,
        )
        .await?;

        let output = batch_output(batch, count);
        info!("{}", output.summary);
        Ok(output)
    }

    pub fn definition() -> ToolDefinition {
        ToolDefinition::typed(Self::NAME, Self::DESCRIPTION, SideEffect::Mutating, Self::execute)
    }
}

// ============================================================================
// box_docgen_create_single_file_from_user_input_tool
// ============================================================================

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CreateSingleFileParams {
    /// File id of the Doc Gen template.
    pub docgen_template_id: String,

    /// Folder receiving the generated document.
    pub destination_folder_id: String,

    /// Data merged into the template's tags.
    pub user_input: Value,

    /// Name of the generated file; defaults to a timestamped name.
    pub generated_file_name: Option<String>,

    /// `pdf` (default) or `docx`.
    pub output_type: Option<String>,
}

pub struct CreateSingleFileTool;

impl CreateSingleFileTool {
    pub const NAME: &'static str = "box_docgen_create_single_file_from_user_input_tool";

    pub const DESCRIPTION: &'static str =
        "Generate one document from a Doc Gen template and a single user_input object.";

    #[instrument(skip_all, fields(template = %params.docgen_template_id))]
    pub async fn execute(
        ctx: ToolContext,
        params: CreateSingleFileParams,
    ) -> Result<ToolOutput, ToolError> {
        require_id("docgen_template_id", &params.docgen_template_id)?;
        require_id("destination_folder_id", &params.destination_folder_id)?;
        if !params.user_input.is_object() {
            return Err(ToolError::invalid_arguments("'user_input' must be an object"));
        }
        let output_type = output_type(params.output_type.as_deref())?;
        let file_name = params
            .generated_file_name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| format!("docgen_{}", chrono::Utc::now().format("%Y%m%d_%H%M%S")));

        let batch = submit_batch(
            &ctx,
            &params.docgen_template_id,
            &params.destination_folder_id,
            output_type,
            vec![json!({ "generated_file_name": file_name, "user_input": params.user_input })],
        )
        .await?;
        Ok(batch_output(batch, 1))
    }

    pub fn definition() -> ToolDefinition {
        ToolDefinition::typed(Self::NAME, Self::DESCRIPTION, SideEffect::Mutating, Self::execute)
    }
}

// ============================================================================
// Jobs
// ============================================================================

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct JobIdParams {
    /// Doc Gen job id.
    pub job_id: String,
}

pub struct GetJobTool;

impl GetJobTool {
    pub const NAME: &'static str = "box_docgen_get_job_by_id_tool";

    pub const DESCRIPTION: &'static str =
        "Get a Doc Gen job, including its status and the generated file once done.";

    pub async fn execute(ctx: ToolContext, params: JobIdParams) -> Result<ToolOutput, ToolError> {
        require_text("job_id", &params.job_id)?;
        let client = ctx.client()?;
        let job = client
            .send(ApiRequest::get(format!("/docgen_jobs/{}", params.job_id.trim())))
            .await?;
        Ok(ToolOutput::new(job_summary(&job), job))
    }

    pub fn definition() -> ToolDefinition {
        ToolDefinition::typed(Self::NAME, Self::DESCRIPTION, SideEffect::ReadOnly, Self::execute)
    }
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct PageParams {
    /// Marker returned by the previous page.
    pub marker: Option<String>,

    /// Page size (default 100, max 1000).
    pub limit: Option<u32>,
}

pub struct ListJobsTool;

impl ListJobsTool {
    pub const NAME: &'static str = "box_docgen_list_jobs_tool";

    pub const DESCRIPTION: &'static str = "List Doc Gen jobs visible to the current user.";

    pub async fn execute(ctx: ToolContext, params: PageParams) -> Result<ToolOutput, ToolError> {
        let client = ctx.client()?;
        let response = client
            .send(paged("/docgen_jobs".to_string(), params.marker.as_deref(), params.limit))
            .await?;
        Ok(list_output("job", response))
    }

    pub fn definition() -> ToolDefinition {
        ToolDefinition::typed(Self::NAME, Self::DESCRIPTION, SideEffect::ReadOnly, Self::execute)
    }
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct BatchJobsParams {
    /// Doc Gen batch id.
    pub batch_id: String,

    /// Marker returned by the previous page.
    pub marker: Option<String>,

    /// Page size (default 100, max 1000).
    pub limit: Option<u32>,
}

pub struct ListJobsByBatchTool;

impl ListJobsByBatchTool {
    pub const NAME: &'static str = "box_docgen_list_jobs_by_batch_tool";

    pub const DESCRIPTION: &'static str = "List the jobs of a Doc Gen batch.";

    pub async fn execute(ctx: ToolContext, params: BatchJobsParams) -> Result<ToolOutput, ToolError> {
        require_text("batch_id", &params.batch_id)?;
        let client = ctx.client()?;
        let path = format!("/docgen_batch_jobs/{}", params.batch_id.trim());
        let response = client
            .send(paged(path, params.marker.as_deref(), params.limit))
            .await?;
        Ok(list_output("job", response))
    }

    pub fn definition() -> ToolDefinition {
        ToolDefinition::typed(Self::NAME, Self::DESCRIPTION, SideEffect::ReadOnly, Self::execute)
    }
}

// ============================================================================
// Templates
// ============================================================================

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct TemplateCreateParams {
    /// Id of a file to mark as a Doc Gen template.
    pub file_id: String,
}

pub struct TemplateCreateTool;

impl TemplateCreateTool {
    pub const NAME: &'static str = "box_docgen_template_create_tool";

    pub const DESCRIPTION: &'static str = "Mark an existing file as a Doc Gen template.";

    #[instrument(skip_all, fields(file_id = %params.file_id))]
    pub async fn execute(ctx: ToolContext, params: TemplateCreateParams) -> Result<ToolOutput, ToolError> {
        require_id("file_id", &params.file_id)?;
        let client = ctx.client()?;
        let template = client
            .send(
                ApiRequest::post("/docgen_templates")
                    .json(json!({ "file": item_ref("file", &params.file_id) })),
            )
            .await?;
        info!("Doc Gen template created");
        Ok(ToolOutput::new(
            format!("File {} is now a Doc Gen template", params.file_id),
            template,
        ))
    }

    pub fn definition() -> ToolDefinition {
        ToolDefinition::typed(Self::NAME, Self::DESCRIPTION, SideEffect::Mutating, Self::execute)
    }
}

pub struct TemplateListTool;

impl TemplateListTool {
    pub const NAME: &'static str = "box_docgen_template_list_tool";

    pub const DESCRIPTION: &'static str = "List Doc Gen templates.";

    pub async fn execute(ctx: ToolContext, params: PageParams) -> Result<ToolOutput, ToolError> {
        let client = ctx.client()?;
        let response = client
            .send(paged("/docgen_templates".to_string(), params.marker.as_deref(), params.limit))
            .await?;
        Ok(list_output("template", response))
    }

    pub fn definition() -> ToolDefinition {
        ToolDefinition::typed(Self::NAME, Self::DESCRIPTION, SideEffect::ReadOnly, Self::execute)
    }
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct TemplateIdParams {
    /// Doc Gen template id (the template file's id).
    pub template_id: String,
}

pub struct TemplateGetByIdTool;

impl TemplateGetByIdTool {
    pub const NAME: &'static str = "box_docgen_template_get_by_id_tool";

    pub const DESCRIPTION: &'static str = "Get a Doc Gen template by id.";

    pub async fn execute(ctx: ToolContext, params: TemplateIdParams) -> Result<ToolOutput, ToolError> {
        require_id("template_id", &params.template_id)?;
        let client = ctx.client()?;
        let template = client
            .send(ApiRequest::get(format!("/docgen_templates/{}", params.template_id)))
            .await?;
        let name = template
            .get("file_name")
            .and_then(Value::as_str)
            .unwrap_or("unnamed")
            .to_string();
        Ok(ToolOutput::new(format!("Doc Gen template '{}'", name), template))
    }

    pub fn definition() -> ToolDefinition {
        ToolDefinition::typed(Self::NAME, Self::DESCRIPTION, SideEffect::ReadOnly, Self::execute)
    }
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct TemplateTagsParams {
    /// Doc Gen template id.
    pub template_id: String,

    /// Restrict to one version of the template file.
    pub template_version_id: Option<String>,

    /// Marker returned by the previous page.
    pub marker: Option<String>,

    /// Page size (default 100, max 1000).
    pub limit: Option<u32>,
}

pub struct TemplateListTagsTool;

impl TemplateListTagsTool {
    pub const NAME: &'static str = "box_docgen_template_list_tags_tool";

    pub const DESCRIPTION: &'static str =
        "List the tags of a Doc Gen template, i.e. the fields user_input must provide.";

    pub async fn execute(ctx: ToolContext, params: TemplateTagsParams) -> Result<ToolOutput, ToolError> {
        require_id("template_id", &params.template_id)?;
        let client = ctx.client()?;
        let path = format!("/docgen_templates/{}/tags", params.template_id);
        let request = paged(path, params.marker.as_deref(), params.limit)
            .query_opt("template_version_id", params.template_version_id.as_deref());
        let response = client.send(request).await?;
        Ok(list_output("tag", response))
    }

    pub fn definition() -> ToolDefinition {
        ToolDefinition::typed(Self::NAME, Self::DESCRIPTION, SideEffect::ReadOnly, Self::execute)
    }
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct TemplateJobsParams {
    /// Doc Gen template id.
    pub template_id: String,

    /// Marker returned by the previous page.
    pub marker: Option<String>,

    /// Page size (default 100, max 1000).
    pub limit: Option<u32>,
}

pub struct TemplateListJobsTool;

impl TemplateListJobsTool {
    pub const NAME: &'static str = "box_docgen_template_list_jobs_tool";

    pub const DESCRIPTION: &'static str = "List the generation jobs that used a Doc Gen template.";

    pub async fn execute(ctx: ToolContext, params: TemplateJobsParams) -> Result<ToolOutput, ToolError> {
        require_id("template_id", &params.template_id)?;
        let client = ctx.client()?;
        let path = format!("/docgen_template_jobs/{}", params.template_id);
        let response = client
            .send(paged(path, params.marker.as_deref(), params.limit))
            .await?;
        Ok(list_output("job", response))
    }

    pub fn definition() -> ToolDefinition {
        ToolDefinition::typed(Self::NAME, Self::DESCRIPTION, SideEffect::ReadOnly, Self::execute)
    }
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct TemplateNameParams {
    /// Template file name, matched case-insensitively.
    pub template_name: String,
}

pub struct TemplateGetByNameTool;

impl TemplateGetByNameTool {
    pub const NAME: &'static str = "box_docgen_template_get_by_name_tool";

    pub const DESCRIPTION: &'static str =
        "Find a Doc Gen template by its file name (case-insensitive).";

    #[instrument(skip_all, fields(name = %params.template_name))]
    pub async fn execute(ctx: ToolContext, params: TemplateNameParams) -> Result<ToolOutput, ToolError> {
        require_text("template_name", &params.template_name)?;
        let wanted = params.template_name.trim().to_lowercase();
        let client = ctx.client()?;

        let mut marker: Option<String> = None;
        loop {
            let response = client
                .send(paged(
                    "/docgen_templates".to_string(),
                    marker.as_deref(),
                    Some(MAX_LIMIT),
                ))
                .await?;

            let found = entries(&response).iter().find(|t| {
                t.get("file_name")
                    .and_then(Value::as_str)
                    .is_some_and(|n| n.to_lowercase() == wanted)
            });
            if let Some(template) = found {
                return Ok(ToolOutput::new(
                    format!("Found Doc Gen template '{}'", params.template_name.trim()),
                    template.clone(),
                ));
            }

            match response.get("next_marker").and_then(Value::as_str) {
                Some(next) if !next.is_empty() => marker = Some(next.to_string()),
                _ => break,
            }
        }

        Err(ToolError::not_found(format!(
            "no Doc Gen template named '{}'",
            params.template_name.trim()
        )))
    }

    pub fn definition() -> ToolDefinition {
        ToolDefinition::typed(Self::NAME, Self::DESCRIPTION, SideEffect::ReadOnly, Self::execute)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::box_api::ApiBody;
    use crate::domains::tools::definitions::testing::authed_context;
    use reqwest::Method;

    #[test]
    fn test_output_type() {
        assert_eq!(output_type(None).unwrap(), "pdf");
        assert_eq!(output_type(Some("DOCX")).unwrap(), "docx");
        assert!(output_type(Some("xlsx")).is_err());
    }

    #[tokio::test]
    async fn test_create_batch_body() {
        let (ctx, api) = authed_context();
        api.on(Method::POST, "/docgen_batches", json!({"id": "b1", "type": "docgen_batch"}));

        let output = CreateBatchTool::execute(
            ctx,
            CreateBatchParams {
                docgen_template_id: "10".into(),
                destination_folder_id: "20".into(),
                output_type: None,
                document_generation_data: vec![GenerationInput {
                    generated_file_name: "Offer".into(),
                    user_input: json!({"name": "Ada"}),
                }],
            },
        )
        .await
        .unwrap();

        assert_eq!(output.summary, "Submitted Doc Gen batch b1 with 1 document(s)");
        let calls = api.calls();
        let ApiBody::Json(body) = &calls[0].body else {
            panic!("expected JSON body");
        };
        assert_eq!(body["file"], json!({"id": "10", "type": "file"}));
        assert_eq!(body["destination_folder"]["id"], "20");
        assert_eq!(body["input_source"], "api");
        assert_eq!(body["output_type"], "pdf");
        assert_eq!(body["document_generation_data"][0]["user_input"]["name"], "Ada");
    }

    #[tokio::test]
    async fn test_list_jobs_by_batch_paging() {
        let (ctx, api) = authed_context();
        api.on(
            Method::GET,
            "/docgen_batch_jobs/b1",
            json!({"entries": [{"id": "j1"}], "next_marker": "m2"}),
        );

        let output = ListJobsByBatchTool::execute(
            ctx,
            BatchJobsParams {
                batch_id: "b1".into(),
                marker: Some("m1".into()),
                limit: Some(10),
            },
        )
        .await
        .unwrap();

        assert_eq!(output.summary, "1 job(s), more available");
        assert_eq!(output.data["next_marker"], "m2");
        assert_eq!(api.calls()[0].query_value("marker"), Some("m1"));
    }

    #[tokio::test]
    async fn test_template_get_by_name_follows_markers() {
        let (ctx, api) = authed_context();
        api.on(
            Method::GET,
            "/docgen_templates",
            json!({"entries": [{"file_name": "Other.docx"}], "next_marker": "p2"}),
        )
        .on(
            Method::GET,
            "/docgen_templates",
            json!({"entries": [{"file_name": "Offer Letter.docx", "file": {"id": "5"}}], "next_marker": null}),
        );

        let output = TemplateGetByNameTool::execute(
            ctx,
            TemplateNameParams {
                template_name: "offer letter.DOCX".into(),
            },
        )
        .await
        .unwrap();

        assert_eq!(output.data["file"]["id"], "5");
        let calls = api.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].query_value("marker"), Some("p2"));
    }

    #[tokio::test]
    async fn test_template_get_by_name_not_found() {
        let (ctx, api) = authed_context();
        api.on(Method::GET, "/docgen_templates", json!({"entries": []}));

        let err = TemplateGetByNameTool::execute(
            ctx,
            TemplateNameParams {
                template_name: "missing".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_single_file_requires_object_input() {
        let (ctx, api) = authed_context();
        let err = CreateSingleFileTool::execute(
            ctx,
            CreateSingleFileParams {
                docgen_template_id: "10".into(),
                destination_folder_id: "20".into(),
                user_input: json!("not an object"),
                generated_file_name: None,
                output_type: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
        assert_eq!(api.call_count(), 0);
    }
}
