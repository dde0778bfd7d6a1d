//! Metadata template tools.

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::{info, instrument};

use crate::domains::box_api::ApiRequest;
use crate::domains::tools::definitions::common::{metadata_scope, require_text};
use crate::domains::tools::{SideEffect, ToolContext, ToolDefinition, ToolError, ToolOutput};

/// Field types a template may declare.
const FIELD_TYPES: &[&str] = &["string", "float", "date", "enum", "multiSelect", "integer"];

fn field_count(template: &Value) -> usize {
    template
        .get("fields")
        .and_then(Value::as_array)
        .map_or(0, Vec::len)
}

/// Derive a template key from a display name: lower camel case, ASCII
/// alphanumerics only, not starting with a digit.
fn key_from_display_name(display_name: &str) -> String {
    let mut key = String::new();
    for (i, word) in display_name
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .enumerate()
    {
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            if i == 0 {
                key.push(first.to_ascii_lowercase());
            } else {
                key.push(first.to_ascii_uppercase());
            }
            key.extend(chars);
        }
    }
    if key.starts_with(|c: char| c.is_ascii_digit()) {
        key.insert(0, 't');
    }
    key
}

// ============================================================================
// box_metadata_template_get_by_name_tool
// ============================================================================

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct TemplateByNameParams {
    /// Template key, e.g. `invoiceData`.
    pub template_key: String,

    /// `enterprise` (default) or `global`.
    pub scope: Option<String>,
}

pub struct TemplateGetByNameTool;

impl TemplateGetByNameTool {
    pub const NAME: &'static str = "box_metadata_template_get_by_name_tool";

    pub const DESCRIPTION: &'static str =
        "Get a metadata template's schema (display name and fields) by its key.";

    #[instrument(skip_all, fields(template_key = %params.template_key))]
    pub async fn execute(ctx: ToolContext, params: TemplateByNameParams) -> Result<ToolOutput, ToolError> {
        require_text("template_key", &params.template_key)?;
        let scope = metadata_scope(params.scope.as_deref())?;
        let client = ctx.client()?;

        let template = client
            .send(ApiRequest::get(format!(
                "/metadata_templates/{}/{}/schema",
                scope,
                params.template_key.trim()
            )))
            .await?;
        let display = template
            .get("displayName")
            .and_then(Value::as_str)
            .unwrap_or(params.template_key.trim())
            .to_string();
        Ok(ToolOutput::new(
            format!("Template '{}' with {} field(s)", display, field_count(&template)),
            template,
        ))
    }

    pub fn definition() -> ToolDefinition {
        ToolDefinition::typed(Self::NAME, Self::DESCRIPTION, SideEffect::ReadOnly, Self::execute)
    }
}

// ============================================================================
// box_metadata_template_create_tool
// ============================================================================

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct TemplateCreateParams {
    /// Human-readable template name.
    pub display_name: String,

    /// Template key; derived from the display name when omitted.
    pub template_key: Option<String>,

    /// Field definitions: objects with `type`, `key`, `displayName` and, for
    /// `enum`/`multiSelect`, `options` as `[{"key": ...}]`.
    pub fields: Vec<Value>,

    /// Hide the template from the web app.
    #[serde(default)]
    pub hidden: bool,

    /// `enterprise` (default) or `global`.
    pub scope: Option<String>,
}

pub struct TemplateCreateTool;

impl TemplateCreateTool {
    pub const NAME: &'static str = "box_metadata_template_create_tool";

    pub const DESCRIPTION: &'static str = "Create a metadata template from a display name and a list of field definitions.";

    fn check_field(field: &Value) -> Result<(), ToolError> {
        let Some(obj) = field.as_object() else {
            return Err(ToolError::invalid_arguments(format!(
                "each field must be an object, got {}",
                field
            )));
        };
        for key in ["type", "key", "displayName"] {
            if obj.get(key).and_then(Value::as_str).is_none() {
                return Err(ToolError::invalid_arguments(format!(
                    "field {} is missing string '{}'",
                    field, key
                )));
            }
        }
        let kind = obj.get("type").and_then(Value::as_str).unwrap_or_default();
        if !FIELD_TYPES.contains(&kind) {
            return Err(ToolError::invalid_arguments(format!(
                "field type '{}' must be one of {}",
                kind,
                FIELD_TYPES.join(", ")
            )));
        }
        Ok(())
    }

    #[instrument(skip_all, fields(display_name = %params.display_name))]
    pub async fn execute(ctx: ToolContext, params: TemplateCreateParams) -> Result<ToolOutput, ToolError> {
        require_text("display_name", &params.display_name)?;
        let scope = metadata_scope(params.scope.as_deref())?;
        params.fields.iter().try_for_each(Self::check_field)?;

        let key = match params.template_key.as_deref().map(str::trim) {
            Some(k) if !k.is_empty() => k.to_string(),
            _ => key_from_display_name(&params.display_name),
        };
        if key.is_empty() {
            return Err(ToolError::invalid_arguments(
                "cannot derive a template key from 'display_name'; pass 'template_key'",
            ));
        }

        let mut body = Map::new();
        body.insert("scope".to_string(), json!(scope));
        body.insert("templateKey".to_string(), json!(key));
        body.insert("displayName".to_string(), json!(params.display_name.trim()));
        body.insert("hidden".to_string(), json!(params.hidden));
        body.insert("fields".to_string(), Value::Array(params.fields));

        let client = ctx.client()?;
        let template = client
            .send(ApiRequest::post("/metadata_templates/schema").json(Value::Object(body)))
            .await?;
        info!(template_key = %key, "Metadata template created");
        Ok(ToolOutput::new(
            format!("Created metadata template '{}' ({})", params.display_name.trim(), key),
            template,
        ))
    }

    pub fn definition() -> ToolDefinition {
        ToolDefinition::typed(Self::NAME, Self::DESCRIPTION, SideEffect::Mutating, Self::execute)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::box_api::ApiBody;
    use crate::domains::tools::definitions::testing::authed_context;
    use reqwest::Method;

    #[test]
    fn test_key_from_display_name() {
        assert_eq!(key_from_display_name("Invoice Data"), "invoiceData");
        assert_eq!(key_from_display_name("  contract-v2 terms "), "contractV2Terms");
        assert_eq!(key_from_display_name("2024 Budget"), "t2024Budget");
        assert_eq!(key_from_display_name("!!!"), "");
    }

    #[tokio::test]
    async fn test_get_template_by_key() {
        let (ctx, api) = authed_context();
        api.on(
            Method::GET,
            "/metadata_templates/global/properties/schema",
            json!({"displayName": "Properties", "fields": [{"key": "a"}]}),
        );

        let output = TemplateGetByNameTool::execute(
            ctx,
            TemplateByNameParams {
                template_key: "properties".into(),
                scope: Some("global".into()),
            },
        )
        .await
        .unwrap();
        assert_eq!(output.summary, "Template 'Properties' with 1 field(s)");
    }

    #[tokio::test]
    async fn test_create_template_body() {
        let (ctx, api) = authed_context();
        api.on(Method::POST, "/metadata_templates/schema", json!({"templateKey": "invoiceData"}));

        TemplateCreateTool::execute(
            ctx,
            TemplateCreateParams {
                display_name: "Invoice Data".into(),
                template_key: None,
                fields: vec![json!({"type": "string", "key": "vendor", "displayName": "Vendor"})],
                hidden: false,
                scope: None,
            },
        )
        .await
        .unwrap();

        let calls = api.calls();
        let ApiBody::Json(body) = &calls[0].body else {
            panic!("expected JSON body");
        };
        assert_eq!(body["templateKey"], "invoiceData");
        assert_eq!(body["scope"], "enterprise");
        assert_eq!(body["fields"][0]["key"], "vendor");
    }

    #[tokio::test]
    async fn test_create_rejects_bad_field_type() {
        let (ctx, api) = authed_context();
        let err = TemplateCreateTool::execute(
            ctx,
            TemplateCreateParams {
                display_name: "X".into(),
                template_key: Some("x".into()),
                fields: vec![json!({"type": "blob", "key": "k", "displayName": "K"})],
                hidden: false,
                scope: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
        assert_eq!(api.call_count(), 0);
    }
}
