//! Helpers shared by tool definitions.

use serde_json::{Map, Value, json};

use crate::domains::tools::ToolError;

/// Default page size for list endpoints.
pub const DEFAULT_LIMIT: u32 = 100;

/// Largest page size Box accepts on most list endpoints.
pub const MAX_LIMIT: u32 = 1000;

/// Check that `value` looks like a Box id (non-empty, digits only).
pub fn require_id(field: &str, value: &str) -> Result<(), ToolError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ToolError::invalid_param(field, "must not be empty"));
    }
    if !trimmed.chars().all(|c| c.is_ascii_digit()) {
        return Err(ToolError::invalid_param(
            field,
            format!("must be a numeric Box id, got '{}'", value),
        ));
    }
    Ok(())
}

/// Check a list of ids, which must be non-empty and at most `max` long.
pub fn require_ids(field: &str, values: &[String], max: usize) -> Result<(), ToolError> {
    if values.is_empty() {
        return Err(ToolError::invalid_param(field, "must not be empty"));
    }
    if values.len() > max {
        return Err(ToolError::invalid_param(
            field,
            format!("accepts at most {} ids, got {}", max, values.len()),
        ));
    }
    values.iter().try_for_each(|v| require_id(field, v))
}

/// Check that a free-text argument is not blank.
pub fn require_text(field: &str, value: &str) -> Result<(), ToolError> {
    if value.trim().is_empty() {
        return Err(ToolError::invalid_param(field, "must not be empty"));
    }
    Ok(())
}

/// Clamp an optional page size.
pub fn page_limit(limit: Option<u32>, default: u32, max: u32) -> u32 {
    limit.unwrap_or(default).clamp(1, max)
}

/// Metadata scope; `enterprise` unless `global` is asked for.
pub fn metadata_scope(scope: Option<&str>) -> Result<&'static str, ToolError> {
    match scope.map(str::trim) {
        None | Some("") | Some("enterprise") => Ok("enterprise"),
        Some("global") => Ok("global"),
        Some(other) => Err(ToolError::invalid_param(
            "scope",
            format!("must be 'enterprise' or 'global', got '{}'", other),
        )),
    }
}

/// `{"id": id, "type": kind}` reference object.
pub fn item_ref(kind: &str, id: &str) -> Value {
    json!({ "id": id, "type": kind })
}

/// Keep the fields of a Box item that matter to a client.
pub fn item_summary(item: &Value) -> Value {
    const FIELDS: &[&str] = &[
        "type",
        "id",
        "name",
        "description",
        "size",
        "created_at",
        "modified_at",
        "extension",
    ];
    let mut out = Map::new();
    for field in FIELDS {
        if let Some(v) = item.get(*field).filter(|v| !v.is_null()) {
            out.insert((*field).to_string(), v.clone());
        }
    }
    if let Some(parent) = item.get("parent").and_then(|p| p.get("id")) {
        out.insert("parent_id".to_string(), parent.clone());
    }
    Value::Object(out)
}

/// `entries` of a collection response.
pub fn entries(response: &Value) -> &[Value] {
    response
        .get("entries")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Short label for an item, e.g. `file "report.pdf" (123)`.
pub fn describe_item(item: &Value) -> String {
    let kind = item.get("type").and_then(Value::as_str).unwrap_or("item");
    let id = item.get("id").and_then(Value::as_str).unwrap_or("?");
    match item.get("name").and_then(Value::as_str) {
        Some(name) => format!("{} \"{}\" ({})", kind, name, id),
        None => format!("{} {}", kind, id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_id() {
        assert!(require_id("file_id", "12345").is_ok());
        assert!(require_id("file_id", "").is_err());
        assert!(require_id("file_id", "abc").is_err());
        assert!(require_id("file_id", "../1").is_err());
    }

    #[test]
    fn test_rejected_id_names_the_field() {
        let err = require_id("folder_id", " ").unwrap_err();
        let ToolError::Validation { problems, .. } = &err else {
            panic!("expected validation error, got {:?}", err);
        };
        assert_eq!(problems[0].to_string(), "'folder_id' must not be empty");
    }

    #[test]
    fn test_require_ids_bounds() {
        let ids = vec!["1".to_string(), "2".to_string()];
        assert!(require_ids("file_ids", &ids, 25).is_ok());
        assert!(require_ids("file_ids", &ids, 1).is_err());
        assert!(require_ids("file_ids", &[], 25).is_err());
    }

    #[test]
    fn test_page_limit_clamps() {
        assert_eq!(page_limit(None, 100, 1000), 100);
        assert_eq!(page_limit(Some(0), 100, 1000), 1);
        assert_eq!(page_limit(Some(5000), 100, 1000), 1000);
    }

    #[test]
    fn test_metadata_scope() {
        assert_eq!(metadata_scope(None).unwrap(), "enterprise");
        assert_eq!(metadata_scope(Some("global")).unwrap(), "global");
        assert!(metadata_scope(Some("user")).is_err());
    }

    #[test]
    fn test_item_summary_keeps_core_fields() {
        let item = json!({
            "type": "file", "id": "1", "name": "a.pdf", "etag": "0",
            "parent": {"type": "folder", "id": "0"}, "description": null
        });
        assert_eq!(
            item_summary(&item),
            json!({"type": "file", "id": "1", "name": "a.pdf", "parent_id": "0"})
        );
        assert_eq!(describe_item(&item), "file \"a.pdf\" (1)");
    }
}
