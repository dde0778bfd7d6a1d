//! File content tools: read, upload and download.

pub mod download;
pub mod read;
pub mod upload;

pub use download::DownloadFileTool;
pub use read::ReadTool;
pub use upload::{UploadFromContentTool, UploadFromPathTool};

use serde_json::Value;

use crate::domains::box_api::{ApiRequest, BoxApi};
use crate::domains::tools::ToolError;

/// Extensions whose raw content is returned as text.
const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "md", "markdown", "csv", "tsv", "json", "xml", "html", "htm", "yaml", "yml", "log",
    "ini", "toml", "rs", "py", "js", "ts", "java", "c", "h", "cpp", "go", "sh", "sql", "css",
];

pub(crate) fn is_text_extension(extension: &str) -> bool {
    TEXT_EXTENSIONS.contains(&extension.to_ascii_lowercase().as_str())
}

/// Fetch the fields of a file the content tools need.
pub(crate) async fn file_info(client: &dyn BoxApi, file_id: &str) -> Result<Value, ToolError> {
    let request = ApiRequest::get(format!("/files/{}", file_id))
        .query("fields", "id,type,name,extension,size,parent");
    Ok(client.send(request).await?)
}

pub(crate) fn file_name_of(info: &Value) -> String {
    info.get("name")
        .and_then(Value::as_str)
        .unwrap_or("unnamed")
        .to_string()
}

pub(crate) fn extension_of(info: &Value) -> String {
    match info.get("extension").and_then(Value::as_str) {
        Some(ext) if !ext.is_empty() => ext.to_string(),
        _ => file_name_of(info)
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_string())
            .unwrap_or_default(),
    }
}

/// Format file size in human-readable format.
pub(crate) fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];

    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1536), "1.5 KB");
    }

    #[test]
    fn test_extension_falls_back_to_name() {
        assert_eq!(extension_of(&json!({"name": "notes.MD"})), "MD");
        assert_eq!(extension_of(&json!({"name": "a.pdf", "extension": "pdf"})), "pdf");
        assert_eq!(extension_of(&json!({"name": "README"})), "");
        assert!(is_text_extension("MD"));
        assert!(!is_text_extension("pdf"));
    }
}
