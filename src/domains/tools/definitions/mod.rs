//! Tool definitions module.
//!
//! One file (or directory) per tool family. Each tool is a unit struct with
//! `NAME`, `DESCRIPTION`, an async `execute` and a `definition()` that
//! produces the registry entry. [`catalog`] lists them in registration order.

pub mod ai;
pub(crate) mod common;
pub mod diagnostics;
pub mod docgen;
pub mod files;
pub mod folders;
pub mod generic;
pub mod metadata;
pub mod search;

pub use ai::{
    AskFileMultiTool, AskFileSingleTool, AskHubTool, ExtractEnhancedFieldsTool,
    ExtractEnhancedTemplateTool, ExtractFreeformTool, ExtractStructuredFieldsTool,
    ExtractStructuredTemplateTool,
};
pub use diagnostics::ServerInfoTool;
pub use files::{DownloadFileTool, ReadTool, UploadFromContentTool, UploadFromPathTool};
pub use folders::{ListFolderContentTool, ManageFolderTool};
pub use generic::{AuthorizeAppTool, WhoAmITool};
pub use search::{SearchFolderByNameTool, SearchTool};

use super::ToolDefinition;

/// Every tool the gateway serves, in registration (and `tools/list`) order.
pub fn catalog() -> Vec<ToolDefinition> {
    vec![
        WhoAmITool::definition(),
        AuthorizeAppTool::definition(),
        SearchTool::definition(),
        SearchFolderByNameTool::definition(),
        AskFileSingleTool::definition(),
        AskFileMultiTool::definition(),
        AskHubTool::definition(),
        ExtractFreeformTool::definition(),
        ExtractStructuredFieldsTool::definition(),
        ExtractStructuredTemplateTool::definition(),
        ExtractEnhancedFieldsTool::definition(),
        ExtractEnhancedTemplateTool::definition(),
        docgen::CreateBatchTool::definition(),
        docgen::GetJobTool::definition(),
        docgen::ListJobsTool::definition(),
        docgen::ListJobsByBatchTool::definition(),
        docgen::TemplateCreateTool::definition(),
        docgen::TemplateListTool::definition(),
        docgen::TemplateGetByIdTool::definition(),
        docgen::TemplateListTagsTool::definition(),
        docgen::TemplateListJobsTool::definition(),
        docgen::TemplateGetByNameTool::definition(),
        docgen::CreateSingleFileTool::definition(),
        ReadTool::definition(),
        UploadFromPathTool::definition(),
        UploadFromContentTool::definition(),
        DownloadFileTool::definition(),
        ListFolderContentTool::definition(),
        ManageFolderTool::definition(),
        metadata::TemplateGetByNameTool::definition(),
        metadata::SetInstanceTool::definition(),
        metadata::GetInstanceTool::definition(),
        metadata::DeleteInstanceTool::definition(),
        metadata::UpdateInstanceTool::definition(),
        metadata::TemplateCreateTool::definition(),
        ServerInfoTool::definition(),
    ]
}
