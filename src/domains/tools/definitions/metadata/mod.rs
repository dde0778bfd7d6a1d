//! Metadata tools: templates and per-file instances.

pub mod instance;
pub mod template;

pub use instance::{
    DeleteInstanceTool, GetInstanceTool, SetInstanceTool, UpdateInstanceTool,
};
pub use template::{TemplateCreateTool, TemplateGetByNameTool};
