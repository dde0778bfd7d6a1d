//! Tool Registry - the fixed table of tools served by the gateway.
//!
//! Built once at startup from an ordered list of definitions; read-only
//! afterwards, so it is shared across concurrent dispatches without locking.

use rmcp::model::{JsonObject, Tool, ToolAnnotations};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::error::{RegistryError, ToolError};
use super::handlers::{Handler, ToolDefinition};
use super::schema::InputSchema;

/// What a tool does to the outside world.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideEffect {
    ReadOnly,
    Mutating,
    Destructive,
    /// Changes only the caller's session state.
    Session,
}

impl SideEffect {
    fn annotations(&self) -> ToolAnnotations {
        let (read_only, destructive, open_world) = match self {
            Self::ReadOnly => (true, false, true),
            Self::Mutating => (false, false, true),
            Self::Destructive => (false, true, true),
            Self::Session => (false, false, false),
        };
        ToolAnnotations {
            title: None,
            read_only_hint: Some(read_only),
            destructive_hint: Some(destructive),
            idempotent_hint: None,
            open_world_hint: Some(open_world),
        }
    }
}

/// A registered tool.
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub side_effect: SideEffect,
    pub input_schema: InputSchema,
    schema_json: Arc<JsonObject>,
    pub(crate) handler: Handler,
}

impl ToolDescriptor {
    /// Protocol model for `tools/list`.
    pub fn to_tool(&self) -> Tool {
        Tool {
            name: self.name.into(),
            title: None,
            description: Some(self.description.into()),
            input_schema: self.schema_json.clone(),
            output_schema: None,
            annotations: Some(self.side_effect.annotations()),
            icons: None,
            meta: None,
        }
    }
}

/// Tool registry - maps tool names to descriptors.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<ToolDescriptor>,
    index: HashMap<&'static str, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from definitions in order, failing on the first
    /// duplicate name or unusable schema.
    pub fn from_definitions(
        definitions: impl IntoIterator<Item = ToolDefinition>,
    ) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for definition in definitions {
            registry.register(definition)?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, definition: ToolDefinition) -> Result<(), RegistryError> {
        if self.index.contains_key(definition.name) {
            return Err(RegistryError::DuplicateName(definition.name.to_string()));
        }
        let input_schema = InputSchema::from_json_schema(&definition.schema).map_err(|reason| {
            RegistryError::InvalidSchema {
                tool: definition.name.to_string(),
                reason,
            }
        })?;

        debug!(
            tool = definition.name,
            params = input_schema.params().len(),
            "Registered tool"
        );
        self.index.insert(definition.name, self.tools.len());
        self.tools.push(ToolDescriptor {
            name: definition.name,
            description: definition.description,
            side_effect: definition.side_effect,
            input_schema,
            schema_json: definition.schema,
            handler: definition.handler,
        });
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Result<&ToolDescriptor, ToolError> {
        self.index
            .get(name)
            .map(|&i| &self.tools[i])
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))
    }

    /// Tool names in registration order.
    pub fn tool_names(&self) -> Vec<&'static str> {
        self.tools.iter().map(|t| t.name).collect()
    }

    /// All tools as protocol models, in registration order.
    pub fn list_tools(&self) -> Vec<Tool> {
        self.tools.iter().map(ToolDescriptor::to_tool).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
