use actionloop_core::Result;
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;

use crate::metadata::{derive_metadata, MetadataOverrides};
use crate::{safe_truncate, Tool, ToolContext};

/// Backends reject overly long function descriptions.
const MAX_SCHEMA_DESCRIPTION_CHARS: usize = 1024;

/// A named, described, schema-tagged capability exposed to the generation backend.
#[derive(Clone)]
pub struct Action {
    pub name: String,
    pub description: String,
    pub parameters: Value,
    pub terminal: bool,
    pub tags: Vec<String>,
    tool: Arc<dyn Tool>,
}

impl Action {
    /// Manual registration: every field is given explicitly.
    pub fn new(
        name: &str,
        description: &str,
        parameters: Value,
        terminal: bool,
        tool: Arc<dyn Tool>,
    ) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters,
            terminal,
            tags: Vec::new(),
            tool,
        }
    }

    /// Derive name, description, schema, terminal flag and tags from the tool's descriptor.
    pub fn from_tool(tool: Arc<dyn Tool>) -> Self {
        Self::from_tool_with(tool, &MetadataOverrides::default())
    }

    pub fn from_tool_with(tool: Arc<dyn Tool>, overrides: &MetadataOverrides) -> Self {
        let meta = derive_metadata(&tool.descriptor(), overrides);
        Self {
            name: meta.name,
            description: meta.description,
            parameters: meta.parameters,
            terminal: meta.terminal,
            tags: meta.tags,
            tool,
        }
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn tool(&self) -> &Arc<dyn Tool> {
        &self.tool
    }

    pub async fn execute(&self, ctx: ToolContext, params: Value) -> Result<Value> {
        self.tool.execute(ctx, params).await
    }

    /// The callable schema handed to the generation backend.
    pub fn schema(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": safe_truncate(&self.description, MAX_SCHEMA_DESCRIPTION_CHARS),
                "parameters": self.parameters
            }
        })
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("parameters", &self.parameters)
            .field("terminal", &self.terminal)
            .field("tags", &self.tags)
            .finish_non_exhaustive()
    }
}
