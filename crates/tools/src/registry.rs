use actionloop_core::{Error, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::fs::{ListFilesTool, ReadFileTool};
use crate::property::SearchPropertyTool;
use crate::system::TerminateTool;
use crate::{Action, Tool};

pub const TERMINATE_TOOL: &str = "terminate";

/// Keyed collection of actions for one agent. Iteration follows insertion order;
/// re-registering a name replaces the entry in place.
#[derive(Clone, Default)]
pub struct ActionRegistry {
    actions: HashMap<String, Action>,
    order: Vec<String>,
    by_tag: HashMap<String, Vec<String>>,
    terminate: Option<Action>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, action: Action) {
        debug!(name = %action.name, terminal = action.terminal, "Registering action");
        let name = action.name.clone();

        if let Some(previous) = self.actions.get(&name) {
            for tag in &previous.tags {
                if let Some(names) = self.by_tag.get_mut(tag) {
                    names.retain(|n| n != &name);
                }
            }
        } else {
            self.order.push(name.clone());
        }

        for tag in &action.tags {
            let names = self.by_tag.entry(tag.clone()).or_default();
            if !names.contains(&name) {
                names.push(name.clone());
            }
        }
        self.actions.insert(name, action);
    }

    pub fn register_tool(&mut self, tool: Arc<dyn Tool>) {
        self.register(Action::from_tool(tool));
    }

    pub fn get(&self, name: &str) -> Option<&Action> {
        self.actions.get(name)
    }

    pub fn list(&self) -> Vec<&Action> {
        self.order
            .iter()
            .filter_map(|name| self.actions.get(name))
            .collect()
    }

    pub fn list_by_tag(&self, tag: &str) -> Vec<&Action> {
        self.by_tag
            .get(tag)
            .map(|names| names.iter().filter_map(|n| self.actions.get(n)).collect())
            .unwrap_or_default()
    }

    /// Registered actions whose name is in `names`, in registry order. Unknown names are ignored.
    pub fn list_by_names(&self, names: &[&str]) -> Vec<&Action> {
        self.list()
            .into_iter()
            .filter(|a| names.contains(&a.name.as_str()))
            .collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self
            .by_tag
            .iter()
            .filter(|(_, names)| !names.is_empty())
            .map(|(tag, _)| tag.clone())
            .collect();
        tags.sort();
        tags
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn has_terminal(&self) -> bool {
        self.actions.values().any(|a| a.terminal)
    }

    pub fn tool_schemas(&self) -> Vec<Value> {
        self.list().iter().map(|a| a.schema()).collect()
    }

    /// Remember a terminate action without exposing it yet.
    pub fn set_terminate_action(&mut self, action: Action) {
        self.terminate = Some(action);
    }

    /// Expose the remembered terminate action. Fails when none was ever provided.
    pub fn register_terminate(&mut self) -> Result<()> {
        let action = self
            .terminate
            .clone()
            .ok_or_else(|| Error::NotFound("Terminate tool not found in tool registry".to_string()))?;
        self.register(action);
        Ok(())
    }
}

/// Every tool known to the process, from which per-agent registries are built.
#[derive(Clone, Default)]
pub struct ToolCatalog {
    registry: ActionRegistry,
}

impl ToolCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        let mut catalog = Self::new();

        // File tools
        catalog.add(Arc::new(ListFilesTool));
        catalog.add(Arc::new(ReadFileTool));

        // Property search
        catalog.add(Arc::new(SearchPropertyTool::default()));

        // Session control
        catalog.add(Arc::new(TerminateTool));

        catalog
    }

    pub fn add(&mut self, tool: Arc<dyn Tool>) {
        self.registry.register_tool(tool);
    }

    pub fn add_action(&mut self, action: Action) {
        self.registry.register(action);
    }

    pub fn get(&self, name: &str) -> Option<&Action> {
        self.registry.get(name)
    }

    pub fn actions(&self) -> Vec<&Action> {
        self.registry.list()
    }

    pub fn names_for_tag(&self, tag: &str) -> Vec<String> {
        self.registry
            .list_by_tag(tag)
            .into_iter()
            .map(|a| a.name.clone())
            .collect()
    }

    pub fn tags(&self) -> Vec<String> {
        self.registry.tags()
    }
}

/// Collects candidate actions, applies optional tag/name filters and produces a registry.
///
/// A candidate named `terminate` is always remembered, even when the filters drop it,
/// so that `ActionRegistry::register_terminate` can add it later.
#[derive(Default)]
pub struct ActionRegistryBuilder {
    candidates: Vec<Action>,
    tags: Vec<String>,
    names: Vec<String>,
}

impl ActionRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_catalog(catalog: &ToolCatalog) -> Self {
        Self {
            candidates: catalog.actions().into_iter().cloned().collect(),
            ..Self::default()
        }
    }

    pub fn tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.candidates.push(Action::from_tool(tool));
        self
    }

    pub fn action(mut self, action: Action) -> Self {
        self.candidates.push(action);
        self
    }

    /// Keep only actions carrying at least one of these tags. Empty means no filter.
    pub fn filter_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Keep only actions with one of these names. Empty means no filter.
    pub fn filter_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn build(self) -> ActionRegistry {
        let mut registry = ActionRegistry::new();
        for action in self.candidates {
            if action.name == TERMINATE_TOOL {
                registry.set_terminate_action(action.clone());
            }
            if !self.names.is_empty() && !self.names.contains(&action.name) {
                continue;
            }
            if !self.tags.is_empty() && !action.tags.iter().any(|t| self.tags.contains(t)) {
                continue;
            }
            registry.register(action);
        }
        debug!(count = registry.len(), "Action registry built");
        registry
    }
}
