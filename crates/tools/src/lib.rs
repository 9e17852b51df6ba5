pub mod action;
pub mod environment;
pub mod fs;
pub mod metadata;
pub mod property;
pub mod registry;
pub mod system;

use actionloop_core::{Error, Result};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::marker::PhantomData;
use std::path::PathBuf;

pub use action::Action;
pub use environment::{Environment, ExecutionOutcome};
pub use metadata::{derive_metadata, MetadataOverrides, ParamDecl, ParamType, Signature, ToolDescriptor, ToolMetadata};
pub use registry::{ActionRegistry, ActionRegistryBuilder, ToolCatalog};

/// Truncate a string to at most `max_chars` characters, respecting UTF-8 char boundaries.
pub fn safe_truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Per-call context handed to every tool. Never part of a tool's parameter schema.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub workspace: PathBuf,
    pub session_id: String,
    pub iteration: u32,
}

impl ToolContext {
    pub fn new(workspace: PathBuf) -> Self {
        Self {
            workspace,
            session_id: String::new(),
            iteration: 0,
        }
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn descriptor(&self) -> ToolDescriptor;
    async fn execute(&self, ctx: ToolContext, params: Value) -> Result<Value>;
}

/// A tool backed by a plain closure over the raw argument map.
pub struct FnTool<F> {
    descriptor: ToolDescriptor,
    f: F,
}

impl<F> FnTool<F>
where
    F: Fn(ToolContext, Value) -> Result<Value> + Send + Sync,
{
    pub fn new(descriptor: ToolDescriptor, f: F) -> Self {
        Self { descriptor, f }
    }
}

#[async_trait]
impl<F> Tool for FnTool<F>
where
    F: Fn(ToolContext, Value) -> Result<Value> + Send + Sync,
{
    fn descriptor(&self) -> ToolDescriptor {
        self.descriptor.clone()
    }

    async fn execute(&self, ctx: ToolContext, params: Value) -> Result<Value> {
        (self.f)(ctx, params)
    }
}

/// A tool whose parameter schema is inferred from a typed argument struct.
///
/// The struct's doc comment becomes the default description and its fields become
/// the parameters; `Option` and `#[serde(default)]` fields are optional.
pub struct TypedTool<A, F> {
    descriptor: ToolDescriptor,
    f: F,
    _args: PhantomData<fn() -> A>,
}

pub fn typed_tool<A, F>(name: &str, f: F) -> TypedTool<A, F>
where
    A: DeserializeOwned + JsonSchema,
    F: Fn(ToolContext, A) -> Result<Value> + Send + Sync,
{
    let mut descriptor = ToolDescriptor::new(name).signature(Signature::of::<A>());
    if let Some(doc) = metadata::schema_description::<A>() {
        descriptor = descriptor.description(&doc);
    }
    TypedTool {
        descriptor,
        f,
        _args: PhantomData,
    }
}

impl<A, F> TypedTool<A, F> {
    pub fn description(mut self, description: &str) -> Self {
        self.descriptor = self.descriptor.description(description);
        self
    }

    pub fn terminal(mut self, terminal: bool) -> Self {
        self.descriptor = self.descriptor.terminal(terminal);
        self
    }

    pub fn tags(mut self, tags: &[&str]) -> Self {
        self.descriptor = self.descriptor.tags(tags);
        self
    }
}

#[async_trait]
impl<A, F> Tool for TypedTool<A, F>
where
    A: DeserializeOwned + JsonSchema,
    F: Fn(ToolContext, A) -> Result<Value> + Send + Sync,
{
    fn descriptor(&self) -> ToolDescriptor {
        self.descriptor.clone()
    }

    async fn execute(&self, ctx: ToolContext, params: Value) -> Result<Value> {
        let params = if params.is_null() {
            Value::Object(serde_json::Map::new())
        } else {
            params
        };
        let args: A = serde_json::from_value(params).map_err(|e| {
            Error::Validation(format!("Invalid arguments for '{}': {}", self.descriptor.name, e))
        })?;
        (self.f)(ctx, args)
    }
}
