//! Tool metadata: declared signatures and the derivation of the parameter schema
//! exposed to the generation backend.
//!
//! Derivation rules:
//! - name: explicit override, else the descriptor's name
//! - description: explicit override, else the descriptor's description, else a placeholder
//! - parameters: an explicit schema (override or descriptor) wins outright; otherwise
//!   every declared input maps onto one of the six schema primitives, inputs without a
//!   default are required and reserved context inputs are skipped

use schemars::JsonSchema;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::HashSet;

/// Input names used for passing internal context; never exposed as parameters.
pub const RESERVED_PARAMS: &[&str] = &["action_context", "action_agent"];

pub const DEFAULT_DESCRIPTION: &str = "No description provided.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl ParamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::Array => "array",
            ParamType::Object => "object",
        }
    }

    /// Map a declared type hint onto a schema primitive. Unknown or missing hints are strings.
    pub fn from_hint(hint: Option<&str>) -> Self {
        let hint = match hint {
            Some(h) => h.trim().to_ascii_lowercase(),
            None => return ParamType::String,
        };
        match hint.as_str() {
            "string" | "str" | "&str" | "char" => ParamType::String,
            "integer" | "int" | "i8" | "i16" | "i32" | "i64" | "i128" | "isize" | "u8" | "u16"
            | "u32" | "u64" | "u128" | "usize" => ParamType::Integer,
            "number" | "float" | "f32" | "f64" => ParamType::Number,
            "boolean" | "bool" => ParamType::Boolean,
            "array" | "list" | "tuple" | "vec" => ParamType::Array,
            "object" | "dict" | "map" | "hashmap" | "btreemap" => ParamType::Object,
            h if h.starts_with("vec<") || h.starts_with('[') => ParamType::Array,
            h if h.starts_with("hashmap<") || h.starts_with("btreemap<") => ParamType::Object,
            _ => ParamType::String,
        }
    }
}

/// One declared input of a tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDecl {
    pub name: String,
    pub type_hint: Option<String>,
    pub has_default: bool,
    pub description: Option<String>,
}

impl ParamDecl {
    pub fn required(name: &str, type_hint: &str) -> Self {
        Self {
            name: name.to_string(),
            type_hint: Some(type_hint.to_string()),
            has_default: false,
            description: None,
        }
    }

    pub fn optional(name: &str, type_hint: &str) -> Self {
        Self {
            has_default: true,
            ..Self::required(name, type_hint)
        }
    }

    /// An input with no type annotation.
    pub fn untyped(name: &str) -> Self {
        Self {
            name: name.to_string(),
            type_hint: None,
            has_default: false,
            description: None,
        }
    }

    pub fn describe(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }
}

/// The ordered list of inputs a tool declares.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Signature {
    pub params: Vec<ParamDecl>,
}

impl Signature {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(mut self, decl: ParamDecl) -> Self {
        self.params.push(decl);
        self
    }

    /// Introspect a typed argument struct.
    pub fn of<T: JsonSchema>() -> Self {
        let root = schemars::schema_for!(T);
        let value = serde_json::to_value(&root).unwrap_or_default();
        Self::from_json_schema(&value)
    }

    /// Build a signature from a JSON schema object. Fields listed under `required`
    /// have no default; everything else is optional.
    pub fn from_json_schema(schema: &Value) -> Self {
        let definitions = schema.get("definitions");
        let required: HashSet<&str> = schema
            .get("required")
            .and_then(|v| v.as_array())
            .map(|a| a.iter().filter_map(|v| v.as_str()).collect())
            .unwrap_or_default();

        let params = schema
            .get("properties")
            .and_then(|v| v.as_object())
            .map(|props| {
                props
                    .iter()
                    .map(|(name, prop)| ParamDecl {
                        name: name.clone(),
                        type_hint: json_type_of(prop, definitions, 0),
                        has_default: !required.contains(name.as_str()),
                        description: prop
                            .get("description")
                            .and_then(|d| d.as_str())
                            .map(|d| d.to_string()),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self { params }
    }
}

/// The doc comment of a typed argument struct, if it has one.
pub fn schema_description<T: JsonSchema>() -> Option<String> {
    let root = schemars::schema_for!(T);
    root.schema
        .metadata
        .as_ref()
        .and_then(|m| m.description.clone())
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
}

fn json_type_of(prop: &Value, definitions: Option<&Value>, depth: usize) -> Option<String> {
    if depth > 8 {
        return None;
    }
    match prop.get("type") {
        Some(Value::String(t)) => return Some(t.clone()),
        Some(Value::Array(types)) => {
            return types
                .iter()
                .filter_map(|t| t.as_str())
                .find(|t| *t != "null")
                .map(|t| t.to_string());
        }
        _ => {}
    }
    if let Some(reference) = prop.get("$ref").and_then(|r| r.as_str()) {
        let name = reference.rsplit('/').next().unwrap_or(reference);
        return definitions
            .and_then(|defs| defs.get(name))
            .and_then(|def| json_type_of(def, definitions, depth + 1));
    }
    for key in ["allOf", "anyOf", "oneOf"] {
        if let Some(variants) = prop.get(key).and_then(|v| v.as_array()) {
            if let Some(t) = variants
                .iter()
                .filter_map(|v| json_type_of(v, definitions, depth + 1))
                .find(|t| t != "null")
            {
                return Some(t);
            }
        }
    }
    if let Some(first) = prop.get("enum").and_then(|e| e.as_array()).and_then(|e| e.first()) {
        return Some(
            match first {
                Value::Bool(_) => "boolean",
                Value::Number(n) if n.is_f64() => "number",
                Value::Number(_) => "integer",
                Value::Array(_) => "array",
                Value::Object(_) => "object",
                _ => "string",
            }
            .to_string(),
        );
    }
    None
}

/// What a tool says about itself.
#[derive(Debug, Clone, Default)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: Option<String>,
    pub signature: Signature,
    pub parameters_override: Option<Value>,
    pub terminal: bool,
    pub tags: Vec<String>,
}

impl ToolDescriptor {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn signature(mut self, signature: Signature) -> Self {
        self.signature = signature;
        self
    }

    pub fn param(mut self, decl: ParamDecl) -> Self {
        self.signature.params.push(decl);
        self
    }

    pub fn parameters_override(mut self, schema: Value) -> Self {
        self.parameters_override = Some(schema);
        self
    }

    pub fn terminal(mut self, terminal: bool) -> Self {
        self.terminal = terminal;
        self
    }

    pub fn tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }
}

/// Registration-time overrides; any field left `None` falls back to the descriptor.
#[derive(Debug, Clone, Default)]
pub struct MetadataOverrides {
    pub name: Option<String>,
    pub description: Option<String>,
    pub parameters: Option<Value>,
    pub terminal: Option<bool>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolMetadata {
    pub name: String,
    pub description: String,
    pub parameters: Value,
    pub terminal: bool,
    pub tags: Vec<String>,
}

pub fn derive_metadata(descriptor: &ToolDescriptor, overrides: &MetadataOverrides) -> ToolMetadata {
    let name = overrides
        .name
        .clone()
        .unwrap_or_else(|| descriptor.name.clone());

    let description = overrides
        .description
        .clone()
        .or_else(|| descriptor.description.clone())
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string());

    let parameters = overrides
        .parameters
        .clone()
        .or_else(|| descriptor.parameters_override.clone())
        .unwrap_or_else(|| infer_parameters(&descriptor.signature));

    ToolMetadata {
        name,
        description,
        parameters,
        terminal: overrides.terminal.unwrap_or(descriptor.terminal),
        tags: overrides
            .tags
            .clone()
            .unwrap_or_else(|| descriptor.tags.clone()),
    }
}

/// Build the `{"type":"object","properties":…,"required":[…]}` schema for a signature.
pub fn infer_parameters(signature: &Signature) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();

    for param in &signature.params {
        if RESERVED_PARAMS.contains(&param.name.as_str()) {
            continue;
        }
        let mut schema = json!({
            "type": ParamType::from_hint(param.type_hint.as_deref()).as_str()
        });
        if let Some(desc) = &param.description {
            schema["description"] = Value::String(desc.clone());
        }
        properties.insert(param.name.clone(), schema);
        if !param.has_default {
            required.push(Value::String(param.name.clone()));
        }
    }

    json!({
        "type": "object",
        "properties": properties,
        "required": required
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[allow(dead_code)]
    #[derive(Deserialize, JsonSchema)]
    struct Nested {
        city: String,
    }

    #[allow(dead_code)]
    #[derive(Deserialize, JsonSchema)]
    struct Sample {
        name: String,
        count: u32,
        ratio: f64,
        enabled: bool,
        items: Vec<String>,
        nested: Nested,
        maybe: Option<i64>,
        #[serde(default)]
        flag: bool,
    }

    #[test]
    fn test_type_hint_mapping() {
        assert_eq!(ParamType::from_hint(Some("str")), ParamType::String);
        assert_eq!(ParamType::from_hint(Some("int")), ParamType::Integer);
        assert_eq!(ParamType::from_hint(Some("u64")), ParamType::Integer);
        assert_eq!(ParamType::from_hint(Some("float")), ParamType::Number);
        assert_eq!(ParamType::from_hint(Some("bool")), ParamType::Boolean);
        assert_eq!(ParamType::from_hint(Some("Vec<String>")), ParamType::Array);
        assert_eq!(ParamType::from_hint(Some("tuple")), ParamType::Array);
        assert_eq!(ParamType::from_hint(Some("dict")), ParamType::Object);
        assert_eq!(ParamType::from_hint(Some("PathBuf")), ParamType::String);
        assert_eq!(ParamType::from_hint(None), ParamType::String);
    }

    #[test]
    fn test_required_iff_no_default() {
        let sig = Signature::new()
            .param(ParamDecl::required("search_criteria", "dict"))
            .param(ParamDecl::optional("partial_search", "bool"));
        let schema = infer_parameters(&sig);
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["search_criteria"]["type"], "object");
        assert_eq!(schema["properties"]["partial_search"]["type"], "boolean");
        assert_eq!(schema["required"], json!(["search_criteria"]));
    }

    #[test]
    fn test_reserved_params_skipped() {
        let sig = Signature::new()
            .param(ParamDecl::untyped("action_context"))
            .param(ParamDecl::untyped("action_agent"))
            .param(ParamDecl::untyped("message"));
        let schema = infer_parameters(&sig);
        let props = schema["properties"].as_object().unwrap();
        assert_eq!(props.len(), 1);
        assert_eq!(schema["properties"]["message"]["type"], "string");
        assert_eq!(schema["required"], json!(["message"]));
    }

    #[test]
    fn test_description_fallbacks() {
        let bare = derive_metadata(&ToolDescriptor::new("list_files"), &MetadataOverrides::default());
        assert_eq!(bare.name, "list_files");
        assert_eq!(bare.description, DEFAULT_DESCRIPTION);

        let documented = ToolDescriptor::new("list_files").description("  Lists files.  ");
        let meta = derive_metadata(&documented, &MetadataOverrides::default());
        assert_eq!(meta.description, "Lists files.");

        let overrides = MetadataOverrides {
            name: Some("ls".to_string()),
            description: Some("Overridden".to_string()),
            ..Default::default()
        };
        let meta = derive_metadata(&documented, &overrides);
        assert_eq!(meta.name, "ls");
        assert_eq!(meta.description, "Overridden");
    }

    #[test]
    fn test_override_schema_wins_entirely() {
        let custom = json!({"type": "object", "properties": {"q": {"type": "string"}}, "required": []});
        let descriptor = ToolDescriptor::new("search")
            .param(ParamDecl::required("ignored", "int"))
            .parameters_override(custom.clone());
        let meta = derive_metadata(&descriptor, &MetadataOverrides::default());
        assert_eq!(meta.parameters, custom);

        let registration = json!({"type": "object", "properties": {}, "required": []});
        let overrides = MetadataOverrides {
            parameters: Some(registration.clone()),
            ..Default::default()
        };
        assert_eq!(derive_metadata(&descriptor, &overrides).parameters, registration);
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let descriptor = ToolDescriptor::new("sample")
            .signature(Signature::of::<Sample>())
            .tags(&["a", "b"]);
        let first = derive_metadata(&descriptor, &MetadataOverrides::default());
        let second = derive_metadata(&descriptor, &MetadataOverrides::default());
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first.parameters).unwrap(),
            serde_json::to_string(&second.parameters).unwrap()
        );
    }

    #[test]
    fn test_signature_from_typed_struct() {
        let schema = infer_parameters(&Signature::of::<Sample>());
        let props = &schema["properties"];
        assert_eq!(props["name"]["type"], "string");
        assert_eq!(props["count"]["type"], "integer");
        assert_eq!(props["ratio"]["type"], "number");
        assert_eq!(props["enabled"]["type"], "boolean");
        assert_eq!(props["items"]["type"], "array");
        assert_eq!(props["nested"]["type"], "object");
        assert_eq!(props["maybe"]["type"], "integer");
        assert_eq!(props["flag"]["type"], "boolean");

        let required: HashSet<&str> = schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|v| v.as_str())
            .collect();
        let expected: HashSet<&str> =
            ["name", "count", "ratio", "enabled", "items", "nested"].into_iter().collect();
        assert_eq!(required, expected);
    }

    #[test]
    fn test_tags_and_terminal_carry_through() {
        let descriptor = ToolDescriptor::new("terminate").terminal(true).tags(&["system"]);
        let meta = derive_metadata(&descriptor, &MetadataOverrides::default());
        assert!(meta.terminal);
        assert_eq!(meta.tags, vec!["system".to_string()]);

        let overrides = MetadataOverrides {
            terminal: Some(false),
            tags: Some(vec![]),
            ..Default::default()
        };
        let meta = derive_metadata(&descriptor, &overrides);
        assert!(!meta.terminal);
        assert!(meta.tags.is_empty());
    }
}
