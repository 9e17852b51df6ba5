use serde::{Deserialize, Serialize};
use tracing::warn;

/// A single tool invocation proposed by the generation backend.
///
/// Serializes to the OpenAI-compatible shape
/// `{id, type: "function", function: {name, arguments}}`.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

impl ToolCallRequest {
    pub fn new(name: &str, arguments: serde_json::Value) -> Self {
        Self {
            id: String::new(),
            name: name.to_string(),
            arguments,
        }
    }

    /// Arguments are usable only when they decoded to a JSON object.
    pub fn has_valid_arguments(&self) -> bool {
        self.arguments.is_object()
    }

    /// The arguments as the backend sent them.
    pub fn raw_arguments(&self) -> String {
        match &self.arguments {
            serde_json::Value::String(raw) => raw.clone(),
            other => other.to_string(),
        }
    }
}

impl Serialize for ToolCallRequest {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry("id", &self.id)?;
        map.serialize_entry("type", "function")?;
        map.serialize_entry("function", &serde_json::json!({
            "name": self.name,
            "arguments": self.raw_arguments()
        }))?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for ToolCallRequest {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        let obj = value.as_object().ok_or_else(|| serde::de::Error::custom("expected object"))?;

        let id = obj.get("id")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        // Nested format: {id, type, function: {name, arguments}}
        if let Some(func) = obj.get("function").and_then(|v| v.as_object()) {
            let name = func.get("name")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            let arguments = match func.get("arguments") {
                Some(serde_json::Value::String(s)) => parse_arguments(s),
                Some(v) => v.clone(),
                None => empty_object(),
            };
            return Ok(ToolCallRequest { id, name, arguments });
        }

        // Flat format: {id, name, arguments}
        let name = obj.get("name")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let arguments = match obj.get("arguments") {
            Some(serde_json::Value::String(s)) => parse_arguments(s),
            Some(v) => v.clone(),
            None => empty_object(),
        };

        Ok(ToolCallRequest { id, name, arguments })
    }
}

/// Arguments arrive as a JSON-encoded string. An unparseable string is kept
/// verbatim as a JSON string so the call can be rejected downstream.
pub fn parse_arguments(raw: &str) -> serde_json::Value {
    if raw.trim().is_empty() {
        return empty_object();
    }
    serde_json::from_str(raw).unwrap_or_else(|e| {
        warn!(error = %e, raw = %raw, "Failed to parse tool call arguments as JSON, keeping raw string");
        serde_json::Value::String(raw.to_string())
    })
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMResponse {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCallRequest>,
    #[serde(default)]
    pub finish_reason: String,
    #[serde(default)]
    pub usage: serde_json::Value,
}

impl LLMResponse {
    pub fn text(content: &str) -> Self {
        Self {
            content: Some(content.to_string()),
            finish_reason: "stop".to_string(),
            ..Self::default()
        }
    }

    pub fn tool_call(name: &str, arguments: serde_json::Value) -> Self {
        Self {
            tool_calls: vec![ToolCallRequest::new(name, arguments)],
            finish_reason: "tool_calls".to_string(),
            ..Self::default()
        }
    }
}

impl Default for LLMResponse {
    fn default() -> Self {
        Self {
            content: None,
            tool_calls: Vec::new(),
            finish_reason: String::new(),
            usage: serde_json::Value::Null,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
        }
    }

    pub fn system(content: &str) -> Self {
        Self::new("system", content)
    }

    pub fn user(content: &str) -> Self {
        Self::new("user", content)
    }

    pub fn assistant(content: &str) -> Self {
        Self::new("assistant", content)
    }
}

/// An objective handed to the agent at construction. Lower priority renders first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goal {
    pub priority: i32,
    pub name: String,
    pub description: String,
}

impl Goal {
    pub fn new(priority: i32, name: &str, description: &str) -> Self {
        Self {
            priority,
            name: name.to_string(),
            description: description.to_string(),
        }
    }
}
