use actionloop_core::types::{ChatMessage, Goal, LLMResponse, ToolCallRequest};
use actionloop_tools::Action;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::memory::Memory;

const GOAL_SEPARATOR: &str = "\n-------------------\n";

/// Everything sent to the generation backend for one iteration. Built fresh
/// every time; never stored.
#[derive(Debug, Clone, Default)]
pub struct Prompt {
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<Value>,
    pub metadata: Map<String, Value>,
}

/// What the backend asked for.
#[derive(Debug, Clone, PartialEq)]
pub enum Proposal {
    Invoke { tool_name: String, args: Value },
    Text(String),
}

impl Proposal {
    /// The record appended to memory for an invocation.
    pub fn to_json(&self) -> Value {
        match self {
            Proposal::Invoke { tool_name, args } => json!({ "tool": tool_name, "args": args }),
            Proposal::Text(text) => Value::String(text.clone()),
        }
    }
}

/// Translates between the agent's state and one backend dialect.
pub trait AgentLanguage: Send + Sync {
    fn name(&self) -> &'static str;

    fn construct_prompt(&self, actions: &[&Action], goals: &[Goal], memory: &Memory) -> Prompt;

    fn parse_response(&self, response: &LLMResponse) -> Proposal;
}

/// All goals in one block, lowest priority value first. Equal priorities keep
/// their declared order.
pub fn format_goals(goals: &[Goal]) -> String {
    let mut ordered: Vec<&Goal> = goals.iter().collect();
    ordered.sort_by_key(|g| g.priority);
    ordered
        .iter()
        .map(|g| format!("{}:{}{}{}", g.name, GOAL_SEPARATOR, g.description, GOAL_SEPARATOR))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Memory as chat turns, role and content untouched.
pub fn format_memory(memory: &Memory, limit: Option<usize>) -> Vec<ChatMessage> {
    memory
        .get(limit)
        .iter()
        .map(|e| ChatMessage::new(e.role.chat_role(), &e.content))
        .collect()
}

/// A tool call whose arguments did not decode to an object is not a usable
/// proposal; it becomes text carrying what the backend actually sent.
fn proposal_from_call(response: &LLMResponse, call: &ToolCallRequest) -> Proposal {
    if call.has_valid_arguments() {
        return Proposal::Invoke {
            tool_name: call.name.clone(),
            args: call.arguments.clone(),
        };
    }
    warn!(tool = %call.name, "Tool call arguments are not a JSON object, treating reply as text");
    let text = match response.content.as_deref() {
        Some(content) if !content.trim().is_empty() => content.to_string(),
        _ => json!({ "tool": call.name, "arguments": call.raw_arguments() }).to_string(),
    };
    Proposal::Text(text)
}

fn prompt_metadata(language: &str, actions: &[&Action], memory_entries: usize) -> Map<String, Value> {
    let mut metadata = Map::new();
    metadata.insert("language".to_string(), json!(language));
    metadata.insert("action_count".to_string(), json!(actions.len()));
    metadata.insert("memory_entries".to_string(), json!(memory_entries));
    metadata
}

// ============ native function calling ============

/// Actions go out as native function schemas; the first returned tool call
/// is the proposal.
#[derive(Debug, Clone, Default)]
pub struct FunctionCallingLanguage {
    memory_limit: Option<usize>,
}

impl FunctionCallingLanguage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_memory_limit(mut self, limit: usize) -> Self {
        self.memory_limit = Some(limit);
        self
    }
}

impl AgentLanguage for FunctionCallingLanguage {
    fn name(&self) -> &'static str {
        "function_calling"
    }

    fn construct_prompt(&self, actions: &[&Action], goals: &[Goal], memory: &Memory) -> Prompt {
        let mut messages = vec![ChatMessage::system(&format_goals(goals))];
        let history = format_memory(memory, self.memory_limit);
        let memory_entries = history.len();
        messages.extend(history);

        Prompt {
            messages,
            tools: actions.iter().map(|a| a.schema()).collect(),
            metadata: prompt_metadata(self.name(), actions, memory_entries),
        }
    }

    fn parse_response(&self, response: &LLMResponse) -> Proposal {
        if let Some(call) = response.tool_calls.first() {
            if response.tool_calls.len() > 1 {
                warn!(
                    count = response.tool_calls.len(),
                    using = %call.name,
                    "Backend proposed several tool calls, only the first is used"
                );
            }
            return proposal_from_call(response, call);
        }
        Proposal::Text(response.content.clone().unwrap_or_default())
    }
}

// ============ JSON action block ============

/// For backends without function calling: the tools are described in the
/// system message and the reply must carry a fenced `action` JSON block.
#[derive(Debug, Clone, Default)]
pub struct JsonActionLanguage {
    memory_limit: Option<usize>,
}

impl JsonActionLanguage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_memory_limit(mut self, limit: usize) -> Self {
        self.memory_limit = Some(limit);
        self
    }

    fn describe_actions(actions: &[&Action]) -> String {
        actions
            .iter()
            .map(|a| format!("- {}({}): {}", a.name, describe_params(&a.parameters), a.description))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// `file_name: string, limit?: integer` from an object schema.
fn describe_params(schema: &Value) -> String {
    let required: Vec<&str> = schema
        .get("required")
        .and_then(|r| r.as_array())
        .map(|r| r.iter().filter_map(|v| v.as_str()).collect())
        .unwrap_or_default();
    schema
        .get("properties")
        .and_then(|p| p.as_object())
        .map(|props| {
            props
                .iter()
                .map(|(name, prop)| {
                    let ty = prop.get("type").and_then(|t| t.as_str()).unwrap_or("string");
                    let marker = if required.contains(&name.as_str()) { "" } else { "?" };
                    format!("{}{}: {}", name, marker, ty)
                })
                .collect::<Vec<_>>()
                .join(", ")
        })
        .unwrap_or_default()
}

/// Pull `{"tool_name": ..., "args": {...}}` out of a fenced block, or out of
/// the whole reply when it is bare JSON.
fn extract_action_block(text: &str) -> Option<(String, Value)> {
    let candidate = match text.split("```").nth(1) {
        Some(block) => {
            let block = block.trim_start();
            block
                .strip_prefix("action")
                .or_else(|| block.strip_prefix("json"))
                .unwrap_or(block)
        }
        None => text,
    };

    let value: Value = serde_json::from_str(candidate.trim()).ok()?;
    let tool_name = value
        .get("tool_name")
        .or_else(|| value.get("tool"))
        .and_then(|v| v.as_str())?
        .to_string();
    let args = match value.get("args") {
        Some(Value::Null) | None => json!({}),
        Some(args) => args.clone(),
    };
    Some((tool_name, args))
}

impl AgentLanguage for JsonActionLanguage {
    fn name(&self) -> &'static str {
        "json_action"
    }

    fn construct_prompt(&self, actions: &[&Action], goals: &[Goal], memory: &Memory) -> Prompt {
        let system = format!(
            "{}\n\nAvailable tools:\n{}\n\nEvery response MUST have an action.\n\
             Respond in this format:\n\n```action\n{{\n    \"tool_name\": \"insert tool_name\",\n    \
             \"args\": {{...fill in any required arguments here...}}\n}}\n```",
            format_goals(goals),
            Self::describe_actions(actions)
        );
        let mut messages = vec![ChatMessage::system(&system)];
        let history = format_memory(memory, self.memory_limit);
        let memory_entries = history.len();
        messages.extend(history);

        Prompt {
            messages,
            tools: Vec::new(),
            metadata: prompt_metadata(self.name(), actions, memory_entries),
        }
    }

    fn parse_response(&self, response: &LLMResponse) -> Proposal {
        // a backend that answers with native tool calls anyway is taken at its word
        if let Some(call) = response.tool_calls.first() {
            return proposal_from_call(response, call);
        }

        let text = response.content.clone().unwrap_or_default();
        match extract_action_block(&text) {
            Some((tool_name, args)) => Proposal::Invoke { tool_name, args },
            None => {
                debug!(len = text.len(), "No action block in response, treating as text");
                Proposal::Text(text)
            }
        }
    }
}
