use serde::{Deserialize, Serialize};
use std::fmt;

/// Who produced a memory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    /// Execution results fed back from the environment.
    Environment,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Environment => "environment",
        }
    }

    /// Chat role used when the entry is replayed to a generation backend.
    /// Backends only know system/user/assistant, so environment output is a user turn.
    pub fn chat_role(&self) -> &'static str {
        match self {
            Role::Environment => "user",
            other => other.as_str(),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub role: Role,
    pub content: String,
}

impl MemoryEntry {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Append-only session log. Nothing is ever edited or removed once added.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    items: Vec<MemoryEntry>,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, entry: MemoryEntry) {
        self.items.push(entry);
    }

    pub fn add_entry(&mut self, role: Role, content: impl Into<String>) {
        self.add(MemoryEntry::new(role, content));
    }

    /// The whole log, or its first `limit` entries.
    pub fn get(&self, limit: Option<usize>) -> &[MemoryEntry] {
        match limit {
            Some(n) => &self.items[..n.min(self.items.len())],
            None => &self.items,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn last(&self) -> Option<&MemoryEntry> {
        self.items.last()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MemoryEntry> {
        self.items.iter()
    }

    /// A copy with system entries dropped.
    pub fn without_system(&self) -> Memory {
        Memory {
            items: self
                .items
                .iter()
                .filter(|e| e.role != Role::System)
                .cloned()
                .collect(),
        }
    }
}
