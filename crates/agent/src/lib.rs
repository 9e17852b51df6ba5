pub mod language;
pub mod memory;
pub mod runtime;

pub use language::{AgentLanguage, FunctionCallingLanguage, JsonActionLanguage, Prompt, Proposal};
pub use memory::{Memory, MemoryEntry, Role};
pub use runtime::{Agent, AgentBuilder, AgentSettings, RunReport, Termination};
