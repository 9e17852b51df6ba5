pub mod factory;
pub mod openai;
pub mod scripted;

use actionloop_core::types::{ChatMessage, LLMResponse};
use actionloop_core::Result;
use async_trait::async_trait;
use serde_json::Value;

/// A generation backend: ordered messages plus optional tool schemas in, either
/// free text or tool calls out.
#[async_trait]
pub trait Provider: Send + Sync {
    async fn chat(&self, messages: &[ChatMessage], tools: &[Value]) -> Result<LLMResponse>;
}

pub use factory::{create_main_provider, create_provider, infer_provider_from_model};
pub use openai::OpenAIProvider;
pub use scripted::{RecordedRequest, ScriptStep, ScriptedProvider};
