use actionloop_core::types::{ChatMessage, LLMResponse};
use actionloop_core::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

use crate::Provider;

/// One step of a replay script: a canned response, or a backend failure.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ScriptStep {
    Failure { error: String },
    Response(LLMResponse),
}

/// What the provider was asked on one call.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<Value>,
}

/// A provider that plays back a fixed script. Used for offline replays and
/// for driving the agent loop in tests.
///
/// Once the script runs out, every further call answers with plain text so a
/// loop without a terminal action still ends.
pub struct ScriptedProvider {
    steps: Mutex<VecDeque<ScriptStep>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<LLMResponse>) -> Self {
        Self::from_steps(responses.into_iter().map(ScriptStep::Response).collect())
    }

    pub fn from_steps(steps: Vec<ScriptStep>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Load a JSON array of steps. Each element is either an `LLMResponse`
    /// object or `{"error": "..."}`.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let steps: Vec<ScriptStep> = serde_json::from_str(&raw)?;
        debug!(path = %path.display(), steps = steps.len(), "Loaded replay script");
        Ok(Self::from_steps(steps))
    }

    pub fn push(&self, response: LLMResponse) -> &Self {
        self.lock_steps().push_back(ScriptStep::Response(response));
        self
    }

    pub fn push_error(&self, message: &str) -> &Self {
        self.lock_steps().push_back(ScriptStep::Failure {
            error: message.to_string(),
        });
        self
    }

    pub fn remaining(&self) -> usize {
        self.lock_steps().len()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn lock_steps(&self) -> std::sync::MutexGuard<'_, VecDeque<ScriptStep>> {
        self.steps.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn chat(&self, messages: &[ChatMessage], tools: &[Value]) -> Result<LLMResponse> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(RecordedRequest {
                messages: messages.to_vec(),
                tools: tools.to_vec(),
            });

        match self.lock_steps().pop_front() {
            Some(ScriptStep::Response(response)) => Ok(response),
            Some(ScriptStep::Failure { error }) => Err(Error::Provider(error)),
            None => {
                debug!("Replay script exhausted");
                Ok(LLMResponse::text("Script exhausted."))
            }
        }
    }
}
