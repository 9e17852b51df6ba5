use actionloop_core::{Error, Result};
use async_trait::async_trait;
use serde_json::Value;

use crate::metadata::{ParamDecl, ToolDescriptor};
use crate::{Tool, ToolContext};

// ============ terminate ============

pub struct TerminateTool;

#[async_trait]
impl Tool for TerminateTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new("terminate")
            .description("Terminates the session and prints the message to the user.")
            .param(ParamDecl::required("message", "str").describe("Final message for the user"))
            .terminal(true)
            .tags(&["system"])
    }

    async fn execute(&self, _ctx: ToolContext, params: Value) -> Result<Value> {
        let message = params
            .get("message")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::Validation("Missing required parameter: message".to_string()))?;
        Ok(Value::String(format!("{}\nTerminating...", message)))
    }
}
