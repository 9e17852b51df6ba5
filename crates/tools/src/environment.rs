use chrono::{DateTime, SecondsFormat, Utc};
use futures::FutureExt;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use tracing::{debug, warn};

use crate::{Action, ToolContext};

pub const UNKNOWN_TOOL: &str = "unknown tool";

/// The structured record folded into memory after every dispatch attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    Success {
        payload: Value,
        timestamp: DateTime<Utc>,
    },
    Failure {
        message: String,
        detail: String,
    },
}

impl ExecutionOutcome {
    pub fn success(payload: Value) -> Self {
        ExecutionOutcome::Success {
            payload,
            timestamp: Utc::now(),
        }
    }

    pub fn failure(message: &str, detail: &str) -> Self {
        ExecutionOutcome::Failure {
            message: message.to_string(),
            detail: detail.to_string(),
        }
    }

    pub fn unknown_tool(name: &str) -> Self {
        Self::failure(
            UNKNOWN_TOOL,
            &format!("no action named '{}' is registered", name),
        )
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionOutcome::Success { .. })
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl Serialize for ExecutionOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3))?;
        match self {
            ExecutionOutcome::Success { payload, timestamp } => {
                map.serialize_entry("executed", &true)?;
                map.serialize_entry("result", payload)?;
                map.serialize_entry(
                    "timestamp",
                    &timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
                )?;
            }
            ExecutionOutcome::Failure { message, detail } => {
                map.serialize_entry("executed", &false)?;
                map.serialize_entry("error", message)?;
                map.serialize_entry("detail", detail)?;
            }
        }
        map.end()
    }
}

/// Runs actions and turns every failure, including a panic inside the tool, into data.
#[derive(Debug, Clone, Default)]
pub struct Environment;

impl Environment {
    pub fn new() -> Self {
        Self
    }

    pub async fn execute(&self, action: &Action, args: Value, ctx: ToolContext) -> ExecutionOutcome {
        debug!(tool = %action.name, args = %args, "Executing action");
        let start = std::time::Instant::now();

        let result = AssertUnwindSafe(action.execute(ctx, args)).catch_unwind().await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(Ok(payload)) => {
                debug!(tool = %action.name, duration_ms, "Action succeeded");
                ExecutionOutcome::success(payload)
            }
            Ok(Err(e)) => {
                warn!(tool = %action.name, error = %e, duration_ms, "Action failed");
                ExecutionOutcome::failure(&e.to_string(), &error_detail(&e))
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                warn!(tool = %action.name, panic = %message, "Action panicked");
                ExecutionOutcome::failure(
                    &format!("tool panicked: {}", message),
                    &format!("panic inside action '{}': {}", action.name, message),
                )
            }
        }
    }
}

fn error_detail(e: &(dyn std::error::Error + 'static)) -> String {
    let mut detail = format!("{:?}", e);
    let mut source = e.source();
    while let Some(cause) = source {
        detail.push_str(&format!("\ncaused by: {}", cause));
        source = cause.source();
    }
    detail
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
