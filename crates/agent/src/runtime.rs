use actionloop_core::types::{Goal, LLMResponse};
use actionloop_core::{Config, Error, Result};
use actionloop_providers::Provider;
use actionloop_tools::{ActionRegistry, Environment, ExecutionOutcome, ToolContext};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::language::{AgentLanguage, FunctionCallingLanguage, Prompt, Proposal};
use crate::memory::{Memory, Role};

/// Why a run stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// A terminal action ran successfully.
    Action(String),
    /// The iteration budget ran out.
    Budget,
    /// The backend answered with text instead of a tool call.
    Text,
    /// The backend kept failing after every retry.
    BackendError,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::Action(name) => write!(f, "terminated by action '{}'", name),
            Termination::Budget => f.write_str("iteration budget exhausted"),
            Termination::Text => f.write_str("backend replied with text"),
            Termination::BackendError => f.write_str("backend unavailable"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub memory: Memory,
    pub termination: Termination,
    pub iterations: u32,
    pub session_id: String,
}

#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub llm_max_retries: u32,
    pub llm_retry_delay_ms: u64,
    /// Refuse to start when no registered action can end the run.
    pub require_terminal_action: bool,
    /// Directory handed to tools through `ToolContext`.
    pub workspace: PathBuf,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            llm_max_retries: 2,
            llm_retry_delay_ms: 1000,
            require_terminal_action: false,
            workspace: PathBuf::from("."),
        }
    }
}

impl AgentSettings {
    pub fn from_config(config: &Config) -> Self {
        let defaults = &config.agents.defaults;
        Self {
            llm_max_retries: defaults.llm_max_retries,
            llm_retry_delay_ms: defaults.llm_retry_delay_ms,
            require_terminal_action: false,
            workspace: PathBuf::from(&defaults.workspace),
        }
    }
}

/// Goals, a dialect, a registry and a backend, driven by a bounded loop.
pub struct Agent {
    goals: Vec<Goal>,
    language: Box<dyn AgentLanguage>,
    registry: ActionRegistry,
    provider: Arc<dyn Provider>,
    environment: Environment,
    settings: AgentSettings,
}

impl Agent {
    pub fn builder() -> AgentBuilder {
        AgentBuilder::new()
    }

    pub fn goals(&self) -> &[Goal] {
        &self.goals
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    /// Run `task` to completion and hand back the session log.
    pub async fn run(&self, task: &str, max_iterations: u32) -> Result<Memory> {
        Ok(self.run_with_report(task, max_iterations).await?.memory)
    }

    /// Like [`Agent::run`], also reporting how and when the loop stopped.
    ///
    /// Only configuration problems found before the first iteration come back
    /// as `Err`; everything that goes wrong inside the loop is written to memory.
    pub async fn run_with_report(&self, task: &str, max_iterations: u32) -> Result<RunReport> {
        self.run_with_memory(Memory::new(), task, max_iterations).await
    }

    /// Continue an earlier session: `task` is appended to `memory` and the
    /// loop starts from that history.
    pub async fn run_with_memory(&self, mut memory: Memory, task: &str, max_iterations: u32) -> Result<RunReport> {
        if max_iterations == 0 {
            return Err(Error::Config("max_iterations must be at least 1".to_string()));
        }
        if self.settings.require_terminal_action && !self.registry.has_terminal() {
            return Err(Error::Config(
                "no terminal action registered; the run could only end by budget".to_string(),
            ));
        }

        let session_id = uuid::Uuid::new_v4().to_string();
        let actions = self.registry.list();
        info!(
            session_id = %session_id,
            language = self.language.name(),
            actions = actions.len(),
            max_iterations,
            prior_entries = memory.len(),
            "Agent run started"
        );

        memory.add_entry(Role::User, task);

        let mut iterations = 0u32;
        let termination = loop {
            if iterations >= max_iterations {
                warn!(session_id = %session_id, max_iterations, "Reached max iterations");
                break Termination::Budget;
            }
            iterations += 1;
            let iteration = iterations;
            debug!(iteration, "Agent iteration");

            let prompt = self.language.construct_prompt(&actions, &self.goals, &memory);
            let response = match self.call_backend(&prompt, iteration).await {
                Ok(r) => r,
                Err(e) => {
                    let outcome = ExecutionOutcome::failure("backend error", &e.to_string());
                    memory.add_entry(Role::Environment, outcome.to_json().to_string());
                    break Termination::BackendError;
                }
            };

            let (tool_name, args) = match self.language.parse_response(&response) {
                Proposal::Text(text) => {
                    info!(iteration, len = text.len(), "Backend replied with text, stopping");
                    memory.add_entry(Role::Assistant, text);
                    break Termination::Text;
                }
                Proposal::Invoke { tool_name, args } => (tool_name, args),
            };

            memory.add_entry(
                Role::Assistant,
                Proposal::Invoke {
                    tool_name: tool_name.clone(),
                    args: args.clone(),
                }
                .to_json()
                .to_string(),
            );

            let (outcome, terminal) = match self.registry.get(&tool_name) {
                Some(action) => {
                    let ctx = ToolContext {
                        workspace: self.settings.workspace.clone(),
                        session_id: session_id.clone(),
                        iteration,
                    };
                    (self.environment.execute(action, args, ctx).await, action.terminal)
                }
                None => {
                    warn!(iteration, tool = %tool_name, "Backend proposed an unknown tool");
                    (ExecutionOutcome::unknown_tool(&tool_name), false)
                }
            };

            let executed = outcome.is_success();
            info!(iteration, tool = %tool_name, executed, "Action dispatched");
            memory.add_entry(Role::Environment, outcome.to_json().to_string());

            if terminal && executed {
                break Termination::Action(tool_name);
            }
        };

        info!(
            session_id = %session_id,
            iterations,
            termination = %termination,
            memory_entries = memory.len(),
            "Agent run finished"
        );
        Ok(RunReport {
            memory,
            termination,
            iterations,
            session_id,
        })
    }

    /// One backend call with exponential backoff between attempts.
    async fn call_backend(&self, prompt: &Prompt, iteration: u32) -> Result<LLMResponse> {
        let max_retries = self.settings.llm_max_retries;
        let base_delay_ms = self.settings.llm_retry_delay_ms;
        let mut last_error = None;

        for attempt in 0..=max_retries {
            if attempt > 0 {
                let delay_ms = base_delay_ms * (1u64 << (attempt - 1).min(4));
                warn!(attempt, max_retries, delay_ms, iteration, "Retrying LLM call after transient error");
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
            match self.provider.chat(&prompt.messages, &prompt.tools).await {
                Ok(r) => {
                    if attempt > 0 {
                        info!(attempt, iteration, "LLM call succeeded after retry");
                    }
                    return Ok(r);
                }
                Err(e) => {
                    warn!(error = %e, attempt, max_retries, iteration, "LLM call failed");
                    last_error = Some(e);
                }
            }
        }

        let e = last_error.unwrap_or_else(|| Error::Provider("no attempt was made".to_string()));
        warn!(error = %e, iteration, retries = max_retries, "LLM call failed after all retries");
        Err(e)
    }
}

#[derive(Default)]
pub struct AgentBuilder {
    goals: Vec<Goal>,
    language: Option<Box<dyn AgentLanguage>>,
    registry: ActionRegistry,
    provider: Option<Arc<dyn Provider>>,
    settings: AgentSettings,
}

impl AgentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn goal(mut self, goal: Goal) -> Self {
        self.goals.push(goal);
        self
    }

    pub fn goals(mut self, goals: Vec<Goal>) -> Self {
        self.goals.extend(goals);
        self
    }

    pub fn language(mut self, language: impl AgentLanguage + 'static) -> Self {
        self.language = Some(Box::new(language));
        self
    }

    pub fn registry(mut self, registry: ActionRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn provider(mut self, provider: Arc<dyn Provider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn settings(mut self, settings: AgentSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn build(self) -> Result<Agent> {
        let provider = self
            .provider
            .ok_or_else(|| Error::Config("agent needs a generation backend".to_string()))?;
        Ok(Agent {
            goals: self.goals,
            language: self
                .language
                .unwrap_or_else(|| Box::new(FunctionCallingLanguage::new())),
            registry: self.registry,
            provider,
            environment: Environment::new(),
            settings: self.settings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::JsonActionLanguage;
    use actionloop_core::types::ToolCallRequest;
    use actionloop_providers::ScriptedProvider;
    use actionloop_tools::metadata::{ParamDecl, ToolDescriptor};
    use actionloop_tools::system::TerminateTool;
    use actionloop_tools::{Action, FnTool, ToolCatalog};
    use serde_json::{json, Value};

    fn finish_action() -> Action {
        let descriptor = ToolDescriptor::new("finish")
            .description("End the session.")
            .param(ParamDecl::required("message", "str"))
            .terminal(true);
        Action::from_tool(Arc::new(FnTool::new(descriptor, |_c, p| {
            Ok(json!(p["message"].as_str().unwrap_or_default()))
        })))
    }

    fn echo_action() -> Action {
        Action::from_tool(Arc::new(FnTool::new(ToolDescriptor::new("echo"), |_c, p| Ok(p))))
    }

    fn failing_action() -> Action {
        Action::from_tool(Arc::new(FnTool::new(ToolDescriptor::new("flaky"), |_c, _p| {
            Err(Error::Tool("always broken".to_string()))
        })))
    }

    fn registry(actions: Vec<Action>) -> ActionRegistry {
        let mut registry = ActionRegistry::new();
        for action in actions {
            registry.register(action);
        }
        registry
    }

    fn quick_settings() -> AgentSettings {
        AgentSettings {
            llm_max_retries: 0,
            llm_retry_delay_ms: 0,
            ..AgentSettings::default()
        }
    }

    fn agent(actions: Vec<Action>, provider: Arc<ScriptedProvider>) -> Agent {
        Agent::builder()
            .goal(Goal::new(1, "Finish", "Call finish when done"))
            .registry(registry(actions))
            .provider(provider)
            .settings(quick_settings())
            .build()
            .unwrap()
    }

    fn entry_json(memory: &Memory, index: usize) -> Value {
        serde_json::from_str(&memory.get(None)[index].content).unwrap()
    }

    /// Never proposes anything terminal.
    fn endless(tool: &str, n: usize) -> Arc<ScriptedProvider> {
        Arc::new(ScriptedProvider::new(
            (0..n).map(|_| LLMResponse::tool_call(tool, json!({"x": 1}))).collect(),
        ))
    }

    #[tokio::test]
    async fn test_terminal_action_ends_run() {
        let provider = Arc::new(ScriptedProvider::new(vec![LLMResponse::tool_call(
            "finish",
            json!({"message": "done"}),
        )]));
        let report = agent(vec![finish_action()], provider)
            .run_with_report("wrap up", 10)
            .await
            .unwrap();

        assert_eq!(report.termination, Termination::Action("finish".to_string()));
        assert_eq!(report.iterations, 1);
        let memory = &report.memory;
        assert_eq!(memory.len(), 3);
        assert_eq!(memory.get(None)[0].role, Role::User);
        assert_eq!(memory.get(None)[0].content, "wrap up");
        assert_eq!(entry_json(memory, 1), json!({"tool": "finish", "args": {"message": "done"}}));
        let last = entry_json(memory, 2);
        assert_eq!(last["executed"], true);
        assert_eq!(last["result"], "done");
    }

    #[tokio::test]
    async fn test_unknown_tool_is_recorded_and_loop_continues() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            LLMResponse::tool_call("not_a_real_tool", json!({})),
            LLMResponse::tool_call("finish", json!({"message": "ok"})),
        ]));
        let report = agent(vec![finish_action()], provider.clone())
            .run_with_report("task", 5)
            .await
            .unwrap();

        let unknown = entry_json(&report.memory, 2);
        assert_eq!(unknown["executed"], false);
        assert_eq!(unknown["error"], "unknown tool");
        assert_eq!(report.iterations, 2);
        assert_eq!(report.termination, Termination::Action("finish".to_string()));

        // the second prompt carries the error back to the backend
        let second = &provider.requests()[1];
        assert!(second.messages.iter().any(|m| m.content.contains("unknown tool")));
    }

    #[tokio::test]
    async fn test_budget_bounds_the_loop() {
        for max in [1u32, 2, 3, 5] {
            let provider = endless("echo", 10);
            let report = agent(vec![echo_action()], provider.clone())
                .run_with_report("loop forever", max)
                .await
                .unwrap();
            assert_eq!(report.termination, Termination::Budget);
            assert_eq!(report.iterations, max);
            assert_eq!(provider.requests().len(), max as usize);
            assert_eq!(report.memory.len(), 1 + 2 * max as usize);
        }
    }

    #[tokio::test]
    async fn test_failing_tool_adds_one_error_per_iteration() {
        let provider = endless("flaky", 4);
        let report = agent(vec![failing_action()], provider)
            .run_with_report("try it", 4)
            .await
            .unwrap();

        assert_eq!(report.termination, Termination::Budget);
        let errors: Vec<Value> = report
            .memory
            .iter()
            .filter(|e| e.role == Role::Environment)
            .map(|e| serde_json::from_str(&e.content).unwrap())
            .collect();
        assert_eq!(errors.len(), 4);
        assert!(errors.iter().all(|e| e["executed"] == false && e["error"] == "Tool error: always broken"));
    }

    #[tokio::test]
    async fn test_failed_terminal_action_does_not_end_run() {
        let broken_finish = Action::from_tool(Arc::new(FnTool::new(
            ToolDescriptor::new("finish").terminal(true),
            |_c, _p| Err(Error::Tool("cannot finish".to_string())),
        )));
        let provider = endless("finish", 3);
        let report = agent(vec![broken_finish], provider)
            .run_with_report("task", 3)
            .await
            .unwrap();
        assert_eq!(report.termination, Termination::Budget);
    }

    #[tokio::test]
    async fn test_memory_is_append_only_across_iterations() {
        let provider = endless("echo", 3);
        let memory = agent(vec![echo_action()], provider.clone())
            .run("remember me", 3)
            .await
            .unwrap();

        assert!(memory.len() >= 3);
        // each request saw the previous request's history as an unchanged prefix
        let requests = provider.requests();
        for pair in requests.windows(2) {
            let earlier = &pair[0].messages;
            let later = &pair[1].messages;
            assert!(later.len() > earlier.len());
            assert_eq!(&later[..earlier.len()], earlier.as_slice());
        }
    }

    #[tokio::test]
    async fn test_undecodable_arguments_are_not_executed() {
        let raw = "{\"message\": \"unterminated";
        let provider = Arc::new(ScriptedProvider::new(vec![LLMResponse {
            tool_calls: vec![ToolCallRequest::new("echo", json!(raw))],
            finish_reason: "tool_calls".to_string(),
            ..LLMResponse::default()
        }]));
        let report = agent(vec![echo_action()], provider)
            .run_with_report("task", 5)
            .await
            .unwrap();

        assert_eq!(report.termination, Termination::Text);
        assert_eq!(report.iterations, 1);
        assert_eq!(report.memory.len(), 2);
        assert!(report.memory.iter().all(|e| e.role != Role::Environment));
        let recorded = entry_json(&report.memory, 1);
        assert_eq!(recorded, json!({"tool": "echo", "arguments": raw}));
    }

    #[tokio::test]
    async fn test_run_continues_prior_memory() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            LLMResponse::tool_call("echo", json!({"x": 1})),
            LLMResponse::tool_call("finish", json!({"message": "second"})),
        ]));
        let agent = agent(vec![echo_action(), finish_action()], provider.clone());

        let first = agent.run_with_report("first task", 1).await.unwrap();
        assert_eq!(first.termination, Termination::Budget);
        assert_eq!(first.memory.len(), 3);

        let second = agent
            .run_with_memory(first.memory.clone(), "second task", 3)
            .await
            .unwrap();
        assert_eq!(second.termination, Termination::Action("finish".to_string()));
        assert_eq!(second.memory.len(), 6);
        assert_eq!(second.memory.get(Some(3)), first.memory.get(None));
        assert_eq!(second.memory.get(None)[3].content, "second task");

        // the second run's first prompt replays the earlier session
        let request = &provider.requests()[1];
        assert!(request.messages.iter().any(|m| m.content == "first task"));
        assert!(request.messages.iter().any(|m| m.content == "second task"));
    }

    #[tokio::test]
    async fn test_text_reply_ends_run() {
        let provider = Arc::new(ScriptedProvider::new(vec![LLMResponse::text("Nothing to do.")]));
        let report = agent(vec![echo_action()], provider)
            .run_with_report("hello", 5)
            .await
            .unwrap();
        assert_eq!(report.termination, Termination::Text);
        assert_eq!(report.memory.last().unwrap().role, Role::Assistant);
        assert_eq!(report.memory.last().unwrap().content, "Nothing to do.");
    }

    #[tokio::test]
    async fn test_configuration_errors_surface_before_loop() {
        let provider = endless("echo", 1);
        let err = agent(vec![echo_action()], provider.clone()).run("task", 0).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let strict = Agent::builder()
            .registry(registry(vec![echo_action()]))
            .provider(provider.clone())
            .settings(AgentSettings {
                require_terminal_action: true,
                ..quick_settings()
            })
            .build()
            .unwrap();
        assert!(matches!(strict.run("task", 3).await, Err(Error::Config(_))));
        assert!(provider.requests().is_empty());

        assert!(matches!(Agent::builder().build(), Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_backend_retries_then_recovers() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        provider.push_error("timeout");
        provider.push(LLMResponse::tool_call("finish", json!({"message": "late"})));

        let agent = Agent::builder()
            .registry(registry(vec![finish_action()]))
            .provider(provider.clone())
            .settings(AgentSettings {
                llm_max_retries: 1,
                ..quick_settings()
            })
            .build()
            .unwrap();
        let report = agent.run_with_report("task", 2).await.unwrap();
        assert_eq!(report.termination, Termination::Action("finish".to_string()));
        assert_eq!(provider.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_backend_failure_is_recorded() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        provider.push_error("down").push_error("still down");

        let agent = Agent::builder()
            .registry(registry(vec![finish_action()]))
            .provider(provider)
            .settings(AgentSettings {
                llm_max_retries: 1,
                ..quick_settings()
            })
            .build()
            .unwrap();
        let report = agent.run_with_report("task", 5).await.unwrap();
        assert_eq!(report.termination, Termination::BackendError);
        let last = entry_json(&report.memory, 1);
        assert_eq!(last["executed"], false);
        assert_eq!(last["error"], "backend error");
        assert!(last["detail"].as_str().unwrap().contains("still down"));
    }

    #[tokio::test]
    async fn test_tools_receive_workspace_and_iteration() {
        let inspect = Action::from_tool(Arc::new(FnTool::new(ToolDescriptor::new("inspect"), |ctx, _p| {
            Ok(json!({
                "workspace": ctx.workspace.to_string_lossy(),
                "iteration": ctx.iteration,
                "has_session": !ctx.session_id.is_empty()
            }))
        })));
        let dir = tempfile::tempdir().unwrap();
        let provider = endless("inspect", 2);
        let agent = Agent::builder()
            .registry(registry(vec![inspect]))
            .provider(provider)
            .settings(AgentSettings {
                workspace: dir.path().to_path_buf(),
                ..quick_settings()
            })
            .build()
            .unwrap();

        let report = agent.run_with_report("task", 2).await.unwrap();
        let second = entry_json(&report.memory, 4);
        assert_eq!(second["result"]["iteration"], 2);
        assert_eq!(second["result"]["has_session"], true);
        assert_eq!(second["result"]["workspace"], dir.path().to_string_lossy().to_string());
    }

    #[tokio::test]
    async fn test_json_action_dialect_with_catalog_terminate() {
        let mut registry = ToolCatalog::new();
        registry.add(Arc::new(TerminateTool));
        let mut registry = actionloop_tools::ActionRegistryBuilder::from_catalog(&registry)
            .filter_names(["nothing"])
            .build();
        registry.register_terminate().unwrap();

        let provider = Arc::new(ScriptedProvider::new(vec![LLMResponse::text(
            "```action\n{\"tool_name\": \"terminate\", \"args\": {\"message\": \"bye\"}}\n```",
        )]));
        let agent = Agent::builder()
            .goal(Goal::new(1, "Terminate", "Say bye"))
            .language(JsonActionLanguage::new())
            .registry(registry)
            .provider(provider.clone())
            .settings(quick_settings())
            .build()
            .unwrap();

        let report = agent.run_with_report("task", 3).await.unwrap();
        assert_eq!(report.termination, Termination::Action("terminate".to_string()));
        assert_eq!(entry_json(&report.memory, 2)["result"], "bye\nTerminating...");
        assert!(provider.requests()[0].tools.is_empty());
    }
}
