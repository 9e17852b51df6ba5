use actionloop_agent::{Agent, AgentSettings, JsonActionLanguage, MemoryEntry};
use actionloop_core::types::Goal;
use actionloop_core::{Config, Paths};
use actionloop_providers::{create_provider, Provider, ScriptedProvider};
use actionloop_tools::registry::TERMINATE_TOOL;
use actionloop_tools::{ActionRegistryBuilder, ToolCatalog};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Which demo agent `run` builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Demo {
    /// Read the project files and report the README
    Files,
    /// Search the property listings and summarise the matches
    Property,
}

impl Demo {
    fn goals(self) -> Vec<Goal> {
        match self {
            Demo::Files => vec![
                Goal::new(1, "Gather Information", "Read each file in the project"),
                Goal::new(
                    1,
                    "Terminate",
                    "Call the terminate call when you have read all the files \
                     and provide the content of the README in the terminate message",
                ),
            ],
            Demo::Property => vec![
                Goal::new(
                    1,
                    "search property based on user inputted criteria",
                    "search the property_data.json based on user criteria, return the \
                     matched property and provide a summary of the options.",
                ),
                Goal::new(
                    2,
                    "Terminate",
                    "Terminate the session when tasks are complete with a helpful summary",
                ),
            ],
        }
    }

    /// Tag filter applied when neither the command line nor the config names one.
    fn default_tags(self) -> Vec<String> {
        match self {
            Demo::Files => Vec::new(),
            Demo::Property => vec!["property_search".to_string()],
        }
    }
}

pub struct RunOptions {
    pub task: String,
    pub demo: Demo,
    pub max_iterations: Option<u32>,
    pub tags: Vec<String>,
    pub tools: Vec<String>,
    pub json_actions: bool,
    pub replay: Option<PathBuf>,
    pub workspace: Option<PathBuf>,
}

/// Tag and name filters: command line first, then config, then the demo's own tags.
fn resolve_filters(demo: Demo, tags: Vec<String>, names: Vec<String>, config: &Config) -> (Vec<String>, Vec<String>) {
    let tags = if tags.is_empty() { config.tools.tags.clone() } else { tags };
    let names = if names.is_empty() { config.tools.names.clone() } else { names };
    if tags.is_empty() && names.is_empty() {
        return (demo.default_tags(), names);
    }
    (tags, names)
}

fn print_entry(index: usize, entry: &MemoryEntry) {
    let body = match serde_json::from_str::<Value>(&entry.content) {
        Ok(v) if v.is_object() || v.is_array() => {
            serde_json::to_string_pretty(&v).unwrap_or_else(|_| entry.content.clone())
        }
        _ => entry.content.clone(),
    };
    println!("[{}] {}", index, entry.role);
    for line in body.lines() {
        println!("    {}", line);
    }
}

/// Build a demo agent from config plus CLI overrides and run it on one task.
pub async fn run(opts: RunOptions) -> anyhow::Result<()> {
    let paths = Paths::new();
    let config = Config::load_or_default(&paths)?;

    let (tags, names) = resolve_filters(opts.demo, opts.tags, opts.tools, &config);

    let mut registry = ActionRegistryBuilder::from_catalog(&ToolCatalog::with_defaults())
        .filter_tags(tags)
        .filter_names(names)
        .build();
    if registry.get(TERMINATE_TOOL).is_none() {
        registry.register_terminate()?;
    }

    let provider: Arc<dyn Provider> = match &opts.replay {
        Some(path) => {
            info!(path = %path.display(), "Replaying backend responses");
            Arc::new(ScriptedProvider::from_file(path)?)
        }
        None => {
            let defaults = &config.agents.defaults;
            Arc::from(create_provider(&config, &defaults.model, defaults.provider.as_deref())?)
        }
    };

    let mut settings = AgentSettings::from_config(&config);
    settings.require_terminal_action = true;
    if let Some(workspace) = opts.workspace {
        settings.workspace = workspace;
    }

    let mut builder = Agent::builder()
        .goals(opts.demo.goals())
        .registry(registry)
        .provider(provider)
        .settings(settings);
    if opts.json_actions {
        builder = builder.language(JsonActionLanguage::new());
    }
    let agent = builder.build()?;

    println!("🔧 Tools: {}", agent.registry().names().join(", "));
    println!();

    let max_iterations = opts
        .max_iterations
        .unwrap_or(config.agents.defaults.max_iterations);
    let report = agent.run_with_report(&opts.task, max_iterations).await?;

    for (index, entry) in report.memory.iter().enumerate() {
        print_entry(index, entry);
    }
    println!();
    println!(
        "✅ {} after {} iteration(s) (session {})",
        report.termination, report.iterations, report.session_id
    );
    Ok(())
}
