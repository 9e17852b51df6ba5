mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "actionloop")]
#[command(about = "Goal-driven agent loop over a registry of tools", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a demo agent on a task
    Run {
        /// Task given to the agent as its first memory entry
        #[arg(short, long)]
        task: String,

        /// Demo agent to build
        #[arg(long, value_enum, default_value = "files")]
        demo: commands::run_cmd::Demo,

        /// Iteration budget (overrides agents.defaults.maxIterations)
        #[arg(long)]
        max_iterations: Option<u32>,

        /// Only expose tools carrying this tag (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Only expose tools with this name (repeatable)
        #[arg(long = "tool")]
        tools: Vec<String>,

        /// Describe tools in the prompt and parse ```action blocks instead of native function calling
        #[arg(long)]
        json_actions: bool,

        /// Replay backend responses from a JSON file instead of calling a provider
        #[arg(long)]
        replay: Option<PathBuf>,

        /// Directory the tools operate in (overrides agents.defaults.workspace)
        #[arg(short, long)]
        workspace: Option<PathBuf>,
    },

    /// Inspect the built-in tools
    Tools {
        #[command(subcommand)]
        command: ToolsCommands,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ToolsCommands {
    /// List the built-in tools
    List {
        /// Filter by tag
        #[arg(long)]
        tag: Option<String>,
    },
    /// Show the derived metadata for one tool
    Info {
        /// Tool name
        tool_name: String,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration
    Show,
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match cli.command {
        Commands::Run {
            task,
            demo,
            max_iterations,
            tags,
            tools,
            json_actions,
            replay,
            workspace,
        } => {
            commands::run_cmd::run(commands::run_cmd::RunOptions {
                task,
                demo,
                max_iterations,
                tags,
                tools,
                json_actions,
                replay,
                workspace,
            })
            .await?;
        }

        Commands::Tools { command } => match command {
            ToolsCommands::List { tag } => {
                commands::tools_cmd::list(tag).await?;
            }
            ToolsCommands::Info { tool_name } => {
                commands::tools_cmd::info(&tool_name).await?;
            }
        },

        Commands::Config { command } => match command {
            ConfigCommands::Show => {
                commands::config_cmd::show().await?;
            }
            ConfigCommands::Init { force } => {
                commands::config_cmd::init(force).await?;
            }
        },
    }

    Ok(())
}
