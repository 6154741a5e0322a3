//! Benchmate CLI: inspect and exercise the assistant's tool and context
//! layers without a workbench attached.
//!
//! Commands:
//! - `catalog`: List the registered tools
//! - `call`: Dispatch one tool call against the local host
//! - `context`: Merge script selections the way the assistant does
//! - `history`: Inspect saved conversations
//! - `config`: Show, locate or create the configuration file
//! - `providers`: Show which chat providers have credentials

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "benchmate",
    about = "Benchmate: the workbench assistant's tool and context layers",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file to use instead of ~/.benchmate/config.toml
    #[arg(long, global = true, env = "BENCHMATE_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the registered tools
    Catalog {
        /// Print the tool definitions as JSON
        #[arg(long)]
        json: bool,
    },

    /// Dispatch a single tool call against the local host
    Call {
        /// Tool name, e.g. runCommand
        tool: String,

        /// Arguments as a JSON object
        #[arg(short, long, default_value = "{}")]
        args: String,

        /// Print the full tool result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Active context operations
    Context {
        #[command(subcommand)]
        action: ContextCommands,
    },

    /// Saved conversations
    History {
        #[command(subcommand)]
        action: HistoryCommands,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },

    /// Show chat providers and whether they are enabled
    Providers,
}

#[derive(Subcommand)]
enum ContextCommands {
    /// Add file selections (`path:start-end`) and print the merged context
    Merge {
        #[arg(required = true)]
        selections: Vec<String>,

        /// Print the merged items as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum HistoryCommands {
    /// List saved conversations
    List,
    /// Print one conversation
    Show { name: String },
    /// Delete a conversation
    Delete { name: String },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration (API keys redacted)
    Show,
    /// Print the config file path
    Path,
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Catalog { json } => commands::catalog::run(config_path, json)?,
        Commands::Call { tool, args, json } => {
            commands::call::run(config_path, &tool, &args, json).await?
        }
        Commands::Context { action } => match action {
            ContextCommands::Merge { selections, json } => {
                commands::context::merge(&selections, json)?
            }
        },
        Commands::History { action } => match action {
            HistoryCommands::List => commands::history::list(config_path).await?,
            HistoryCommands::Show { name } => commands::history::show(config_path, &name).await?,
            HistoryCommands::Delete { name } => {
                commands::history::delete(config_path, &name).await?
            }
        },
        Commands::Config { action } => match action {
            ConfigCommands::Show => commands::config_cmd::show(config_path)?,
            ConfigCommands::Path => commands::config_cmd::path(config_path),
            ConfigCommands::Init { force } => commands::config_cmd::init(config_path, force)?,
        },
        Commands::Providers => commands::providers::run(config_path)?,
    }

    Ok(())
}
