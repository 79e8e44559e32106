use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cmd;

#[derive(Parser)]
#[command(name = "forge-review")]
#[command(version, about = "AI-gated review loop for feature implementation")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize .forge/ with a default review.toml and an empty store
    Init,
    /// Add a feature to the backlog
    Add {
        title: String,
        #[arg(short, long)]
        description: Option<String>,
    },
    /// List all features
    List {
        #[arg(long)]
        json: bool,
    },
    /// Move a backlog feature to in_progress
    Start { id: i64 },
    /// Signal that implementation is complete: commit, review and decide
    Review {
        id: i64,
        /// Reject the signal if the feature version has changed since
        #[arg(long)]
        expected_version: Option<u64>,
    },
    /// Implement and review until approved or the review cap is reached
    Run { id: i64 },
    /// Show a feature's status
    Status {
        id: i64,
        #[arg(long)]
        json: bool,
    },
    /// Show a feature's review iterations
    History {
        id: i64,
        #[arg(long)]
        json: bool,
        /// Print the full detail document of one iteration
        #[arg(long)]
        detail: Option<u32>,
    },
    /// Print the context the next implementation attempt would receive
    Context { id: i64 },
    /// Reconcile a feature left in code_review by an interrupted run
    Recover { id: i64 },
    /// Stop automation for a feature and flag it for manual intervention
    Halt { id: i64 },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    forge_review::logging::init_tracing(cli.verbose, cli.log_json)?;

    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    match &cli.command {
        Commands::Init => cmd::cmd_init(&project_dir)?,
        Commands::Add { title, description } => {
            cmd::cmd_add(&project_dir, title, description.as_deref()).await?
        }
        Commands::List { json } => cmd::cmd_list(&project_dir, *json).await?,
        Commands::Start { id } => cmd::cmd_start(&project_dir, *id).await?,
        Commands::Review {
            id,
            expected_version,
        } => cmd::cmd_review(&project_dir, *id, *expected_version).await?,
        Commands::Run { id } => cmd::cmd_run(&project_dir, *id).await?,
        Commands::Status { id, json } => cmd::cmd_status(&project_dir, *id, *json).await?,
        Commands::History { id, json, detail } => {
            cmd::cmd_history(&project_dir, *id, *json, *detail).await?
        }
        Commands::Context { id } => cmd::cmd_context(&project_dir, *id).await?,
        Commands::Recover { id } => cmd::cmd_recover(&project_dir, *id).await?,
        Commands::Halt { id } => cmd::cmd_halt(&project_dir, *id).await?,
        Commands::Config { command } => cmd::cmd_config(&project_dir, command.clone())?,
    }

    Ok(())
}
