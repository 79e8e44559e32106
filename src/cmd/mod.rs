//! CLI command implementations.
//!
//! | Module     | Commands handled                                  |
//! |------------|---------------------------------------------------|
//! | `project`  | `Init`, `Config`                                  |
//! | `feature`  | `Add`, `List`, `Start`, `Status`, `History`       |
//! | `run`      | `Review`, `Run`, `Recover`, `Halt`, `Context`     |

pub mod feature;
pub mod project;
pub mod run;

use anyhow::{Result, bail};
use std::path::Path;
use std::sync::Arc;

use forge_review::config::ReviewToml;
use forge_review::events::{BroadcastNotifier, ReviewEvent};
use forge_review::init::{get_forge_dir, is_initialized};
use forge_review::orchestrator::ReviewOrchestrator;
use forge_review::pipeline::ConfiguredPipeline;
use forge_review::store::SqliteStore;
use forge_review::tracker::GitCommitProvider;

pub use feature::{cmd_add, cmd_history, cmd_list, cmd_start, cmd_status};
pub use project::{cmd_config, cmd_init};
pub use run::{cmd_context, cmd_halt, cmd_recover, cmd_review, cmd_run};

/// Everything a command needs to talk to the review loop.
pub struct Session {
    pub orchestrator: Arc<ReviewOrchestrator>,
    pub events: BroadcastNotifier,
}

pub fn open_session(project_dir: &Path) -> Result<Session> {
    if !is_initialized(project_dir) {
        bail!("Project is not initialized. Run 'forge-review init' first.");
    }
    let forge_dir = get_forge_dir(project_dir);
    let config = ReviewToml::load_or_default(&forge_dir)?;
    config.validate()?;

    let store = Arc::new(SqliteStore::open(&config.db_path(&forge_dir))?);
    let events = BroadcastNotifier::new(config.events.capacity);
    let pipeline: ConfiguredPipeline = config.pipeline.clone();
    let orchestrator = ReviewOrchestrator::new(
        store,
        Arc::new(GitCommitProvider),
        Arc::new(config.agent(project_dir)),
        Arc::new(pipeline),
        Arc::new(events.clone()),
    )
    .with_settings(config.orchestrator_settings(project_dir));

    Ok(Session {
        orchestrator: Arc::new(orchestrator),
        events,
    })
}

/// Print events as they arrive until the channel closes or the task is aborted.
pub fn spawn_event_printer(events: &BroadcastNotifier) -> tokio::task::JoinHandle<()> {
    let mut rx = events.subscribe();
    tokio::spawn(async move {
        use tokio::sync::broadcast::error::RecvError;
        loop {
            match rx.recv().await {
                Ok(event) => print_event(&event),
                Err(RecvError::Lagged(n)) => {
                    println!("  {}", console::style(format!("({} events skipped)", n)).dim());
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

fn print_event(event: &ReviewEvent) {
    let prefix = format!("[feature {} #{}]", event.feature_id(), event.iteration());
    let line = event.describe();
    let styled = match event {
        ReviewEvent::Approved { .. } => console::style(line).green().bold(),
        ReviewEvent::Rejected { .. } => console::style(line).yellow(),
        ReviewEvent::Failed { .. } | ReviewEvent::MaxIterationsReached { .. } => {
            console::style(line).red().bold()
        }
        ReviewEvent::Progress { .. } => console::style(line).dim(),
        _ => console::style(line),
    };
    println!("{} {}", console::style(prefix).cyan(), styled);
}
