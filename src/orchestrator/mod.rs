//! Review orchestration: drives a feature through commit, review and
//! decision, and back to implementation until it is approved or halted.
//!
//! The orchestrator holds no lock across an external call. Each phase
//! captures the feature by value, calls out, and reconciles through the
//! store's compare-and-swap, so two racing phases for the same feature
//! resolve to one winner and one `ConcurrencyConflict`.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use forge_review::orchestrator::{ReviewOrchestrator, OrchestratorSettings};
//! use forge_review::agent::ClaudeAgent;
//! use forge_review::events::BroadcastNotifier;
//! use forge_review::pipeline::ConfiguredPipeline;
//! use forge_review::store::SqliteStore;
//! use forge_review::tracker::GitCommitProvider;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let store = Arc::new(SqliteStore::open(".forge/review.db".as_ref())?);
//! let orchestrator = ReviewOrchestrator::new(
//!     store,
//!     Arc::new(GitCommitProvider),
//!     Arc::new(ClaudeAgent::default()),
//!     Arc::new(ConfiguredPipeline::default()),
//!     Arc::new(BroadcastNotifier::default()),
//! )
//! .with_settings(OrchestratorSettings::default());
//!
//! let feature = orchestrator.intake("Login", "OAuth login flow").await?;
//! let report = orchestrator.drive(feature.id).await?;
//! println!("finished with {:?}", report.outcome);
//! # Ok(())
//! # }
//! ```

pub mod runner;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::errors::{AgentError, CommitError};
use crate::events::EventPublisher;
use crate::feature::{Feature, FeatureId, FeatureStatus};
use crate::review::{CommitInfo, DEFAULT_MAX_ITERATIONS, JsonReviewParser, ReviewParser};
use crate::store::ReviewStore;

pub use runner::{Outcome, PhaseReport, Recovery};

// ── Collaborators ────────────────────────────────────────────────────

/// Version control: stage everything, commit, and return hash + diff.
#[async_trait]
pub trait CommitProvider: Send + Sync {
    async fn commit_and_diff(&self, workdir: &Path, message: &str)
    -> Result<CommitInfo, CommitError>;

    /// Current HEAD commit, `None` on an unborn branch.
    async fn head(&self, workdir: &Path) -> Result<Option<String>, CommitError>;

    /// HEAD with the diff from `base` to it, or `None` while HEAD is still
    /// `base`.
    async fn changes_since(
        &self,
        workdir: &Path,
        base: Option<&str>,
    ) -> Result<Option<CommitInfo>, CommitError>;
}

/// AI agent invocation. Prompt in, free text out.
#[async_trait]
pub trait AgentInvoker: Send + Sync {
    async fn review(&self, context: &str) -> Result<String, AgentError>;

    async fn implement(&self, context: &str) -> Result<String, AgentError>;

    /// Model/provider identity recorded on each iteration.
    fn identity(&self) -> String;
}

/// Resolves where an approved feature goes next.
pub trait PipelineResolver: Send + Sync {
    fn next_status_after_approval(&self, feature: &Feature) -> FeatureStatus;
}

// ── Settings ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Cap applied to features entering review for the first time.
    pub max_iterations: u32,
    pub review_timeout: Duration,
    pub implement_timeout: Duration,
    pub commit_timeout: Duration,
    /// Repository the commit provider operates on.
    pub workdir: PathBuf,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            review_timeout: Duration::from_secs(600),
            implement_timeout: Duration::from_secs(1800),
            commit_timeout: Duration::from_secs(60),
            workdir: PathBuf::from("."),
        }
    }
}

// ── Orchestrator ─────────────────────────────────────────────────────

pub struct ReviewOrchestrator {
    store: Arc<dyn ReviewStore>,
    commits: Arc<dyn CommitProvider>,
    agent: Arc<dyn AgentInvoker>,
    parser: Arc<dyn ReviewParser>,
    pipeline: Arc<dyn PipelineResolver>,
    events: Arc<dyn EventPublisher>,
    settings: OrchestratorSettings,
    cancelled: Mutex<HashSet<FeatureId>>,
    in_flight: Mutex<HashSet<FeatureId>>,
}

impl ReviewOrchestrator {
    pub fn new(
        store: Arc<dyn ReviewStore>,
        commits: Arc<dyn CommitProvider>,
        agent: Arc<dyn AgentInvoker>,
        pipeline: Arc<dyn PipelineResolver>,
        events: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            store,
            commits,
            agent,
            parser: Arc::new(JsonReviewParser),
            pipeline,
            events,
            settings: OrchestratorSettings::default(),
            cancelled: Mutex::new(HashSet::new()),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn with_settings(mut self, settings: OrchestratorSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_parser(mut self, parser: Arc<dyn ReviewParser>) -> Self {
        self.parser = parser;
        self
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<dyn ReviewStore> {
        &self.store
    }

    /// Request cancellation of `feature_id`'s current or next phase.
    ///
    /// Observed at the next phase boundary, where the claim is released and
    /// the phase returns `Cancelled`. A request is consumed once observed.
    pub fn cancel(&self, feature_id: FeatureId) {
        with_set(&self.cancelled, |set| {
            set.insert(feature_id);
        });
    }

    pub fn is_cancel_requested(&self, feature_id: FeatureId) -> bool {
        with_set(&self.cancelled, |set| set.contains(&feature_id))
    }

    fn take_cancel(&self, feature_id: FeatureId) -> bool {
        with_set(&self.cancelled, |set| set.remove(&feature_id))
    }

    pub fn is_in_flight(&self, feature_id: FeatureId) -> bool {
        with_set(&self.in_flight, |set| set.contains(&feature_id))
    }

    fn track(&self, feature_id: FeatureId) -> InFlight<'_> {
        with_set(&self.in_flight, |set| {
            set.insert(feature_id);
        });
        InFlight {
            set: &self.in_flight,
            feature_id,
        }
    }
}

fn with_set<R>(set: &Mutex<HashSet<FeatureId>>, f: impl FnOnce(&mut HashSet<FeatureId>) -> R) -> R {
    match set.lock() {
        Ok(mut guard) => f(&mut guard),
        Err(poisoned) => f(&mut poisoned.into_inner()),
    }
}

/// Marks a phase as running in this process until dropped.
struct InFlight<'a> {
    set: &'a Mutex<HashSet<FeatureId>>,
    feature_id: FeatureId,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        with_set(self.set, |set| {
            set.remove(&self.feature_id);
        });
    }
}
