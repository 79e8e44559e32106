//! Project configuration for the review loop, read from `.forge/review.toml`.
//!
//! # Configuration File Format
//!
//! ```toml
//! [review]
//! max_iterations = 3
//! review_timeout_secs = 600
//! implement_timeout_secs = 1800
//! commit_timeout_secs = 60
//!
//! [agent]
//! claude_cmd = "claude"
//! model = "sonnet"
//! skip_permissions = true
//!
//! [pipeline]
//! after_approval = "waiting_approval"
//!
//! [[pipeline.overrides]]
//! pattern = "docs*"
//! status = "completed"
//!
//! [store]
//! db_path = "review.db"
//!
//! [events]
//! capacity = 256
//! ```
//!
//! `CLAUDE_CMD` is used when the file sets no command; `SKIP_PERMISSIONS`
//! overrides the file setting.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::agent::ClaudeAgent;
use crate::events::bus::DEFAULT_CHANNEL_CAPACITY;
use crate::orchestrator::OrchestratorSettings;
use crate::pipeline::ConfiguredPipeline;
use crate::review::DEFAULT_MAX_ITERATIONS;

/// Config file name inside [`FORGE_DIR`](crate::init::FORGE_DIR).
pub const CONFIG_FILE: &str = "review.toml";

/// Review loop limits and timeouts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewSection {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    #[serde(default = "default_review_timeout_secs")]
    pub review_timeout_secs: u64,
    #[serde(default = "default_implement_timeout_secs")]
    pub implement_timeout_secs: u64,
    #[serde(default = "default_commit_timeout_secs")]
    pub commit_timeout_secs: u64,
}

fn default_max_iterations() -> u32 {
    DEFAULT_MAX_ITERATIONS
}

fn default_review_timeout_secs() -> u64 {
    600
}

fn default_implement_timeout_secs() -> u64 {
    1800
}

fn default_commit_timeout_secs() -> u64 {
    60
}

impl Default for ReviewSection {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            review_timeout_secs: default_review_timeout_secs(),
            implement_timeout_secs: default_implement_timeout_secs(),
            commit_timeout_secs: default_commit_timeout_secs(),
        }
    }
}

/// Claude CLI settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claude_cmd: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default = "default_skip_permissions")]
    pub skip_permissions: bool,
}

fn default_skip_permissions() -> bool {
    true
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            claude_cmd: None,
            model: None,
            skip_permissions: default_skip_permissions(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSection {
    /// Database path, relative to the `.forge` directory unless absolute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventsSection {
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

fn default_capacity() -> usize {
    DEFAULT_CHANNEL_CAPACITY
}

impl Default for EventsSection {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
        }
    }
}

/// Root of `.forge/review.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewToml {
    #[serde(default)]
    pub review: ReviewSection,
    #[serde(default)]
    pub agent: AgentSection,
    #[serde(default)]
    pub pipeline: ConfiguredPipeline,
    #[serde(default)]
    pub store: StoreSection,
    #[serde(default)]
    pub events: EventsSection,
}

impl ReviewToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse review.toml")
    }

    /// Load `review.toml` from `forge_dir`, or defaults if it does not exist.
    pub fn load_or_default(forge_dir: &Path) -> Result<Self> {
        let config_path = forge_dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize review.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Reject settings the orchestrator cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.review.max_iterations == 0 {
            anyhow::bail!("review.max_iterations must be at least 1");
        }
        for (name, secs) in [
            ("review_timeout_secs", self.review.review_timeout_secs),
            ("implement_timeout_secs", self.review.implement_timeout_secs),
            ("commit_timeout_secs", self.review.commit_timeout_secs),
        ] {
            if secs == 0 {
                anyhow::bail!("review.{} must be greater than 0", name);
            }
        }
        let invalid = self.pipeline.invalid_targets();
        if !invalid.is_empty() {
            let names: Vec<&str> = invalid.iter().map(|s| s.as_str()).collect();
            anyhow::bail!(
                "pipeline targets must be waiting_approval, verified or completed; got {}",
                names.join(", ")
            );
        }
        if self.events.capacity == 0 {
            anyhow::bail!("events.capacity must be at least 1");
        }
        Ok(())
    }

    /// Get the Claude command, with fallback to environment variable.
    pub fn claude_cmd(&self) -> String {
        self.agent
            .claude_cmd
            .clone()
            .or_else(|| std::env::var("CLAUDE_CMD").ok())
            .unwrap_or_else(|| "claude".to_string())
    }

    /// Get skip_permissions, with fallback to environment variable.
    pub fn skip_permissions(&self) -> bool {
        // Environment variable can override file setting
        if let Ok(env_val) = std::env::var("SKIP_PERMISSIONS") {
            return env_val != "false";
        }
        self.agent.skip_permissions
    }

    pub fn db_path(&self, forge_dir: &Path) -> PathBuf {
        let configured = self.store.db_path.as_deref().unwrap_or("review.db");
        let path = Path::new(configured);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            forge_dir.join(path)
        }
    }

    pub fn orchestrator_settings(&self, project_dir: &Path) -> OrchestratorSettings {
        OrchestratorSettings {
            max_iterations: self.review.max_iterations,
            review_timeout: Duration::from_secs(self.review.review_timeout_secs),
            implement_timeout: Duration::from_secs(self.review.implement_timeout_secs),
            commit_timeout: Duration::from_secs(self.review.commit_timeout_secs),
            workdir: project_dir.to_path_buf(),
        }
    }

    pub fn agent(&self, project_dir: &Path) -> ClaudeAgent {
        ClaudeAgent::default()
            .with_claude_cmd(self.claude_cmd())
            .with_model(self.agent.model.clone())
            .with_skip_permissions(self.skip_permissions())
            .with_working_dir(project_dir)
    }
}
