//! Forward-status resolution after an approved review.
//!
//! ```toml
//! [pipeline]
//! after_approval = "waiting_approval"
//!
//! [[pipeline.overrides]]
//! pattern = "docs*"
//! status = "completed"
//! ```

use serde::{Deserialize, Serialize};

use crate::feature::{Feature, FeatureStatus};
use crate::orchestrator::PipelineResolver;

/// Route features whose title matches `pattern` to `status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineOverride {
    pub pattern: String,
    pub status: FeatureStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfiguredPipeline {
    #[serde(default = "default_after_approval")]
    pub after_approval: FeatureStatus,
    /// Checked in order; the first match wins.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub overrides: Vec<PipelineOverride>,
}

fn default_after_approval() -> FeatureStatus {
    FeatureStatus::WaitingApproval
}

impl Default for ConfiguredPipeline {
    fn default() -> Self {
        Self {
            after_approval: default_after_approval(),
            overrides: Vec::new(),
        }
    }
}

impl ConfiguredPipeline {
    pub fn new(after_approval: FeatureStatus) -> Self {
        Self {
            after_approval,
            overrides: Vec::new(),
        }
    }

    pub fn with_override(mut self, pattern: impl Into<String>, status: FeatureStatus) -> Self {
        self.overrides.push(PipelineOverride {
            pattern: pattern.into(),
            status,
        });
        self
    }

    /// Every configured target that is not a forward status.
    pub fn invalid_targets(&self) -> Vec<FeatureStatus> {
        std::iter::once(self.after_approval)
            .chain(self.overrides.iter().map(|o| o.status))
            .filter(|s| !s.is_forward())
            .collect()
    }
}

impl PipelineResolver for ConfiguredPipeline {
    fn next_status_after_approval(&self, feature: &Feature) -> FeatureStatus {
        self.overrides
            .iter()
            .find(|o| pattern_matches(&o.pattern, &feature.title))
            .map(|o| o.status)
            .unwrap_or(self.after_approval)
    }
}

/// Case-insensitive glob match (`*` and `?`).
pub fn pattern_matches(pattern: &str, name: &str) -> bool {
    let pattern: Vec<char> = pattern.to_lowercase().chars().collect();
    let name: Vec<char> = name.to_lowercase().chars().collect();
    glob_match(&pattern, &name)
}

fn glob_match(pattern: &[char], text: &[char]) -> bool {
    match pattern.split_first() {
        None => text.is_empty(),
        Some(('*', rest)) => {
            // Collapse runs of stars.
            let rest = match rest.iter().position(|&c| c != '*') {
                Some(idx) => &rest[idx..],
                None => return true,
            };
            (0..=text.len()).any(|i| glob_match(rest, &text[i..]))
        }
        Some(('?', rest)) => !text.is_empty() && glob_match(rest, &text[1..]),
        Some((c, rest)) => text.first() == Some(c) && glob_match(rest, &text[1..]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn feature(title: &str) -> Feature {
        Feature {
            id: 1,
            title: title.to_string(),
            description: String::new(),
            status: FeatureStatus::CodeReview,
            review: None,
            version: 1,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_glob_matching() {
        assert!(pattern_matches("*", "anything"));
        assert!(pattern_matches("docs*", "Docs: update README"));
        assert!(pattern_matches("*api*", "Public API cleanup"));
        assert!(pattern_matches("fix-?", "fix-1"));
        assert!(!pattern_matches("fix-?", "fix-12"));
        assert!(!pattern_matches("docs*", "api docs"));
        assert!(pattern_matches("**x", "x"));
        assert!(pattern_matches("caf*", "café ünïcode"));
    }

    #[test]
    fn test_default_resolves_waiting_approval() {
        let p = ConfiguredPipeline::default();
        assert_eq!(
            p.next_status_after_approval(&feature("Login")),
            FeatureStatus::WaitingApproval
        );
    }

    #[test]
    fn test_first_matching_override_wins() {
        let p = ConfiguredPipeline::new(FeatureStatus::Verified)
            .with_override("docs*", FeatureStatus::Completed)
            .with_override("*", FeatureStatus::WaitingApproval);
        assert_eq!(
            p.next_status_after_approval(&feature("Docs pass")),
            FeatureStatus::Completed
        );
        assert_eq!(
            p.next_status_after_approval(&feature("Login")),
            FeatureStatus::WaitingApproval
        );
    }

    #[test]
    fn test_invalid_targets() {
        let p = ConfiguredPipeline::new(FeatureStatus::CodeReview)
            .with_override("x", FeatureStatus::Backlog)
            .with_override("y", FeatureStatus::Completed);
        assert_eq!(
            p.invalid_targets(),
            vec![FeatureStatus::CodeReview, FeatureStatus::Backlog]
        );
        assert!(ConfiguredPipeline::default().invalid_targets().is_empty());
    }
}
