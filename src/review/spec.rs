//! Per-feature review state: status, cap, and the iteration history.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::iteration::{Iteration, IterationHistory};
use crate::feature::{Feature, FeatureId, FeatureStatus};

/// Cap used when the configuration does not set one.
pub const DEFAULT_MAX_ITERATIONS: u32 = 3;

/// Overall review status of a feature.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    #[default]
    Pending,
    Reviewing,
    Approved,
    Rejected,
    /// Terminal for automation: the cap was reached without approval.
    Failed,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Reviewing => "reviewing",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReviewStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "reviewing" => Ok(Self::Reviewing),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid review status: {}", s)),
        }
    }
}

/// Commit produced for a review slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub hash: String,
    pub diff: String,
}

/// Repository HEAD observed before a slot's commit was attempted.
///
/// `head` is `None` on an unborn branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitBase {
    pub head: Option<String>,
}

/// An opened but not yet appended iteration slot.
///
/// Written by the claiming save at the start of a review phase and cleared by
/// the append that fills it. A slot that already carries a commit is reused
/// by the next phase instead of committing again. A slot whose commit failed
/// keeps its `base`, so a commit that landed after the failure is found by
/// the retry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingReview {
    pub iteration: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<CommitInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<CommitBase>,
    pub claimed_at: DateTime<Utc>,
}

/// Review state owned by exactly one [`Feature`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewSpec {
    pub status: ReviewStatus,
    max_iterations: u32,
    iterations: IterationHistory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending: Option<PendingReview>,
}

impl ReviewSpec {
    pub fn new(max_iterations: u32) -> Self {
        Self {
            status: ReviewStatus::Pending,
            max_iterations,
            iterations: IterationHistory::new(),
            pending: None,
        }
    }

    /// Reassemble a spec from persisted parts.
    pub fn from_parts(
        status: ReviewStatus,
        max_iterations: u32,
        iterations: IterationHistory,
        pending: Option<PendingReview>,
    ) -> Self {
        Self {
            status,
            max_iterations,
            iterations,
            pending,
        }
    }

    /// Completed iterations. Always equal to the history length.
    pub fn current_iteration(&self) -> u32 {
        self.iterations.len() as u32
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    pub fn iterations(&self) -> &IterationHistory {
        &self.iterations
    }

    pub fn latest(&self) -> Option<&Iteration> {
        self.iterations.latest()
    }

    pub fn next_iteration(&self) -> u32 {
        self.iterations.next_number()
    }

    pub fn at_cap(&self) -> bool {
        self.current_iteration() >= self.max_iterations
    }

    pub fn remaining(&self) -> u32 {
        self.max_iterations.saturating_sub(self.current_iteration())
    }

    /// Automation must not re-enter review until this is cleared externally.
    pub fn is_halted(&self) -> bool {
        self.status == ReviewStatus::Failed
    }
}

/// Read-only projection of a feature's review state for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewHistory {
    pub feature_id: FeatureId,
    pub title: String,
    pub feature_status: FeatureStatus,
    pub review_status: Option<ReviewStatus>,
    pub current_iteration: u32,
    pub max_iterations: Option<u32>,
    pub iterations: Vec<Iteration>,
}

impl From<&Feature> for ReviewHistory {
    fn from(feature: &Feature) -> Self {
        let review = feature.review.as_ref();
        Self {
            feature_id: feature.id,
            title: feature.title.clone(),
            feature_status: feature.status,
            review_status: review.map(|r| r.status),
            current_iteration: feature.current_iteration(),
            max_iterations: review.map(|r| r.max_iterations()),
            iterations: review
                .map(|r| r.iterations().as_slice().to_vec())
                .unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::review::iteration::Decision;

    fn iteration(number: u32) -> Iteration {
        Iteration::builder(number, Decision::Rejected)
            .commit(format!("c{}", number), "diff")
            .build()
    }

    #[test]
    fn test_new_spec_is_pending_and_empty() {
        let spec = ReviewSpec::new(DEFAULT_MAX_ITERATIONS);
        assert_eq!(spec.status, ReviewStatus::Pending);
        assert_eq!(spec.current_iteration(), 0);
        assert_eq!(spec.next_iteration(), 1);
        assert_eq!(spec.remaining(), 3);
        assert!(!spec.at_cap());
        assert!(!spec.is_halted());
    }

    #[test]
    fn test_current_iteration_tracks_history() {
        let history = IterationHistory::try_from(vec![iteration(1), iteration(2), iteration(3)])
            .unwrap();
        let spec = ReviewSpec::from_parts(ReviewStatus::Failed, 3, history, None);
        assert_eq!(spec.current_iteration(), 3);
        assert!(spec.at_cap());
        assert_eq!(spec.remaining(), 0);
        assert!(spec.is_halted());
        assert_eq!(spec.latest().unwrap().commit(), "c3");
    }

    #[test]
    fn test_review_status_round_trip() {
        for s in ["pending", "reviewing", "approved", "rejected", "failed"] {
            assert_eq!(ReviewStatus::from_str(s).unwrap().as_str(), s);
        }
        assert!(ReviewStatus::from_str("done").is_err());
    }

    #[test]
    fn test_pending_review_json_omits_missing_commit() {
        let pending = PendingReview {
            iteration: 1,
            commit: None,
            base: None,
            claimed_at: Utc::now(),
        };
        let json = serde_json::to_string(&pending).unwrap();
        assert!(!json.contains("commit"));
        assert!(!json.contains("base"));
        let back: PendingReview = serde_json::from_str(&json).unwrap();
        assert_eq!(back, pending);
    }

    #[test]
    fn test_pending_review_keeps_unborn_base() {
        let pending = PendingReview {
            iteration: 2,
            commit: None,
            base: Some(CommitBase { head: None }),
            claimed_at: Utc::now(),
        };
        let json = serde_json::to_string(&pending).unwrap();
        let back: PendingReview = serde_json::from_str(&json).unwrap();
        assert_eq!(back.base, Some(CommitBase { head: None }));
    }
}
