//! Feature records: the unit of work moving through the pipeline.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::review::ReviewSpec;

/// Stable, unique feature identifier (SQLite rowid).
pub type FeatureId = i64;

/// Pipeline status of a feature.
///
/// `CodeReview` always sits between `InProgress` and whatever forward status
/// the pipeline configuration resolves after an approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureStatus {
    Backlog,
    InProgress,
    CodeReview,
    WaitingApproval,
    Verified,
    Completed,
}

impl FeatureStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Backlog => "backlog",
            Self::InProgress => "in_progress",
            Self::CodeReview => "code_review",
            Self::WaitingApproval => "waiting_approval",
            Self::Verified => "verified",
            Self::Completed => "completed",
        }
    }

    /// Statuses a feature may move to once its review is approved.
    pub fn is_forward(&self) -> bool {
        matches!(
            self,
            Self::WaitingApproval | Self::Verified | Self::Completed
        )
    }
}

impl fmt::Display for FeatureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeatureStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "backlog" => Ok(Self::Backlog),
            "in_progress" => Ok(Self::InProgress),
            "code_review" => Ok(Self::CodeReview),
            "waiting_approval" => Ok(Self::WaitingApproval),
            "verified" => Ok(Self::Verified),
            "completed" => Ok(Self::Completed),
            _ => Err(format!("Invalid feature status: {}", s)),
        }
    }
}

/// A trackable unit of implementation work.
///
/// `version` is the concurrency token checked by
/// [`ReviewStore::save_feature`](crate::store::ReviewStore::save_feature).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub id: FeatureId,
    pub title: String,
    pub description: String,
    pub status: FeatureStatus,
    /// Absent until the feature first enters review.
    pub review: Option<ReviewSpec>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Feature {
    /// Number of completed review iterations (0 before the first review).
    pub fn current_iteration(&self) -> u32 {
        self.review
            .as_ref()
            .map(|r| r.current_iteration())
            .unwrap_or(0)
    }

    /// Whether automation has stopped for this feature and needs a human.
    pub fn is_halted(&self) -> bool {
        self.review.as_ref().is_some_and(|r| r.is_halted())
    }
}
