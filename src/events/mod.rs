//! Lifecycle events for external observers.
//!
//! Publishing is fire-and-forget. The store stays the source of truth, so a
//! dropped or unobserved event never affects review state.

pub mod bus;

use serde::{Deserialize, Serialize};

use crate::feature::{FeatureId, FeatureStatus};
use crate::review::Decision;

pub use bus::{BroadcastNotifier, NullPublisher};

// ── Event types ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ReviewEvent {
    Started {
        feature_id: FeatureId,
        iteration: u32,
    },
    Progress {
        feature_id: FeatureId,
        iteration: u32,
        phase: String,
        message: String,
    },
    Completed {
        feature_id: FeatureId,
        iteration: u32,
        decision: Decision,
        findings_count: usize,
    },
    Approved {
        feature_id: FeatureId,
        iteration: u32,
        next_status: FeatureStatus,
    },
    Rejected {
        feature_id: FeatureId,
        iteration: u32,
        findings_count: usize,
        rationale: Option<String>,
    },
    Failed {
        feature_id: FeatureId,
        iteration: u32,
        reason: String,
    },
    MaxIterationsReached {
        feature_id: FeatureId,
        iteration: u32,
        max_iterations: u32,
    },
}

impl ReviewEvent {
    pub fn progress(
        feature_id: FeatureId,
        iteration: u32,
        phase: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Progress {
            feature_id,
            iteration,
            phase: phase.into(),
            message: message.into(),
        }
    }

    pub fn feature_id(&self) -> FeatureId {
        match self {
            Self::Started { feature_id, .. }
            | Self::Progress { feature_id, .. }
            | Self::Completed { feature_id, .. }
            | Self::Approved { feature_id, .. }
            | Self::Rejected { feature_id, .. }
            | Self::Failed { feature_id, .. }
            | Self::MaxIterationsReached { feature_id, .. } => *feature_id,
        }
    }

    pub fn iteration(&self) -> u32 {
        match self {
            Self::Started { iteration, .. }
            | Self::Progress { iteration, .. }
            | Self::Completed { iteration, .. }
            | Self::Approved { iteration, .. }
            | Self::Rejected { iteration, .. }
            | Self::Failed { iteration, .. }
            | Self::MaxIterationsReached { iteration, .. } => *iteration,
        }
    }

    /// Wire name of the event.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Started { .. } => "started",
            Self::Progress { .. } => "progress",
            Self::Completed { .. } => "completed",
            Self::Approved { .. } => "approved",
            Self::Rejected { .. } => "rejected",
            Self::Failed { .. } => "failed",
            Self::MaxIterationsReached { .. } => "max-iterations-reached",
        }
    }

    /// One-line human summary, used by the CLI.
    pub fn describe(&self) -> String {
        match self {
            Self::Started { iteration, .. } => format!("review iteration {} started", iteration),
            Self::Progress { phase, message, .. } => format!("{}: {}", phase, message),
            Self::Completed {
                decision,
                findings_count,
                ..
            } => format!("review {} with {} finding(s)", decision, findings_count),
            Self::Approved { next_status, .. } => format!("approved, moving to {}", next_status),
            Self::Rejected {
                findings_count,
                rationale,
                ..
            } => match rationale {
                Some(r) => format!("rejected ({} finding(s)): {}", findings_count, r),
                None => format!("rejected ({} finding(s))", findings_count),
            },
            Self::Failed { reason, .. } => format!("review failed: {}", reason),
            Self::MaxIterationsReached { max_iterations, .. } => format!(
                "reached {} iterations without approval; manual intervention required",
                max_iterations
            ),
        }
    }
}

/// Publish interface owned by the orchestrator.
///
/// Implementations must not block and must not fail the caller.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: ReviewEvent);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_names() {
        let e = ReviewEvent::MaxIterationsReached {
            feature_id: 1,
            iteration: 3,
            max_iterations: 3,
        };
        assert_eq!(e.event_type(), "max-iterations-reached");
        assert_eq!(e.feature_id(), 1);
        assert_eq!(e.iteration(), 3);
        assert_eq!(ReviewEvent::progress(1, 1, "commit", "ok").event_type(), "progress");
    }

    #[test]
    fn test_event_serializes_tagged() {
        let e = ReviewEvent::Approved {
            feature_id: 7,
            iteration: 2,
            next_status: FeatureStatus::Verified,
        };
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["type"], "approved");
        assert_eq!(json["data"]["feature_id"], 7);
        assert_eq!(json["data"]["next_status"], "verified");

        let back: ReviewEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, e);
    }

    #[test]
    fn test_describe_rejected_includes_rationale() {
        let e = ReviewEvent::Rejected {
            feature_id: 1,
            iteration: 1,
            findings_count: 2,
            rationale: Some("missing tests".into()),
        };
        assert_eq!(e.describe(), "rejected (2 finding(s)): missing tests");
    }
}
