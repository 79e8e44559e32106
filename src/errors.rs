//! Typed error hierarchy for the review loop.
//!
//! Collaborator failures have their own enums so the orchestrator can decide
//! whether a failure consumes an iteration attempt:
//! - `CommitError`: commit provider failures (before any iteration exists)
//! - `AgentError`: agent invocation failures (timeout, provider error)
//! - `ParseError`: reviewer output that cannot be turned into a decision
//!
//! `ReviewError` is what the orchestrator surfaces to its callers.

use std::time::Duration;

use thiserror::Error;

use crate::feature::{FeatureId, FeatureStatus};
use crate::store::StoreError;

/// Errors from the commit provider.
#[derive(Debug, Error)]
pub enum CommitError {
    #[error("Working tree has no changes to commit")]
    NoChanges,

    #[error("Commit timed out after {0:?}")]
    Timeout(Duration),

    #[error("Commit failed: {0}")]
    Io(#[source] anyhow::Error),
}

/// Errors from the agent invoker.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Agent call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Agent provider error: {0}")]
    Provider(String),
}

/// Errors from the review response parser.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Unparsable review response: {0}")]
    Unparsable(String),
}

/// Errors surfaced by the review orchestrator.
#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("Feature {0} not found")]
    FeatureNotFound(FeatureId),

    #[error("Concurrent modification of feature {feature_id}; reload and abort this attempt")]
    ConcurrencyConflict { feature_id: FeatureId },

    #[error("External call failed for feature {feature_id}: {message}")]
    ExternalCallFailure { feature_id: FeatureId, message: String },

    #[error("Unparsable review response for feature {feature_id}: {message}")]
    UnparsableResponse { feature_id: FeatureId, message: String },

    #[error(
        "Feature {feature_id} reached the review cap of {max_iterations} iterations; manual intervention required"
    )]
    IterationCapExceeded {
        feature_id: FeatureId,
        max_iterations: u32,
    },

    #[error("Feature {feature_id} is {status}, expected {expected}")]
    InvalidState {
        feature_id: FeatureId,
        status: FeatureStatus,
        expected: FeatureStatus,
    },

    #[error("Review of feature {0} was cancelled")]
    Cancelled(FeatureId),

    #[error("Store error: {0}")]
    StoreIo(#[source] anyhow::Error),
}

impl ReviewError {
    /// Map a store error for `feature_id` into the orchestrator taxonomy.
    pub(crate) fn from_store(feature_id: FeatureId, err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => Self::FeatureNotFound(id),
            StoreError::VersionConflict { .. } | StoreError::OutOfOrder { .. } => {
                Self::ConcurrencyConflict { feature_id }
            }
            StoreError::CapExceeded { max_iterations, .. } => Self::IterationCapExceeded {
                feature_id,
                max_iterations,
            },
            StoreError::Io(e) => Self::StoreIo(e),
        }
    }

    /// Whether the caller may retry from the last durable state.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ExternalCallFailure { .. } | Self::StoreIo(_) | Self::Cancelled(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_error_no_changes_is_matchable() {
        let err = CommitError::NoChanges;
        assert!(matches!(err, CommitError::NoChanges));
        assert!(err.to_string().contains("no changes"));
    }

    #[test]
    fn agent_error_timeout_carries_duration() {
        let err = AgentError::Timeout(Duration::from_secs(30));
        match &err {
            AgentError::Timeout(d) => assert_eq!(*d, Duration::from_secs(30)),
            _ => panic!("Expected Timeout"),
        }
        assert!(err.to_string().contains("30s"));
    }

    #[test]
    fn store_conflicts_map_to_concurrency_conflict() {
        let err = ReviewError::from_store(
            7,
            StoreError::VersionConflict {
                feature_id: 7,
                expected: 1,
                actual: 2,
            },
        );
        assert!(matches!(err, ReviewError::ConcurrencyConflict { feature_id: 7 }));

        let err = ReviewError::from_store(
            7,
            StoreError::OutOfOrder {
                feature_id: 7,
                expected: 3,
                actual: 2,
            },
        );
        assert!(matches!(err, ReviewError::ConcurrencyConflict { .. }));
    }

    #[test]
    fn store_not_found_maps_to_feature_not_found() {
        let err = ReviewError::from_store(3, StoreError::NotFound(3));
        assert!(matches!(err, ReviewError::FeatureNotFound(3)));
    }

    #[test]
    fn cap_exceeded_is_not_retryable() {
        let err = ReviewError::IterationCapExceeded {
            feature_id: 1,
            max_iterations: 3,
        };
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("manual intervention"));
    }

    #[test]
    fn external_failures_are_retryable() {
        let err = ReviewError::ExternalCallFailure {
            feature_id: 1,
            message: "no changes".into(),
        };
        assert!(err.is_retryable());
        assert!(!ReviewError::ConcurrencyConflict { feature_id: 1 }.is_retryable());
    }

    #[test]
    fn all_error_types_implement_std_error_trait() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&CommitError::NoChanges);
        assert_std_error(&AgentError::Provider("x".into()));
        assert_std_error(&ParseError::Unparsable("x".into()));
        assert_std_error(&ReviewError::Cancelled(1));
    }
}
