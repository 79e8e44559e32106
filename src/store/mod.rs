//! Durable review state.
//!
//! The store is the single source of truth: events are best-effort, and an
//! observer that missed one can always re-query the store.
//!
//! Two guards make orchestrator phases safe to retry:
//! - [`ReviewStore::save_feature`] is a compare-and-swap on `Feature::version`
//! - [`ReviewStore::append_iteration`] only accepts the next iteration number
//!
//! Iteration history is only ever changed through `append_iteration`;
//! `save_feature` does not touch it.

pub mod db;

use async_trait::async_trait;
use thiserror::Error;

use crate::feature::{Feature, FeatureId};
use crate::review::{DetailDocument, Iteration};

pub use db::{DbHandle, ReviewDb, SqliteStore};

/// Errors from a [`ReviewStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Feature {0} not found")]
    NotFound(FeatureId),

    #[error("Version conflict on feature {feature_id}: expected {expected}, found {actual}")]
    VersionConflict {
        feature_id: FeatureId,
        expected: u64,
        actual: u64,
    },

    #[error("Out-of-order append on feature {feature_id}: next iteration is {expected}, got {actual}")]
    OutOfOrder {
        feature_id: FeatureId,
        expected: u32,
        actual: u32,
    },

    #[error("Feature {feature_id} already has {max_iterations} iterations")]
    CapExceeded {
        feature_id: FeatureId,
        max_iterations: u32,
    },

    #[error("Store I/O error: {0}")]
    Io(#[from] anyhow::Error),
}

/// Persistence contract consumed by the orchestrator.
#[async_trait]
pub trait ReviewStore: Send + Sync {
    /// Create a feature in `backlog` with no review spec.
    async fn create_feature(&self, title: &str, description: &str) -> Result<Feature, StoreError>;

    async fn list_features(&self) -> Result<Vec<Feature>, StoreError>;

    async fn load_feature(&self, id: FeatureId) -> Result<Feature, StoreError>;

    /// Atomically replace the feature's status and review header if its
    /// stored version equals `expected_version`. Returns the new version.
    async fn save_feature(&self, feature: &Feature, expected_version: u64)
    -> Result<u64, StoreError>;

    /// Append `iteration` if `expected_number == current_iteration + 1`.
    ///
    /// Clears the pending slot and bumps the feature version in the same
    /// transaction. Returns the new version.
    async fn append_iteration(
        &self,
        feature_id: FeatureId,
        iteration: Iteration,
        expected_number: u32,
    ) -> Result<u64, StoreError>;

    /// Store the long-form record of an iteration. Returns its location.
    async fn persist_iteration_detail(
        &self,
        feature_id: FeatureId,
        iteration_number: u32,
        document: &str,
    ) -> Result<String, StoreError>;

    /// All persisted detail documents for a feature, oldest first.
    async fn load_iteration_details(
        &self,
        feature_id: FeatureId,
    ) -> Result<Vec<DetailDocument>, StoreError>;

    /// Store the output of the implementation attempt that iteration
    /// `iteration_number` reviews. Returns its location.
    async fn persist_attempt_output(
        &self,
        feature_id: FeatureId,
        iteration_number: u32,
        output: &str,
    ) -> Result<String, StoreError>;

    /// Recorded implementation outputs for a feature, oldest first.
    async fn load_attempt_outputs(
        &self,
        feature_id: FeatureId,
    ) -> Result<Vec<DetailDocument>, StoreError>;
}
