//! AI-gated review loop for feature work.
//!
//! A feature moves `backlog → in_progress → code_review → <forward status>`.
//! Every completed implementation is committed and reviewed; a rejection
//! sends it back with the accumulated findings until it is approved or the
//! iteration cap halts automation.

pub mod agent;
pub mod config;
pub mod errors;
pub mod events;
pub mod feature;
pub mod init;
pub mod logging;
pub mod orchestrator;
pub mod pipeline;
pub mod review;
pub mod store;
pub mod tracker;

pub use errors::ReviewError;
pub use feature::{Feature, FeatureId, FeatureStatus};
pub use orchestrator::ReviewOrchestrator;
