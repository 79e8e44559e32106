//! Version-control integration.

pub mod git;

pub use git::{GitCommitProvider, GitTracker};
