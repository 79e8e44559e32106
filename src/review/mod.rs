//! Review model and pure review logic.
//!
//! ## Components
//!
//! - [`findings`]: `Finding` with category and severity
//! - [`iteration`]: `Iteration` records and the append-only `IterationHistory`
//! - [`spec`]: per-feature `ReviewSpec` (status, cap, pending slot)
//! - [`parser`]: `ReviewParser` contract and the JSON implementation
//! - [`context`]: `ContextBuilder` for review and fix prompts
//! - [`detail`]: markdown detail documents
//!
//! ## Example
//!
//! ```
//! use forge_review::review::{JsonReviewParser, ReviewParser, Decision};
//!
//! let raw = r#"{"decision": "rejected", "summary": "Missing tests",
//!     "findings": [{"category": "test", "severity": "error",
//!                   "title": "No tests", "description": "Nothing covers login()"}]}"#;
//! let parsed = JsonReviewParser.parse_review_decision(raw).unwrap();
//! assert_eq!(parsed.decision, Decision::Rejected);
//! assert_eq!(parsed.findings.len(), 1);
//! ```

pub mod context;
pub mod detail;
pub mod findings;
pub mod iteration;
pub mod parser;
pub mod spec;

pub use context::ContextBuilder;
pub use detail::{DetailDocument, attempt_location, detail_location, render_detail};
pub use findings::{Finding, FindingCategory, FindingSeverity, by_severity};
pub use iteration::{Decision, Iteration, IterationHistory};
pub use parser::{JsonReviewParser, ParsedReview, ReviewParser};
pub use spec::{
    CommitBase, CommitInfo, DEFAULT_MAX_ITERATIONS, PendingReview, ReviewHistory, ReviewSpec,
    ReviewStatus,
};
