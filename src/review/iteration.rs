//! Iteration records: one completed review pass each.
//!
//! An [`Iteration`] has no setters. Once it is appended to an
//! [`IterationHistory`] it can only be read; corrections take a new
//! iteration.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::findings::{Finding, FindingSeverity};

/// The reviewer's verdict for one iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approved,
    Rejected,
    /// The review itself could not produce a verdict (timeout, provider
    /// error, unparsable output). Counts against the cap like a rejection.
    Failed,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Failed => "failed",
        }
    }

    pub fn is_approved(&self) -> bool {
        matches!(self, Self::Approved)
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Decision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid decision: {}", s)),
        }
    }
}

/// One completed review pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Iteration {
    number: u32,
    completed_at: DateTime<Utc>,
    reviewer: String,
    decision: Decision,
    commit: String,
    diff: String,
    #[serde(default)]
    findings: Vec<Finding>,
    #[serde(default)]
    summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rationale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    detail_ref: Option<String>,
}

impl Iteration {
    /// Start building iteration `number` (1-based).
    pub fn builder(number: u32, decision: Decision) -> IterationBuilder {
        IterationBuilder {
            inner: Iteration {
                number,
                completed_at: Utc::now(),
                reviewer: String::new(),
                decision,
                commit: String::new(),
                diff: String::new(),
                findings: Vec::new(),
                summary: String::new(),
                rationale: None,
                detail_ref: None,
            },
        }
    }

    /// Attach the detail document location. Only possible on an owned,
    /// not-yet-appended iteration.
    pub fn with_detail_ref(mut self, detail_ref: impl Into<String>) -> Self {
        self.detail_ref = Some(detail_ref.into());
        self
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }

    pub fn reviewer(&self) -> &str {
        &self.reviewer
    }

    pub fn decision(&self) -> Decision {
        self.decision
    }

    pub fn commit(&self) -> &str {
        &self.commit
    }

    pub fn diff(&self) -> &str {
        &self.diff
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn rationale(&self) -> Option<&str> {
        self.rationale.as_deref()
    }

    pub fn detail_ref(&self) -> Option<&str> {
        self.detail_ref.as_deref()
    }

    pub fn count_by_severity(&self, severity: FindingSeverity) -> usize {
        self.findings
            .iter()
            .filter(|f| f.severity() == severity)
            .count()
    }
}

/// Builder for [`Iteration`].
#[derive(Debug, Clone)]
pub struct IterationBuilder {
    inner: Iteration,
}

impl IterationBuilder {
    pub fn completed_at(mut self, at: DateTime<Utc>) -> Self {
        self.inner.completed_at = at;
        self
    }

    pub fn reviewer(mut self, reviewer: impl Into<String>) -> Self {
        self.inner.reviewer = reviewer.into();
        self
    }

    pub fn commit(mut self, commit: impl Into<String>, diff: impl Into<String>) -> Self {
        self.inner.commit = commit.into();
        self.inner.diff = diff.into();
        self
    }

    pub fn findings(mut self, findings: Vec<Finding>) -> Self {
        self.inner.findings = findings;
        self
    }

    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.inner.summary = summary.into();
        self
    }

    pub fn rationale(mut self, rationale: Option<String>) -> Self {
        self.inner.rationale = rationale;
        self
    }

    pub fn build(self) -> Iteration {
        self.inner
    }
}

/// Append-only, ordered sequence of iterations.
///
/// `history[i].number() == i + 1` holds for every element; there is no way to
/// replace or remove an element once it has been appended.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Iteration>", into = "Vec<Iteration>")]
pub struct IterationHistory {
    records: Vec<Iteration>,
}

impl IterationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number the next appended iteration must carry.
    pub fn next_number(&self) -> u32 {
        self.records.len() as u32 + 1
    }

    /// Append `iteration`, which must be numbered `len() + 1`.
    pub fn append(&mut self, iteration: Iteration) -> Result<(), OutOfSequence> {
        let expected = self.next_number();
        if iteration.number != expected {
            return Err(OutOfSequence {
                expected,
                actual: iteration.number,
            });
        }
        self.records.push(iteration);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, number: u32) -> Option<&Iteration> {
        number
            .checked_sub(1)
            .and_then(|idx| self.records.get(idx as usize))
    }

    pub fn latest(&self) -> Option<&Iteration> {
        self.records.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Iteration> {
        self.records.iter()
    }

    pub fn as_slice(&self) -> &[Iteration] {
        &self.records
    }
}

impl<'a> IntoIterator for &'a IterationHistory {
    type Item = &'a Iteration;
    type IntoIter = std::slice::Iter<'a, Iteration>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

impl TryFrom<Vec<Iteration>> for IterationHistory {
    type Error = OutOfSequence;

    fn try_from(records: Vec<Iteration>) -> Result<Self, Self::Error> {
        let mut history = Self::new();
        for record in records {
            history.append(record)?;
        }
        Ok(history)
    }
}

impl From<IterationHistory> for Vec<Iteration> {
    fn from(history: IterationHistory) -> Self {
        history.records
    }
}

/// An iteration carried a number other than the next one in sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("iteration {actual} out of sequence, expected {expected}")]
pub struct OutOfSequence {
    pub expected: u32,
    pub actual: u32,
}
