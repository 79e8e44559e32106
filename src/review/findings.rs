//! Review findings: single reviewer observations within an iteration.
//!
//! ## Example
//!
//! ```
//! use forge_review::review::findings::{Finding, FindingCategory, FindingSeverity};
//!
//! let finding = Finding::new(
//!     FindingCategory::Code,
//!     FindingSeverity::Error,
//!     "Unchecked index",
//!     "`items[0]` panics on an empty slice",
//! )
//! .with_file("src/lib.rs")
//! .with_line(42)
//! .with_suggestion("Use `items.first()`");
//!
//! assert_eq!(finding.location().as_deref(), Some("src/lib.rs:42"));
//! assert!(finding.is_critical());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Severity level for individual findings.
///
/// Ordered from most to least critical, so sorting a finding list by
/// severity puts errors first.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord,
)]
#[serde(rename_all = "lowercase")]
pub enum FindingSeverity {
    /// Blocks approval.
    Error,
    #[default]
    Warning,
    Info,
}

impl FindingSeverity {
    pub fn is_critical(&self) -> bool {
        matches!(self, Self::Error)
    }

    /// Heading used when findings are grouped by severity in prompts.
    pub fn heading(&self) -> &'static str {
        match self {
            Self::Error => "Errors",
            Self::Warning => "Warnings",
            Self::Info => "Info",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Self::Error => "🔴",
            Self::Warning => "🟡",
            Self::Info => "🔵",
        }
    }
}

impl fmt::Display for FindingSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for FindingSeverity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "error" | "critical" | "high" => Ok(Self::Error),
            "warning" | "warn" | "medium" => Ok(Self::Warning),
            "info" | "note" | "low" => Ok(Self::Info),
            _ => Err(format!("Invalid finding severity: {}", s)),
        }
    }
}

/// What area of the change a finding is about.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingCategory {
    /// Does the change do what the feature description asks for.
    Compliance,
    #[default]
    Code,
    Test,
    Architecture,
    Performance,
}

impl FindingCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compliance => "compliance",
            Self::Code => "code",
            Self::Test => "test",
            Self::Architecture => "architecture",
            Self::Performance => "performance",
        }
    }
}

impl fmt::Display for FindingCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FindingCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "compliance" | "spec" => Ok(Self::Compliance),
            "code" | "quality" => Ok(Self::Code),
            "test" | "tests" | "testing" => Ok(Self::Test),
            "architecture" | "design" => Ok(Self::Architecture),
            "performance" | "perf" => Ok(Self::Performance),
            _ => Err(format!("Invalid finding category: {}", s)),
        }
    }
}

/// A single reviewer observation.
///
/// Findings have no identity beyond their position in the owning iteration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    category: FindingCategory,
    severity: FindingSeverity,
    title: String,
    description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    suggestion: Option<String>,
    /// Relative to the project root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    file: Option<String>,
    /// 1-based.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    line: Option<u32>,
}

impl Finding {
    pub fn new(
        category: FindingCategory,
        severity: FindingSeverity,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            category,
            severity,
            title: title.into(),
            description: description.into(),
            suggestion: None,
            file: None,
            line: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn with_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    /// `file:line`, `file`, or `None` for change-wide findings.
    pub fn location(&self) -> Option<String> {
        match (&self.file, self.line) {
            (Some(file), Some(line)) => Some(format!("{}:{}", file, line)),
            (Some(file), None) => Some(file.clone()),
            _ => None,
        }
    }

    pub fn is_critical(&self) -> bool {
        self.severity.is_critical()
    }

    pub fn category(&self) -> FindingCategory {
        self.category
    }

    pub fn severity(&self) -> FindingSeverity {
        self.severity
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn suggestion(&self) -> Option<&str> {
        self.suggestion.as_deref()
    }

    pub fn file(&self) -> Option<&str> {
        self.file.as_deref()
    }

    pub fn line(&self) -> Option<u32> {
        self.line
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}/{}] {}: {}",
            self.severity, self.category, self.title, self.description
        )?;
        if let Some(location) = self.location() {
            write!(f, " ({})", location)?;
        }
        if let Some(ref suggestion) = self.suggestion {
            write!(f, " (suggestion: {})", suggestion)?;
        }
        Ok(())
    }
}

/// Findings ordered errors, then warnings, then info.
///
/// The sort is stable, so findings of equal severity keep the reviewer's order.
pub fn by_severity(findings: &[Finding]) -> Vec<&Finding> {
    let mut ordered: Vec<&Finding> = findings.iter().collect();
    ordered.sort_by_key(|f| f.severity());
    ordered
}
