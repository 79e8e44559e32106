//! Prompt context assembly for review and fix invocations.
//!
//! Everything here is a pure function of its inputs: no store, no network.
//! Findings are quoted verbatim so the reviewer of iteration N can check
//! every issue raised in iterations 1..N-1.

use super::detail::DetailDocument;
use super::findings::{Finding, FindingSeverity, by_severity};
use super::iteration::Iteration;
use super::spec::ReviewSpec;
use crate::feature::Feature;

/// Lines of an implementation attempt's output quoted in the fix context.
const OUTPUT_TAIL_LINES: usize = 40;

/// Builds the text handed to the agent for the next step.
#[derive(Debug, Clone, Copy)]
pub struct ContextBuilder<'a> {
    feature: &'a Feature,
    spec: Option<&'a ReviewSpec>,
    details: &'a [DetailDocument],
    attempts: &'a [DetailDocument],
}

impl<'a> ContextBuilder<'a> {
    pub fn new(feature: &'a Feature) -> Self {
        Self {
            feature,
            spec: feature.review.as_ref(),
            details: &[],
            attempts: &[],
        }
    }

    /// Use persisted detail documents for references to earlier attempts.
    pub fn with_details(mut self, details: &'a [DetailDocument]) -> Self {
        self.details = details;
        self
    }

    /// Use recorded implementation output, keyed by the iteration that
    /// reviewed it.
    pub fn with_attempt_outputs(mut self, attempts: &'a [DetailDocument]) -> Self {
        self.attempts = attempts;
        self
    }

    fn prior_iterations(&self) -> &'a [Iteration] {
        self.spec
            .map(|s| s.iterations().as_slice())
            .unwrap_or_default()
    }

    /// Context for reviewing `diff` of `commit`.
    ///
    /// Includes every previously completed iteration's summary and findings,
    /// oldest first.
    pub fn review_context(&self, commit: &str, diff: &str) -> String {
        let prior = self.prior_iterations();
        let iteration = prior.len() + 1;
        let progress = match self.spec.map(|s| s.max_iterations()) {
            Some(max) => format!("Review iteration {} of {}.", iteration, max),
            None => format!("Review iteration {}.", iteration),
        };

        let history_section = if prior.is_empty() {
            String::new()
        } else {
            format!(
                "## Previous Review Iterations\n\n\
                 Verify that every issue below has been addressed by this change.\n\n{}",
                prior.iter().map(iteration_summary).collect::<String>()
            )
        };

        format!(
            r#"# Code Review: {title}

{progress}

{feature_section}{history_section}## Change Under Review

Commit: `{commit}`

```diff
{diff}
```

{RESPONSE_FORMAT}"#,
            title = self.feature.title,
            feature_section = self.feature_section(),
            diff = diff.trim_end(),
        )
    }

    /// Context for the next implementation attempt.
    ///
    /// Before any review this is just the feature description; after a
    /// rejection it is [`fix_context`](Self::fix_context).
    pub fn implementation_context(&self) -> String {
        if !self.prior_iterations().is_empty() {
            return self.fix_context();
        }
        format!(
            "# Implement: {}\n\n{}Implement the feature above. Your work will be committed and reviewed.\n",
            self.feature.title,
            self.feature_section()
        )
    }

    /// Context for fixing the most recent rejected (or failed) review.
    ///
    /// The latest iteration's findings come grouped by severity, errors
    /// first. Findings from earlier iterations follow so fixes stay cumulative.
    pub fn fix_context(&self) -> String {
        let header = format!(
            "# Fix Review Findings: {}\n\n{}",
            self.feature.title,
            self.feature_section()
        );
        let Some((latest, earlier)) = self.prior_iterations().split_last() else {
            return header;
        };

        let summary = if latest.summary().is_empty() {
            String::new()
        } else {
            format!("Summary: {}\n\n", latest.summary())
        };
        let rationale = latest
            .rationale()
            .map(|r| format!("Rejection rationale: {}\n\n", r))
            .unwrap_or_default();

        let earlier_section = if earlier.is_empty() {
            String::new()
        } else {
            format!(
                "## Earlier Review Iterations\n\nThese must stay fixed.\n\n{}",
                earlier.iter().map(iteration_summary).collect::<String>()
            )
        };

        format!(
            r#"{header}## Latest Review (iteration {number}, {decision})

{summary}{rationale}{findings}## Previous Attempt

{attempt}
{earlier_section}Address every error and warning above, then finish. Your work will be reviewed again.
"#,
            number = latest.number(),
            decision = latest.decision(),
            findings = findings_by_severity(latest.findings()),
            attempt = self.attempt_section(latest),
        )
    }

    fn feature_section(&self) -> String {
        let description = self.feature.description.trim_end();
        if description.trim().is_empty() {
            format!("## Feature\n\nTitle: {}\n\n", self.feature.title)
        } else {
            format!(
                "## Feature\n\nTitle: {}\n\n{}\n\n",
                self.feature.title, description
            )
        }
    }

    /// What the previous attempt produced and where its records live.
    fn attempt_section(&self, latest: &'a Iteration) -> String {
        let mut lines = vec![format!("Reviewed commit: `{}`", latest.commit())];
        if let Some(location) = self.detail_location(latest) {
            lines.push(format!("Full review record: {}", location));
        }

        let output = self.attempts.iter().find(|a| a.iteration == latest.number());
        if let Some(output) = output {
            lines.push(format!("Implementation output: {}", output.location));
            let tail = output_tail(&output.body);
            if !tail.is_empty() {
                lines.push(format!(
                    "\nThe attempt ended with:\n\n```text\n{}\n```",
                    tail
                ));
            }
        }
        lines.join("\n") + "\n"
    }

    fn detail_location(&self, iteration: &'a Iteration) -> Option<&'a str> {
        self.details
            .iter()
            .find(|d| d.iteration == iteration.number())
            .map(|d| d.location.as_str())
            .or_else(|| iteration.detail_ref())
    }
}

/// Latest findings grouped under severity headings, errors first.
fn findings_by_severity(findings: &[Finding]) -> String {
    let ordered = by_severity(findings);
    if ordered.is_empty() {
        return "No individual findings were reported.\n\n".to_string();
    }

    [
        FindingSeverity::Error,
        FindingSeverity::Warning,
        FindingSeverity::Info,
    ]
    .into_iter()
    .filter_map(|severity| {
        let group = ordered
            .iter()
            .filter(|f| f.severity() == severity)
            .enumerate()
            .map(|(idx, f)| format_finding(idx + 1, f))
            .collect::<String>();
        (!group.is_empty()).then(|| format!("### {}\n\n{}\n", severity.heading(), group))
    })
    .collect()
}

fn iteration_summary(it: &Iteration) -> String {
    let summary = if it.summary().is_empty() {
        String::new()
    } else {
        format!("Summary: {}\n", it.summary())
    };
    let rationale = it
        .rationale()
        .map(|r| format!("Rationale: {}\n", r))
        .unwrap_or_default();
    let findings = it
        .findings()
        .iter()
        .enumerate()
        .map(|(idx, f)| format_finding(idx + 1, f))
        .collect::<String>();
    let spacer = if findings.is_empty() { "" } else { "\n" };

    format!(
        "### Iteration {} ({})\n\n{}{}\n{}{}",
        it.number(),
        it.decision(),
        summary,
        rationale,
        findings,
        spacer
    )
}

fn format_finding(idx: usize, finding: &Finding) -> String {
    let location = finding
        .location()
        .map(|l| format!(" (at {})", l))
        .unwrap_or_default();
    let suggestion = finding
        .suggestion()
        .map(|s| format!("   Suggested fix: {}\n", s))
        .unwrap_or_default();
    format!(
        "{}. [{}/{}] {}: {}{}\n{}",
        idx,
        finding.severity(),
        finding.category(),
        finding.title(),
        finding.description(),
        location,
        suggestion
    )
}

/// The last [`OUTPUT_TAIL_LINES`] lines of `output`.
fn output_tail(output: &str) -> String {
    let lines: Vec<&str> = output.trim_end().lines().collect();
    let start = lines.len().saturating_sub(OUTPUT_TAIL_LINES);
    lines[start..].join("\n")
}

const RESPONSE_FORMAT: &str = r#"## Output Format

Respond with a single JSON object:

```json
{
  "decision": "approved|rejected",
  "summary": "One or two sentences on the change",
  "rationale": "Why the change is rejected (omit when approved)",
  "findings": [
    {
      "category": "compliance|code|test|architecture|performance",
      "severity": "error|warning|info",
      "title": "Short title",
      "description": "What is wrong",
      "suggestion": "How to fix it",
      "file": "path/to/file.rs",
      "line": 42
    }
  ]
}
```

Reject the change if any error-severity finding remains.
"#;
