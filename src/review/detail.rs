//! Long-form, human-readable record of one iteration.

use serde::{Deserialize, Serialize};

use super::findings::by_severity;
use super::iteration::Iteration;
use crate::feature::FeatureId;

/// A persisted detail document and where it lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailDocument {
    pub iteration: u32,
    /// Store-specific reference recorded on the iteration.
    pub location: String,
    pub body: String,
}

/// Canonical location of an iteration's detail document.
pub fn detail_location(feature_id: FeatureId, iteration: u32) -> String {
    format!("feature/{}/iteration/{}", feature_id, iteration)
}

/// Location of the implementation output reviewed by `iteration`.
pub fn attempt_location(feature_id: FeatureId, iteration: u32) -> String {
    format!("{}/implementation", detail_location(feature_id, iteration))
}

/// Render the markdown record: decision, summary, findings, full diff.
pub fn render_detail(feature_id: FeatureId, title: &str, iteration: &Iteration) -> String {
    let summary = if iteration.summary().is_empty() {
        "_No summary._"
    } else {
        iteration.summary()
    };

    let rationale_section = iteration
        .rationale()
        .map(|r| format!("## Rationale\n\n{}\n\n", r))
        .unwrap_or_default();

    let findings_list = by_severity(iteration.findings())
        .iter()
        .enumerate()
        .map(|(idx, finding)| {
            let suggestion = finding
                .suggestion()
                .map(|s| format!("\n   Suggestion: {}", s))
                .unwrap_or_default();
            format!(
                "{}. {} **{}** [{}] {}\n   {}{}\n",
                idx + 1,
                finding.severity().emoji(),
                finding.title(),
                finding.category(),
                finding.location().unwrap_or_default(),
                finding.description(),
                suggestion
            )
        })
        .collect::<String>();

    format!(
        r#"# Review: {title} (feature {feature_id}, iteration {number})

- Decision: **{decision}**
- Reviewer: {reviewer}
- Commit: `{commit}`
- Completed: {completed}

## Summary

{summary}

{rationale_section}## Findings ({count})

{findings_list}
## Diff

```diff
{diff}
```
"#,
        number = iteration.number(),
        decision = iteration.decision(),
        reviewer = iteration.reviewer(),
        commit = iteration.commit(),
        completed = iteration.completed_at().to_rfc3339(),
        count = iteration.findings().len(),
        diff = iteration.diff().trim_end(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::review::findings::{Finding, FindingCategory, FindingSeverity};
    use crate::review::iteration::Decision;

    #[test]
    fn test_detail_location_format() {
        assert_eq!(detail_location(4, 2), "feature/4/iteration/2");
        assert_eq!(attempt_location(4, 2), "feature/4/iteration/2/implementation");
    }

    #[test]
    fn test_render_detail_contains_all_parts() {
        let it = Iteration::builder(1, Decision::Rejected)
            .reviewer("claude")
            .commit("abc123", "+added line")
            .findings(vec![
                Finding::new(FindingCategory::Code, FindingSeverity::Info, "nit", "style"),
                Finding::new(FindingCategory::Test, FindingSeverity::Error, "missing", "no test")
                    .with_file("src/a.rs")
                    .with_suggestion("write one"),
            ])
            .summary("Not ready")
            .rationale(Some("missing tests".into()))
            .build();

        let doc = render_detail(9, "Login", &it);
        assert!(doc.starts_with("# Review: Login (feature 9, iteration 1)"));
        assert!(doc.contains("Decision: **rejected**"));
        assert!(doc.contains("## Rationale\n\nmissing tests"));
        assert!(doc.contains("## Findings (2)"));
        assert!(doc.contains("+added line"));
        // errors are listed before info
        assert!(doc.find("**missing**").unwrap() < doc.find("**nit**").unwrap());
    }
}
