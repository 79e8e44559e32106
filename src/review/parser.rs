//! Turning reviewer free text into a structured decision.
//!
//! The reviewer is asked (see [`ContextBuilder::review_context`]) to answer
//! with a JSON object. [`JsonReviewParser`] accepts that object bare, inside a
//! ```` ```json ```` fence, or embedded in surrounding prose.
//!
//! [`ContextBuilder::review_context`]: crate::review::context::ContextBuilder::review_context

use serde_json::Value;

use super::findings::{Finding, FindingCategory, FindingSeverity};
use super::iteration::Decision;
use crate::errors::ParseError;

/// Structured result of one review response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedReview {
    pub decision: Decision,
    pub findings: Vec<Finding>,
    pub summary: String,
    pub rationale: Option<String>,
}

/// Isolates the parsing strategy from orchestration.
pub trait ReviewParser: Send + Sync {
    fn parse_review_decision(&self, raw: &str) -> Result<ParsedReview, ParseError>;
}

/// Parser for the JSON response format requested in the review prompt.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonReviewParser;

impl ReviewParser for JsonReviewParser {
    fn parse_review_decision(&self, raw: &str) -> Result<ParsedReview, ParseError> {
        let value = find_verdict(raw)?;

        let decision_str = value
            .get("decision")
            .or_else(|| value.get("verdict"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| ParseError::Unparsable("missing \"decision\" field".to_string()))?;
        let decision = parse_decision(decision_str).ok_or_else(|| {
            ParseError::Unparsable(format!("unknown decision \"{}\"", decision_str))
        })?;

        let summary = value
            .get("summary")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .trim()
            .to_string();

        let rationale = value
            .get("rationale")
            .or_else(|| value.get("reason"))
            .and_then(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let findings = value
            .get("findings")
            .and_then(|v| v.as_array())
            .map(|items| items.iter().filter_map(parse_finding).collect())
            .unwrap_or_default();

        Ok(ParsedReview {
            decision,
            findings,
            summary,
            rationale,
        })
    }
}

/// A reviewer can only approve or reject; `failed` is reserved for reviews
/// that produced no verdict.
fn parse_decision(s: &str) -> Option<Decision> {
    match s.trim().to_lowercase().as_str() {
        "approved" | "approve" | "pass" | "accept" | "accepted" => Some(Decision::Approved),
        "rejected" | "reject" | "fail" | "changes_requested" | "changes_required" => {
            Some(Decision::Rejected)
        }
        _ => None,
    }
}

/// Parse a single finding. Entries without any text are dropped.
fn parse_finding(value: &Value) -> Option<Finding> {
    let text = |key: &str| {
        value
            .get(key)
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    };

    let description = text("description").or_else(|| text("issue"));
    let title = text("title").or(description)?;
    let description = description.unwrap_or(title);

    let severity = text("severity")
        .and_then(|s| s.parse::<FindingSeverity>().ok())
        .unwrap_or_default();
    let category = text("category")
        .and_then(|s| s.parse::<FindingCategory>().ok())
        .unwrap_or_default();

    let mut finding = Finding::new(category, severity, title, description);

    if let Some(suggestion) = text("suggestion").or_else(|| text("fix")) {
        finding = finding.with_suggestion(suggestion);
    }
    if let Some(file) = text("file") {
        finding = finding.with_file(file);
    }
    if let Some(line) = value.get("line").and_then(|v| v.as_u64()) {
        finding = finding.with_line(line as u32);
    }

    Some(finding)
}

/// Pick the first JSON object in `raw` that carries a `decision` or
/// `verdict` key.
///
/// Objects inside ```` ```json ```` fences are tried first, then every
/// balanced `{...}` in the text in order of appearance. Code blocks and
/// braces in prose are skipped rather than failing the whole response.
fn find_verdict(raw: &str) -> Result<Value, ParseError> {
    let mut saw_object = false;
    let mut first_error = None;

    for candidate in json_candidates(raw) {
        match serde_json::from_str::<Value>(candidate) {
            Ok(value) if value.get("decision").is_some() || value.get("verdict").is_some() => {
                return Ok(value);
            }
            Ok(value) => saw_object |= value.is_object(),
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }

    Err(ParseError::Unparsable(match (saw_object, first_error) {
        (true, _) => "missing \"decision\" field".to_string(),
        (false, Some(e)) => format!("invalid JSON: {}", e),
        (false, None) => "no JSON object in response".to_string(),
    }))
}

/// Candidate object texts in the order they should be tried.
fn json_candidates(output: &str) -> Vec<&str> {
    let mut candidates: Vec<&str> = output
        .split("```")
        .skip(1)
        .step_by(2)
        .filter_map(|block| block.strip_prefix("json"))
        .flat_map(balanced_objects)
        .collect();
    candidates.extend(balanced_objects(output));
    candidates
}

/// Every balanced `{...}` span, one per opening brace.
fn balanced_objects(text: &str) -> Vec<&str> {
    text.char_indices()
        .filter(|&(_, c)| c == '{')
        .filter_map(|(start, _)| {
            matching_brace(&text[start..]).map(|end| &text[start..start + end + 1])
        })
        .collect()
}

/// Byte offset of the brace closing the one at the start of `s`, ignoring
/// braces inside JSON strings.
fn matching_brace(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Result<ParsedReview, ParseError> {
        JsonReviewParser.parse_review_decision(raw)
    }

    // =========================================
    // candidate extraction tests
    // =========================================

    #[test]
    fn test_candidates_prefer_json_fence() {
        let text = "Example: {\"a\": 1}\n```json\n{\"decision\": \"approved\"}\n```\nthanks";
        let candidates = json_candidates(text);
        assert_eq!(candidates[0], "{\"decision\": \"approved\"}");
        assert!(candidates.contains(&"{\"a\": 1}"));
    }

    #[test]
    fn test_candidates_ignore_braces_in_strings() {
        let text = r#"Verdict follows {"summary": "uses {} formatting", "decision": "rejected"} done"#;
        let candidates = json_candidates(text);
        assert!(candidates[0].ends_with("\"rejected\"}"));
    }

    #[test]
    fn test_candidates_include_nested_objects() {
        let candidates = balanced_objects(r#"{"x": {"y": 1}}"#);
        assert_eq!(candidates, vec![r#"{"x": {"y": 1}}"#, r#"{"y": 1}"#]);
    }

    #[test]
    fn test_candidates_none() {
        assert!(json_candidates("LGTM!").is_empty());
        assert!(json_candidates("{ unterminated").is_empty());
    }

    // =========================================
    // JsonReviewParser tests
    // =========================================

    #[test]
    fn test_parse_approved() {
        let parsed = parse(r#"{"decision": "approved", "summary": "Looks good", "findings": []}"#)
            .unwrap();
        assert_eq!(parsed.decision, Decision::Approved);
        assert_eq!(parsed.summary, "Looks good");
        assert!(parsed.findings.is_empty());
        assert!(parsed.rationale.is_none());
    }

    #[test]
    fn test_parse_rejected_with_findings() {
        let raw = r#"
```json
{
  "decision": "rejected",
  "summary": "Two blocking problems",
  "rationale": "Error paths are untested",
  "findings": [
    {"category": "test", "severity": "error", "title": "No error test",
     "description": "parse() failure path is not covered", "file": "src/lib.rs", "line": 10,
     "suggestion": "Add a test"},
    {"category": "code", "severity": "warning", "title": "Clone in loop",
     "description": "Needless clone"}
  ]
}
```"#;
        let parsed = parse(raw).unwrap();
        assert_eq!(parsed.decision, Decision::Rejected);
        assert_eq!(parsed.rationale.as_deref(), Some("Error paths are untested"));
        assert_eq!(parsed.findings.len(), 2);
        let first = &parsed.findings[0];
        assert_eq!(first.category(), FindingCategory::Test);
        assert_eq!(first.severity(), FindingSeverity::Error);
        assert_eq!(first.location().as_deref(), Some("src/lib.rs:10"));
        assert_eq!(first.suggestion(), Some("Add a test"));
    }

    #[test]
    fn test_parse_verdict_alias_and_issue_field() {
        let raw = r#"{"verdict": "FAIL", "findings": [{"severity": "high", "issue": "SQL injection"}]}"#;
        let parsed = parse(raw).unwrap();
        assert_eq!(parsed.decision, Decision::Rejected);
        let f = &parsed.findings[0];
        assert_eq!(f.title(), "SQL injection");
        assert_eq!(f.description(), "SQL injection");
        assert_eq!(f.severity(), FindingSeverity::Error);
        assert_eq!(f.category(), FindingCategory::Code);
    }

    #[test]
    fn test_parse_drops_empty_findings() {
        let raw = r#"{"decision": "rejected", "findings": [{"severity": "error"}, "junk"]}"#;
        let parsed = parse(raw).unwrap();
        assert!(parsed.findings.is_empty());
    }

    #[test]
    fn test_parse_missing_decision_is_unparsable() {
        let err = parse(r#"{"summary": "ok"}"#).unwrap_err();
        assert!(err.to_string().contains("decision"));
    }

    #[test]
    fn test_parse_reviewer_cannot_claim_failed() {
        assert!(parse(r#"{"decision": "failed"}"#).is_err());
    }

    #[test]
    fn test_parse_skips_braces_in_prose() {
        let raw = "The new `format!(\"{}\")` call looks right.\n\n\
                   {\"decision\": \"approved\", \"summary\": \"ok\", \"findings\": []}";
        let parsed = parse(raw).unwrap();
        assert_eq!(parsed.decision, Decision::Approved);
        assert_eq!(parsed.summary, "ok");
    }

    #[test]
    fn test_parse_skips_code_fence_before_verdict() {
        let raw = "Consider this:\n```rust\nfn f() { let x = 1; }\n```\n\
                   {\"decision\": \"rejected\", \"rationale\": \"x is unused\"}";
        let parsed = parse(raw).unwrap();
        assert_eq!(parsed.decision, Decision::Rejected);
        assert_eq!(parsed.rationale.as_deref(), Some("x is unused"));
    }

    #[test]
    fn test_parse_verdict_outside_generic_fence() {
        let raw = "```\n{\"config\": true}\n```\n{\"verdict\": \"pass\"}";
        assert_eq!(parse(raw).unwrap().decision, Decision::Approved);
    }

    #[test]
    fn test_parse_invalid_json_reports_error() {
        let err = parse("{ not json }").unwrap_err();
        assert!(err.to_string().contains("invalid JSON"));
    }

    #[test]
    fn test_parse_prose_is_unparsable() {
        assert!(matches!(
            parse("I think this is fine."),
            Err(ParseError::Unparsable(_))
        ));
    }
}
