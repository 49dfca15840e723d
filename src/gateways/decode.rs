//! Resilient decoding of free-text inference output.
//!
//! Models are told to answer with bare JSON but routinely wrap it in
//! markdown fences or prose. Each decoder is a pure function with a
//! documented fallback: an analysis pass that cannot be parsed yields
//! exactly one medium-severity fallback issue instead of failing the
//! phase, and an unparseable summary falls back to a neutral score.

use crate::review::{Issue, IssueCategory, IssueSeverity};
use serde::Deserialize;
use tracing::warn;

/// Decoded payload of the diff-level analysis pass.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DiffAnalysis {
    #[serde(default)]
    pub issues: Vec<Issue>,
    #[serde(default)]
    pub positive_changes: Vec<String>,
    #[serde(default)]
    pub summary: String,
}

/// Decoded payload of a per-file analysis pass.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CodeAnalysis {
    #[serde(default)]
    pub issues: Vec<Issue>,
    #[serde(default)]
    pub summary: String,
}

#[derive(Debug, Deserialize)]
struct RawSummary {
    #[serde(default)]
    overall_score: Option<f64>,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    recommendations: Vec<String>,
}

/// Decoded payload of the summary pass, score clamped to 0–100.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryOutcome {
    pub overall_score: u8,
    pub summary: String,
    pub recommendations: Vec<String>,
}

impl Default for SummaryOutcome {
    fn default() -> Self {
        Self {
            overall_score: 50,
            summary: "Analysis completed. Review the identified issues for code quality assessment."
                .to_string(),
            recommendations: vec![
                "Review all identified issues".to_string(),
                "Add comprehensive tests".to_string(),
            ],
        }
    }
}

/// Locate the JSON object inside free text: strip a ```json or ``` fence
/// if present, otherwise slice from the first `{` to the last `}`.
/// Returns `None` when no object-shaped slice exists.
pub fn extract_json(text: &str) -> Option<String> {
    let mut candidate = text.trim();
    if let Some(start) = candidate.find("```json") {
        let rest = &candidate[start + 7..];
        candidate = match rest.find("```") {
            Some(end) => rest[..end].trim(),
            None => rest.trim(),
        };
    } else if let Some(start) = candidate.find("```") {
        let rest = &candidate[start + 3..];
        candidate = match rest.find("```") {
            Some(end) => rest[..end].trim(),
            None => rest.trim(),
        };
    }
    if candidate.starts_with('{') && candidate.ends_with('}') {
        return Some(candidate.to_string());
    }
    let open = candidate.find('{')?;
    let close = candidate.rfind('}')?;
    if close > open {
        Some(candidate[open..=close].to_string())
    } else {
        None
    }
}

/// The single issue synthesized when analysis output cannot be parsed.
pub fn fallback_issue() -> Issue {
    Issue::new(IssueSeverity::Medium, "Analysis parsing error")
        .with_category(IssueCategory::Other)
        .with_description("Could not parse detailed analysis results")
        .with_suggestion("Review manually")
}

fn parse<T: for<'de> Deserialize<'de>>(text: &str, pass: &str) -> Option<T> {
    let json = match extract_json(text) {
        Some(json) => json,
        None => {
            warn!(pass, "no JSON object found in inference output");
            return None;
        }
    };
    match serde_json::from_str(&json) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(pass, %err, "failed to parse inference output");
            None
        }
    }
}

/// Decode diff-level analysis output. Fallback: one synthetic issue,
/// no positive changes.
pub fn decode_diff_analysis(text: &str) -> DiffAnalysis {
    parse(text, "analyze-diff").unwrap_or_else(|| DiffAnalysis {
        issues: vec![fallback_issue()],
        positive_changes: Vec::new(),
        summary: "Analysis completed but results could not be parsed".to_string(),
    })
}

/// Decode per-file analysis output. Fallback: one synthetic issue.
pub fn decode_code_analysis(text: &str) -> CodeAnalysis {
    parse(text, "analyze-files").unwrap_or_else(|| CodeAnalysis {
        issues: vec![fallback_issue()],
        summary: "Analysis completed but results could not be parsed".to_string(),
    })
}

/// Decode summary output, clamping the score into 0–100. Missing or
/// non-numeric scores become 50; unparseable output falls back to the
/// neutral default outcome.
pub fn decode_summary(text: &str) -> SummaryOutcome {
    let Some(raw) = parse::<RawSummary>(text, "summarize") else {
        return SummaryOutcome::default();
    };
    let overall_score = raw
        .overall_score
        .map(|score| score.clamp(0.0, 100.0).round() as u8)
        .unwrap_or(50);
    SummaryOutcome {
        overall_score,
        summary: raw.summary,
        recommendations: raw.recommendations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_plain_json() {
        assert_eq!(
            extract_json(r#"{"issues": []}"#).as_deref(),
            Some(r#"{"issues": []}"#)
        );
    }

    #[test]
    fn extract_from_json_fence() {
        let text = "Here you go:\n```json\n{\"issues\": []}\n```\nHope that helps!";
        assert_eq!(extract_json(text).as_deref(), Some("{\"issues\": []}"));
    }

    #[test]
    fn extract_from_bare_fence() {
        let text = "```\n{\"summary\": \"ok\"}\n```";
        assert_eq!(extract_json(text).as_deref(), Some("{\"summary\": \"ok\"}"));
    }

    #[test]
    fn extract_from_unterminated_fence() {
        let text = "```json\n{\"issues\": []}";
        assert_eq!(extract_json(text).as_deref(), Some("{\"issues\": []}"));
    }

    #[test]
    fn extract_brace_slice_from_prose() {
        let text = "The analysis found: {\"issues\": []} — as requested.";
        assert_eq!(extract_json(text).as_deref(), Some("{\"issues\": []}"));
    }

    #[test]
    fn extract_returns_none_without_object() {
        assert!(extract_json("no json here at all").is_none());
        assert!(extract_json("").is_none());
        assert!(extract_json("} backwards {").is_none());
    }

    #[test]
    fn decode_diff_analysis_happy_path() {
        let text = r#"{
            "issues": [{"severity": "high", "category": "bug", "title": "Off-by-one", "description": "loop bound", "file_path": "src/a.rs"}],
            "positive_changes": ["Added tests"],
            "summary": "Mostly fine"
        }"#;
        let analysis = decode_diff_analysis(text);
        assert_eq!(analysis.issues.len(), 1);
        assert_eq!(analysis.issues[0].severity, IssueSeverity::High);
        assert_eq!(analysis.positive_changes, vec!["Added tests"]);
        assert_eq!(analysis.summary, "Mostly fine");
    }

    #[test]
    fn malformed_output_yields_exactly_one_fallback_issue() {
        let analysis = decode_diff_analysis("I'm sorry, I cannot produce JSON today.");
        assert_eq!(analysis.issues.len(), 1);
        let issue = &analysis.issues[0];
        assert_eq!(issue.severity, IssueSeverity::Medium);
        assert_eq!(issue.category, IssueCategory::Other);
        assert!(issue.suggestion.as_deref().unwrap().contains("manually"));
    }

    #[test]
    fn code_analysis_fallback_matches_diff_fallback() {
        let analysis = decode_code_analysis("not json");
        assert_eq!(analysis.issues.len(), 1);
        assert_eq!(analysis.issues[0].severity, IssueSeverity::Medium);
        assert_eq!(analysis.issues[0].category, IssueCategory::Other);
    }

    #[test]
    fn decode_summary_clamps_score() {
        let high = decode_summary(r#"{"overall_score": 150, "summary": "s", "recommendations": []}"#);
        assert_eq!(high.overall_score, 100);
        let low = decode_summary(r#"{"overall_score": -3, "summary": "s", "recommendations": []}"#);
        assert_eq!(low.overall_score, 0);
    }

    #[test]
    fn decode_summary_defaults_missing_score_to_50() {
        let outcome = decode_summary(r#"{"summary": "fine", "recommendations": ["Add tests"]}"#);
        assert_eq!(outcome.overall_score, 50);
        assert_eq!(outcome.summary, "fine");
    }

    #[test]
    fn decode_summary_falls_back_on_garbage() {
        let outcome = decode_summary("garbage response");
        assert_eq!(outcome.overall_score, 50);
        assert!(!outcome.recommendations.is_empty());
    }

    #[test]
    fn decode_diff_tolerates_empty_payload() {
        let analysis = decode_diff_analysis("{}");
        assert!(analysis.issues.is_empty());
        assert!(analysis.summary.is_empty());
    }
}
