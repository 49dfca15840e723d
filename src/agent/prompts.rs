//! Prompt construction for the three inference passes.
//!
//! Pure functions; the agent owns when they are called. The prompts demand
//! JSON-only responses, but decoding never trusts that — see
//! [`crate::gateways::decode`].

use crate::review::{Issue, PullRequestMetadata};

/// Diff text beyond this many bytes is truncated to avoid token overflow.
pub const MAX_DIFF_CHARS: usize = 15_000;

/// At most this many issues are listed in the summary prompt.
pub const MAX_SUMMARY_ISSUES: usize = 20;

pub const DIFF_SYSTEM_PROMPT: &str = r#"You are an expert code reviewer analyzing a pull request diff.
Focus on the changes being made (lines starting with + or -).
Identify issues in the NEW code (lines with +) and improvements over OLD code (lines with -).

IMPORTANT: You MUST respond with ONLY valid JSON, no other text. The JSON must have this exact structure:
{
  "issues": [
    {
      "severity": "critical|high|medium|low",
      "category": "bug|style|performance|security|best-practice",
      "title": "Brief title",
      "description": "Detailed description",
      "file_path": "path/to/file",
      "suggestion": "How to fix it"
    }
  ],
  "positive_changes": ["List of good changes"],
  "summary": "Overall assessment of the changes"
}

Return empty arrays if no issues or positive changes found."#;

pub const CODE_SYSTEM_PROMPT: &str = r#"You are an expert code reviewer. Analyze the provided code and identify issues.

IMPORTANT: You MUST respond with ONLY valid JSON, no other text. The JSON must have this exact structure:
{
  "issues": [
    {
      "severity": "critical|high|medium|low",
      "category": "bug|style|performance|security|best-practice",
      "title": "Brief title",
      "description": "Detailed description",
      "line_number": null,
      "suggestion": "How to fix it"
    }
  ],
  "summary": "Overall assessment"
}

Return empty issues array if no issues found."#;

pub const SUMMARY_SYSTEM_PROMPT: &str = r#"You are an expert code reviewer providing executive summary and recommendations.
Based on the identified issues and PR context, provide:
1. Overall code quality score (0-100)
2. Executive summary
3. Key recommendations

IMPORTANT: You MUST respond with ONLY valid JSON, no other text. The JSON must have this exact structure:
{
  "overall_score": 85,
  "summary": "The PR introduces...",
  "recommendations": ["Fix critical security issue", "Add tests"]
}"#;

/// Truncate to at most `max` bytes without splitting a UTF-8 character.
fn truncate_chars(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// User prompt for the diff-level pass.
pub fn diff_prompt(diff: &str, metadata: &PullRequestMetadata) -> String {
    format!(
        "PR Title: {}\nPR Description: {}\nFiles Changed: {}\nAdditions: {}\nDeletions: {}\n\nDiff:\n{}\n\nAnalyze the changes. Respond with ONLY the JSON object, nothing else.",
        metadata.title,
        metadata.description,
        metadata.files_changed,
        metadata.additions,
        metadata.deletions,
        truncate_chars(diff, MAX_DIFF_CHARS),
    )
}

/// User prompt for the per-file pass; `code` is the file's added lines.
pub fn code_prompt(code: &str, file_path: &str, context: &str) -> String {
    let context_line = if context.is_empty() {
        String::new()
    } else {
        format!("Context: {}\n", context)
    };
    format!(
        "Analyze this code from {}.\n{}\nCode:\n{}\n\nRespond with ONLY the JSON object, nothing else.",
        file_path, context_line, code,
    )
}

/// User prompt for the summary pass.
pub fn summary_prompt(issues: &[Issue], metadata: &PullRequestMetadata) -> String {
    let issues_block = if issues.is_empty() {
        "No issues found".to_string()
    } else {
        issues
            .iter()
            .take(MAX_SUMMARY_ISSUES)
            .map(|issue| format!("- [{}] {}", issue.severity, issue.title))
            .collect::<Vec<_>>()
            .join("\n")
    };
    format!(
        "PR: {}\nFiles Changed: {}\nIssues Found: {}\n\nIssues:\n{}\n\nProvide overall assessment. Respond with ONLY the JSON object, nothing else.",
        metadata.title,
        metadata.files_changed,
        issues.len(),
        issues_block,
    )
}
