//! Issue types produced by the analysis phases.
//!
//! An [`Issue`] is a single finding surfaced by either the diff-level or the
//! per-file inference pass. Issues deserialize directly from inference
//! output, so every field beyond severity and title is defaulted — a model
//! that omits a description must not fail the decode.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of an issue, ordered from most to least critical.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    /// Must be fixed before merging.
    Critical,
    /// Significant defect or risk.
    High,
    /// Should be addressed.
    #[default]
    Medium,
    /// Minor improvement.
    Low,
}

impl IssueSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    /// Critical and high findings block a clean review.
    pub fn is_blocking(&self) -> bool {
        matches!(self, Self::Critical | Self::High)
    }
}

impl fmt::Display for IssueSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Category of an issue. Unknown categories from inference output fold
/// into `Other`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueCategory {
    Bug,
    Style,
    Performance,
    Security,
    BestPractice,
    #[default]
    #[serde(other)]
    Other,
}

impl IssueCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bug => "bug",
            Self::Style => "style",
            Self::Performance => "performance",
            Self::Security => "security",
            Self::BestPractice => "best-practice",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for IssueCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single finding from an analysis phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    #[serde(default)]
    pub severity: IssueSeverity,
    #[serde(default)]
    pub category: IssueCategory,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// File the issue refers to. Per-file analysis attaches this after
    /// decoding, since the model only sees one file at a time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    /// Line number (1-based) when the model could pin one down.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_snippet: Option<String>,
}

impl Issue {
    pub fn new(severity: IssueSeverity, title: impl Into<String>) -> Self {
        Self {
            severity,
            category: IssueCategory::default(),
            title: title.into(),
            description: String::new(),
            file_path: None,
            line_number: None,
            suggestion: None,
            code_snippet: None,
        }
    }

    pub fn with_category(mut self, category: IssueCategory) -> Self {
        self.category = category;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_file_path(mut self, file_path: impl Into<String>) -> Self {
        self.file_path = Some(file_path.into());
        self
    }

    pub fn with_line_number(mut self, line: u32) -> Self {
        self.line_number = Some(line);
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Key used for deduplication across analysis phases.
    pub fn dedup_key(&self) -> (&str, Option<&str>) {
        (self.title.as_str(), self.file_path.as_deref())
    }

    /// `file:line`, `file`, or empty depending on available context.
    pub fn location(&self) -> String {
        match (&self.file_path, self.line_number) {
            (Some(file), Some(line)) => format!("{}:{}", file, line),
            (Some(file), None) => file.clone(),
            _ => String::new(),
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}/{}] {}", self.severity, self.category, self.title)?;
        let location = self.location();
        if !location.is_empty() {
            write!(f, " ({})", location)?;
        }
        Ok(())
    }
}
