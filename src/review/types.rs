//! Work-unit data model: pull request identity, metadata, changed files,
//! and the final analysis result.

use crate::errors::AgentError;
use crate::review::issue::Issue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// File extensions accepted by per-file analysis.
pub const SOURCE_EXTENSIONS: &[&str] = &[
    ".rs", ".py", ".js", ".ts", ".java", ".go", ".cpp", ".c",
];

/// Immutable identity of a pull request: `owner/name` plus number.
///
/// Used to derive fingerprint cache keys and as the deduplication scope,
/// so validation happens here, before any job is created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PullRequestRef {
    pub repo: String,
    pub number: u64,
}

impl PullRequestRef {
    /// Validate and build a reference. The repo must be exactly
    /// `owner/name` with non-empty segments and no whitespace; the number
    /// must be positive.
    pub fn parse(repo: &str, number: u64) -> Result<Self, AgentError> {
        let parts: Vec<&str> = repo.split('/').collect();
        let well_formed = parts.len() == 2
            && parts.iter().all(|p| !p.is_empty())
            && !repo.chars().any(char::is_whitespace);
        if !well_formed {
            return Err(AgentError::validation(format!(
                "repository must be in 'owner/name' format, got '{}'",
                repo
            )));
        }
        if number == 0 {
            return Err(AgentError::validation(
                "pull request number must be positive",
            ));
        }
        Ok(Self {
            repo: repo.to_string(),
            number,
        })
    }

    /// Stable string the fingerprint is derived from.
    pub fn fingerprint_source(&self) -> String {
        format!("{}:{}", self.repo, self.number)
    }
}

impl fmt::Display for PullRequestRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.repo, self.number)
    }
}

/// Pull request metadata, fetched once per job and read-only thereafter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PullRequestMetadata {
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub base_branch: String,
    #[serde(default)]
    pub head_branch: String,
    #[serde(default)]
    pub files_changed: u64,
    #[serde(default)]
    pub additions: u64,
    #[serde(default)]
    pub deletions: u64,
    #[serde(default)]
    pub commits: u64,
    #[serde(default)]
    pub mergeable: Option<bool>,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub url: String,
}

/// Status of a changed file. Unknown statuses from the API fold into
/// `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Added,
    Modified,
    Removed,
    Renamed,
    #[serde(other)]
    Other,
}

/// One file changed by the pull request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangedFile {
    pub filename: String,
    pub status: FileStatus,
    #[serde(default)]
    pub additions: u64,
    #[serde(default)]
    pub deletions: u64,
    #[serde(default)]
    pub changes: u64,
    /// Unified diff hunk text, absent for binary or very large files.
    #[serde(default)]
    pub patch: Option<String>,
    #[serde(default)]
    pub raw_url: Option<String>,
    #[serde(default)]
    pub blob_url: Option<String>,
}

impl ChangedFile {
    /// Whether the filename carries an accepted source-code extension.
    pub fn is_source_file(&self) -> bool {
        SOURCE_EXTENSIONS
            .iter()
            .any(|ext| self.filename.ends_with(ext))
    }

    /// Extract only the lines this change *adds*: lines starting with `+`
    /// excluding the `+++` file header. Returns an empty string when no
    /// patch is available.
    pub fn added_lines(&self) -> String {
        let Some(patch) = &self.patch else {
            return String::new();
        };
        patch
            .lines()
            .filter(|line| line.starts_with('+') && !line.starts_with("+++"))
            .map(|line| &line[1..])
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Condensed view of the pull request embedded in the final result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PullRequestSummary {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub files_changed: u64,
    #[serde(default)]
    pub additions: u64,
    #[serde(default)]
    pub deletions: u64,
    #[serde(default)]
    pub commits: u64,
}

impl From<&PullRequestMetadata> for PullRequestSummary {
    fn from(meta: &PullRequestMetadata) -> Self {
        Self {
            title: meta.title.clone(),
            description: meta.description.clone(),
            author: meta.author.clone(),
            files_changed: meta.files_changed,
            additions: meta.additions,
            deletions: meta.deletions,
            commits: meta.commits,
        }
    }
}

/// Final immutable outcome of one analysis. The only artifact persisted
/// to the cache and returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub pr_summary: PullRequestSummary,
    pub issues: Vec<Issue>,
    /// Overall code quality score, 0–100 inclusive.
    pub overall_score: u8,
    pub summary: String,
    pub recommendations: Vec<String>,
    /// Improvements the diff analysis called out, surfaced alongside the
    /// issues.
    #[serde(default)]
    pub positive_changes: Vec<String>,
    pub analyzed_at: DateTime<Utc>,
    pub processing_time_secs: f64,
    pub files_analyzed: u32,
}
