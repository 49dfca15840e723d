//! Review domain model: pull request identity and metadata, issues, and
//! the deduplication pass.

pub mod dedup;
pub mod issue;
pub mod types;

pub use dedup::dedup_issues;
pub use issue::{Issue, IssueCategory, IssueSeverity};
pub use types::{
    AnalysisResult, ChangedFile, FileStatus, PullRequestMetadata, PullRequestRef,
    PullRequestSummary, SOURCE_EXTENSIONS,
};
