//! Adaptive phase planning.
//!
//! The plan is a pure function of pull request metadata: large PRs drop the
//! per-file pass to bound worst-case latency and inference cost, while
//! diff-level analysis still covers the change.

use crate::review::PullRequestMetadata;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Above this many changed files the per-file analysis phase is dropped.
pub const PER_FILE_THRESHOLD: u64 = 20;

/// One discrete pipeline step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    FetchMetadata,
    FetchFiles,
    AnalyzeDiff,
    AnalyzeFiles,
    Summarize,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FetchMetadata => "fetch-metadata",
            Self::FetchFiles => "fetch-files",
            Self::AnalyzeDiff => "analyze-diff",
            Self::AnalyzeFiles => "analyze-files",
            Self::Summarize => "summarize",
        }
    }

    /// Human-readable phase message published with progress updates.
    pub fn label(&self) -> &'static str {
        match self {
            Self::FetchMetadata => "Fetching PR metadata",
            Self::FetchFiles => "Fetching changed files",
            Self::AnalyzeDiff => "Analyzing code changes",
            Self::AnalyzeFiles => "Analyzing individual files",
            Self::Summarize => "Generating summary",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Build the ordered phase plan for a pull request.
pub fn plan(metadata: &PullRequestMetadata) -> Vec<Phase> {
    let mut phases = vec![
        Phase::FetchMetadata,
        Phase::FetchFiles,
        Phase::AnalyzeDiff,
        Phase::AnalyzeFiles,
        Phase::Summarize,
    ];
    if metadata.files_changed > PER_FILE_THRESHOLD {
        phases.retain(|p| *p != Phase::AnalyzeFiles);
    }
    phases
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata_with_files(files_changed: u64) -> PullRequestMetadata {
        PullRequestMetadata {
            files_changed,
            ..Default::default()
        }
    }

    #[test]
    fn small_pr_keeps_all_five_phases() {
        let phases = plan(&metadata_with_files(3));
        assert_eq!(
            phases,
            vec![
                Phase::FetchMetadata,
                Phase::FetchFiles,
                Phase::AnalyzeDiff,
                Phase::AnalyzeFiles,
                Phase::Summarize,
            ]
        );
    }

    #[test]
    fn threshold_boundary_keeps_per_file_phase() {
        // Exactly at the threshold the phase is kept; only above it drops.
        assert!(plan(&metadata_with_files(20)).contains(&Phase::AnalyzeFiles));
        assert!(!plan(&metadata_with_files(21)).contains(&Phase::AnalyzeFiles));
    }

    #[test]
    fn large_pr_never_drops_diff_or_summary() {
        let phases = plan(&metadata_with_files(500));
        assert!(phases.contains(&Phase::AnalyzeDiff));
        assert!(phases.contains(&Phase::Summarize));
        assert_eq!(phases.len(), 4);
    }

    #[test]
    fn plan_preserves_phase_order() {
        let phases = plan(&metadata_with_files(50));
        assert_eq!(
            phases,
            vec![
                Phase::FetchMetadata,
                Phase::FetchFiles,
                Phase::AnalyzeDiff,
                Phase::Summarize,
            ]
        );
    }

    #[test]
    fn phase_serializes_kebab_case() {
        assert_eq!(
            serde_json::to_string(&Phase::AnalyzeFiles).unwrap(),
            "\"analyze-files\""
        );
    }
}
