//! Issue deduplication across analysis phases.
//!
//! Diff-level and per-file analysis can independently surface the same
//! defect; before summarizing, overlapping findings collapse to the first
//! occurrence.

use crate::review::issue::Issue;
use std::collections::HashSet;

/// Remove duplicate issues by `(title, file_path)`, preserving order.
/// First occurrence wins. Pure; no state retained between calls.
pub fn dedup_issues(issues: Vec<Issue>) -> Vec<Issue> {
    let mut seen: HashSet<(String, Option<String>)> = HashSet::new();
    issues
        .into_iter()
        .filter(|issue| seen.insert((issue.title.clone(), issue.file_path.clone())))
        .collect()
}
