//! Mutable per-job analysis state and the progress observer seam.
//!
//! [`AnalysisState`] is owned exclusively by one [`crate::agent::ReviewAgent`]
//! for the lifetime of one job attempt; it is never shared across jobs. The
//! agent publishes immutable [`ProgressUpdate`] snapshots through a
//! constructor-injected [`ProgressSink`], which is how the task executor
//! observes phase boundaries without any shared mutable state.

use crate::review::Issue;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Immutable snapshot published after each phase boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub phase: String,
    /// 0–100, non-decreasing within one job attempt.
    pub progress: u8,
    pub files_analyzed: u32,
}

/// Observer invoked synchronously at phase boundaries.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn publish(&self, update: ProgressUpdate);
}

/// Sink that discards updates; used by inline CLI runs.
#[derive(Debug, Default)]
pub struct NullSink;

#[async_trait]
impl ProgressSink for NullSink {
    async fn publish(&self, _update: ProgressUpdate) {}
}

/// Per-attempt mutable state: current phase, monotonic progress, issue
/// accumulator, and the analyzed-file counter.
#[derive(Debug, Default)]
pub struct AnalysisState {
    phase: String,
    progress: u8,
    pub files_analyzed: u32,
    pub issues: Vec<Issue>,
}

impl AnalysisState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move to a new phase/progress pair and return the snapshot to
    /// publish. Progress is clamped so it never moves backwards within an
    /// attempt.
    pub fn advance(&mut self, phase: &str, progress: u8) -> ProgressUpdate {
        self.phase = phase.to_string();
        self.progress = progress.min(100).max(self.progress);
        ProgressUpdate {
            phase: self.phase.clone(),
            progress: self.progress,
            files_analyzed: self.files_analyzed,
        }
    }

    pub fn phase(&self) -> &str {
        &self.phase
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }
}
