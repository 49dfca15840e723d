//! Persisted job lifecycle state.
//!
//! A [`JobRecord`] is the single source of truth for one submission. All
//! transitions funnel through the `mark_*` methods so the invariants
//! (terminal states keep their timestamps, progress resets on retry) live
//! in one place.

use crate::errors::{AgentError, ErrorKind};
use crate::review::{AnalysisResult, PullRequestRef};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle states of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Accepted, waiting for a worker.
    Pending,
    /// Claimed by a worker, attempt underway.
    Started,
    /// Actively executing pipeline phases.
    Processing,
    /// Finished with a result.
    Success,
    /// Finished with a classified failure.
    Failure,
    /// Transient failure recorded, another attempt is scheduled.
    Retry,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failure)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Started => "started",
            Self::Processing => "processing",
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Retry => "retry",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Classified failure persisted with the job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFailure {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<AgentError> for JobFailure {
    fn from(err: AgentError) -> Self {
        Self {
            kind: err.kind,
            message: err.message,
        }
    }
}

/// One submission's full persisted state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: String,
    pub pr: PullRequestRef,
    pub state: JobState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(default)]
    pub files_analyzed: u32,
    /// 1-based attempt counter; 0 until a worker claims the job.
    #[serde(default)]
    pub attempt: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JobFailure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Box<AnalysisResult>>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    pub fn new(job_id: impl Into<String>, pr: PullRequestRef) -> Self {
        Self {
            job_id: job_id.into(),
            pr,
            state: JobState::Pending,
            phase: None,
            progress: None,
            files_analyzed: 0,
            attempt: 0,
            error: None,
            result: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// A worker claimed the job for the given attempt. Progress and any
    /// prior transient error are reset.
    pub fn mark_started(&mut self, attempt: u32) {
        self.state = JobState::Started;
        self.attempt = attempt;
        self.phase = None;
        self.progress = Some(0);
        self.error = None;
        if self.started_at.is_none() {
            self.started_at = Some(Utc::now());
        }
    }

    /// Fold a progress snapshot into the record.
    pub fn mark_processing(&mut self, update: &crate::agent::ProgressUpdate) {
        self.state = JobState::Processing;
        self.phase = Some(update.phase.clone());
        self.progress = Some(update.progress);
        self.files_analyzed = update.files_analyzed;
    }

    /// Transient failure; another attempt will follow.
    pub fn mark_retry(&mut self, failure: JobFailure) {
        self.state = JobState::Retry;
        self.error = Some(failure);
    }

    pub fn mark_success(&mut self, result: AnalysisResult) {
        self.state = JobState::Success;
        self.progress = Some(100);
        self.files_analyzed = result.files_analyzed;
        self.result = Some(Box::new(result));
        self.error = None;
        self.completed_at = Some(Utc::now());
    }

    pub fn mark_failure(&mut self, failure: JobFailure) {
        self.state = JobState::Failure;
        self.error = Some(failure);
        self.completed_at = Some(Utc::now());
    }
}
