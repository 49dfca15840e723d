//! Failure taxonomy shared by the review agent and the task executor.
//!
//! Two layers:
//! - gateway-level enums (`SourceError`, `InferenceError`) raised by the
//!   concrete adapters;
//! - the job-facing [`AgentError`], a stable `(kind, message)` pair that is
//!   plain serializable data. The executor persists it into job records, so
//!   classification never depends on exception identity surviving a store
//!   round-trip.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Stable failure kinds visible to job records and API callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The code-hosting API could not be reached or returned an error.
    SourceUnavailable,
    /// The code-hosting API rejected the credential. Never retried.
    AuthenticationRejected,
    /// The inference backend could not be reached or returned an error.
    InferenceUnavailable,
    /// Inference output could not be parsed. Recovered locally with a
    /// fallback issue; never surfaces as a job failure.
    InferenceUnparseable,
    /// Malformed work-unit identity, rejected before a job is created.
    ValidationError,
    /// The job exceeded its wall-clock budget.
    Timeout,
    /// A persisted job snapshot could not be decoded.
    CorruptedState,
    /// Anything else.
    Internal,
}

impl ErrorKind {
    /// Terminal kinds fail the job on first occurrence, bypassing the
    /// retry policy.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationRejected
                | Self::ValidationError
                | Self::Timeout
                | Self::CorruptedState
        )
    }

    /// Retryable kinds go through the executor's backoff policy.
    pub fn is_retryable(&self) -> bool {
        !self.is_terminal()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SourceUnavailable => "source_unavailable",
            Self::AuthenticationRejected => "authentication_rejected",
            Self::InferenceUnavailable => "inference_unavailable",
            Self::InferenceUnparseable => "inference_unparseable",
            Self::ValidationError => "validation_error",
            Self::Timeout => "timeout",
            Self::CorruptedState => "corrupted_state",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A classified failure: stable kind plus the original message for
/// diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct AgentError {
    pub kind: ErrorKind,
    pub message: String,
}

impl AgentError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn source_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SourceUnavailable, message)
    }

    pub fn authentication_rejected(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AuthenticationRejected, message)
    }

    pub fn inference_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InferenceUnavailable, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ValidationError, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    pub fn corrupted_state(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::CorruptedState, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    pub fn is_terminal(&self) -> bool {
        self.kind.is_terminal()
    }
}

/// Errors from the source gateway (code-hosting API).
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source unavailable: {0}")]
    Unavailable(String),

    #[error("authentication rejected: {0}")]
    AuthRejected(String),
}

/// Errors from the inference gateway.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("inference unavailable: {0}")]
    Unavailable(String),
}

impl From<SourceError> for AgentError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::Unavailable(msg) => AgentError::source_unavailable(msg),
            SourceError::AuthRejected(msg) => AgentError::authentication_rejected(msg),
        }
    }
}

impl From<InferenceError> for AgentError {
    fn from(err: InferenceError) -> Self {
        match err {
            InferenceError::Unavailable(msg) => AgentError::inference_unavailable(msg),
        }
    }
}
