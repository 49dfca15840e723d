//! Background task executor: worker pool, retry policy, and the job
//! status/results query surface.

use super::record::{JobFailure, JobRecord, JobState};
use super::store::{JobStore, KvStore, LoadedRecord};
use crate::agent::{ProgressSink, ProgressUpdate, ReviewAgent};
use crate::cache::FingerprintCache;
use crate::errors::{AgentError, ErrorKind};
use crate::gateways::{InferenceGateway, SourceGateway};
use crate::review::{AnalysisResult, PullRequestRef};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, mpsc};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Executor tuning knobs; defaults match the service configuration.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub max_attempts: u32,
    pub retry_base_delay: Duration,
    pub retry_max_delay: Duration,
    /// Checked at phase boundaries; exceeding it fails the attempt with a
    /// timeout.
    pub soft_time_limit: Duration,
    /// Enforced around the whole attempt; the future is dropped when it
    /// fires.
    pub hard_time_limit: Duration,
    pub workers: usize,
    pub result_ttl: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_base_delay: Duration::from_secs(60),
            retry_max_delay: Duration::from_secs(600),
            soft_time_limit: Duration::from_secs(1500),
            hard_time_limit: Duration::from_secs(1800),
            workers: 4,
            result_ttl: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// One queued unit of work.
#[derive(Debug, Clone)]
struct Job {
    job_id: String,
    pr: PullRequestRef,
    token: Option<String>,
}

/// Outcome of a submission.
pub enum Submission {
    /// A previous analysis of the same pull request is still fresh.
    Cached(Box<AnalysisResult>),
    /// A new job was queued.
    Queued(String),
}

/// Outcome of a status query.
pub enum StatusOutcome {
    NotFound,
    Status(JobStatus),
}

/// Outcome of a results query.
pub enum ResultsOutcome {
    NotFound,
    /// The job exists but has not reached a terminal state.
    NotReady(JobState),
    Failed(JobFailure),
    Ready(Box<AnalysisResult>),
}

/// Caller-facing view of a job record.
#[derive(Debug, Serialize)]
pub struct JobStatus {
    pub job_id: String,
    pub state: JobState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobFailure>,
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Sink that folds progress snapshots into the job record and persists
/// them, so status queries see live phase and progress.
struct RecordSink {
    store: JobStore,
    record: Mutex<JobRecord>,
}

impl RecordSink {
    fn new(store: JobStore, record: JobRecord) -> Self {
        Self {
            store,
            record: Mutex::new(record),
        }
    }

    async fn persist(&self, record: &JobRecord) {
        if let Err(err) = self.store.save(record).await {
            warn!(job_id = %record.job_id, %err, "failed to persist job record");
        }
    }

    async fn finish_success(&self, result: AnalysisResult) {
        let mut record = self.record.lock().await;
        record.mark_success(result);
        self.persist(&record).await;
    }

    async fn finish_retry(&self, failure: JobFailure) {
        let mut record = self.record.lock().await;
        record.mark_retry(failure);
        self.persist(&record).await;
    }

    async fn finish_failure(&self, failure: JobFailure) {
        let mut record = self.record.lock().await;
        record.mark_failure(failure);
        self.persist(&record).await;
    }
}

#[async_trait]
impl ProgressSink for RecordSink {
    async fn publish(&self, update: ProgressUpdate) {
        let mut record = self.record.lock().await;
        record.mark_processing(&update);
        self.persist(&record).await;
    }
}

/// Owns the worker pool and the job queue. Constructed once at startup
/// and shared behind an `Arc`.
pub struct TaskExecutor {
    config: ExecutorConfig,
    jobs: JobStore,
    cache: FingerprintCache,
    source: Arc<dyn SourceGateway>,
    inference: Arc<dyn InferenceGateway>,
    queue: mpsc::UnboundedSender<Job>,
}

impl TaskExecutor {
    pub fn new(
        config: ExecutorConfig,
        store: Arc<dyn KvStore>,
        cache: FingerprintCache,
        source: Arc<dyn SourceGateway>,
        inference: Arc<dyn InferenceGateway>,
    ) -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel::<Job>();
        let jobs = JobStore::new(store, config.result_ttl);
        let executor = Arc::new(Self {
            config,
            jobs,
            cache,
            source,
            inference,
            queue: tx,
        });
        let rx = Arc::new(Mutex::new(rx));
        for worker in 0..executor.config.workers.max(1) {
            let executor = Arc::clone(&executor);
            let rx = Arc::clone(&rx);
            tokio::spawn(async move {
                loop {
                    let job = rx.lock().await.recv().await;
                    match job {
                        Some(job) => executor.run_job(job).await,
                        None => break,
                    }
                }
                info!(worker, "worker shutting down");
            });
        }
        executor
    }

    /// Queue a new analysis unconditionally. Returns the job id.
    pub async fn submit(
        &self,
        pr: PullRequestRef,
        token: Option<String>,
    ) -> Result<String, AgentError> {
        let job_id = Uuid::new_v4().to_string();
        let record = JobRecord::new(&job_id, pr.clone());
        self.jobs
            .save(&record)
            .await
            .map_err(|err| AgentError::internal(format!("failed to persist job: {err}")))?;
        let job = Job {
            job_id: job_id.clone(),
            pr: pr.clone(),
            token,
        };
        self.queue
            .send(job)
            .map_err(|_| AgentError::internal("job queue is closed"))?;
        info!(%job_id, pr = %pr, "queued analysis");
        Ok(job_id)
    }

    /// Queue an analysis unless a fresh cached result exists for the same
    /// pull request.
    pub async fn submit_or_cached(
        &self,
        pr: PullRequestRef,
        token: Option<String>,
    ) -> Result<Submission, AgentError> {
        if let Some(result) = self.cache.get(&pr).await {
            info!(pr = %pr, "serving cached analysis");
            return Ok(Submission::Cached(Box::new(result)));
        }
        let job_id = self.submit(pr, token).await?;
        Ok(Submission::Queued(job_id))
    }

    pub async fn status(&self, job_id: &str) -> anyhow::Result<StatusOutcome> {
        match self.jobs.load(job_id).await? {
            LoadedRecord::Missing => Ok(StatusOutcome::NotFound),
            LoadedRecord::Corrupted => Ok(StatusOutcome::Status(JobStatus {
                job_id: job_id.to_string(),
                state: JobState::Failure,
                progress: None,
                message: "job record was corrupted and has been discarded".to_string(),
                error: Some(JobFailure {
                    kind: ErrorKind::CorruptedState,
                    message: "persisted job record could not be decoded".to_string(),
                }),
                created_at: None,
                started_at: None,
                completed_at: None,
            })),
            LoadedRecord::Record(record) => Ok(StatusOutcome::Status(Self::status_view(&record))),
        }
    }

    fn status_view(record: &JobRecord) -> JobStatus {
        let message = match record.state {
            JobState::Pending => "queued, waiting for a worker".to_string(),
            JobState::Started => "analysis started".to_string(),
            JobState::Processing => record
                .phase
                .clone()
                .unwrap_or_else(|| "analysis in progress".to_string()),
            JobState::Retry => "transient failure, retry scheduled".to_string(),
            JobState::Success => "analysis complete".to_string(),
            JobState::Failure => record
                .error
                .as_ref()
                .map(|e| e.message.clone())
                .unwrap_or_else(|| "analysis failed".to_string()),
        };
        JobStatus {
            job_id: record.job_id.clone(),
            state: record.state,
            progress: record.progress,
            message,
            error: record.error.clone(),
            created_at: Some(record.created_at),
            started_at: record.started_at,
            completed_at: record.completed_at,
        }
    }

    pub async fn results(&self, job_id: &str) -> anyhow::Result<ResultsOutcome> {
        match self.jobs.load(job_id).await? {
            LoadedRecord::Missing => Ok(ResultsOutcome::NotFound),
            LoadedRecord::Corrupted => Ok(ResultsOutcome::Failed(JobFailure {
                kind: ErrorKind::CorruptedState,
                message: "persisted job record could not be decoded".to_string(),
            })),
            LoadedRecord::Record(record) => match record.state {
                JobState::Success => match record.result {
                    Some(result) => Ok(ResultsOutcome::Ready(result)),
                    None => Ok(ResultsOutcome::Failed(JobFailure {
                        kind: ErrorKind::Internal,
                        message: "job succeeded but its result is missing".to_string(),
                    })),
                },
                JobState::Failure => {
                    Ok(ResultsOutcome::Failed(record.error.unwrap_or(JobFailure {
                        kind: ErrorKind::Internal,
                        message: "analysis failed".to_string(),
                    })))
                }
                state => Ok(ResultsOutcome::NotReady(state)),
            },
        }
    }

    async fn run_job(&self, job: Job) {
        let mut attempt = 1u32;
        loop {
            let record = match self.jobs.load(&job.job_id).await {
                Ok(LoadedRecord::Record(record)) => *record,
                Ok(_) => {
                    warn!(job_id = %job.job_id, "job record missing, rebuilding");
                    JobRecord::new(&job.job_id, job.pr.clone())
                }
                Err(err) => {
                    error!(job_id = %job.job_id, %err, "failed to load job record");
                    JobRecord::new(&job.job_id, job.pr.clone())
                }
            };
            let outcome = self.run_attempt(&job, record, attempt).await;
            match outcome {
                Ok(()) => return,
                Err(err) => {
                    if err.is_terminal() || attempt >= self.config.max_attempts {
                        info!(job_id = %job.job_id, attempt, kind = %err.kind, "job failed");
                        return;
                    }
                    let delay = retry_delay(
                        attempt,
                        self.config.retry_base_delay,
                        self.config.retry_max_delay,
                    );
                    warn!(job_id = %job.job_id, attempt, delay_secs = delay.as_secs_f64(), kind = %err.kind, "retrying after transient failure");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Run one attempt. `Err` means the attempt failed; the job record has
    /// already been moved to `retry` or `failure` accordingly.
    async fn run_attempt(
        &self,
        job: &Job,
        mut record: JobRecord,
        attempt: u32,
    ) -> Result<(), AgentError> {
        record.mark_started(attempt);
        if let Err(err) = self.jobs.save(&record).await {
            warn!(job_id = %job.job_id, %err, "failed to persist started state");
        }

        let sink = Arc::new(RecordSink::new(self.jobs.clone(), record));
        let agent = ReviewAgent::new(
            Arc::clone(&self.source),
            Arc::clone(&self.inference),
            Arc::clone(&sink) as Arc<dyn ProgressSink>,
        )
        .with_token(job.token.clone())
        .with_soft_deadline(Some(Instant::now() + self.config.soft_time_limit));

        let outcome = match tokio::time::timeout(self.config.hard_time_limit, agent.execute(&job.pr))
            .await
        {
            Ok(outcome) => outcome,
            Err(_) => Err(AgentError::timeout(format!(
                "hard time limit of {}s exceeded",
                self.config.hard_time_limit.as_secs()
            ))),
        };

        match outcome {
            Ok(result) => {
                self.cache.put(&job.pr, &result).await;
                sink.finish_success(result).await;
                info!(job_id = %job.job_id, attempt, "analysis succeeded");
                Ok(())
            }
            Err(err) => {
                let failure = JobFailure::from(err.clone());
                if err.is_terminal() || attempt >= self.config.max_attempts {
                    sink.finish_failure(failure).await;
                } else {
                    sink.finish_retry(failure).await;
                }
                Err(err)
            }
        }
    }
}

/// Exponential backoff with jitter: `base * 2^(attempt-1)`, capped, plus
/// up to 50% random jitter, capped again.
fn retry_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    let backoff = base.saturating_mul(1u32 << exponent).min(max);
    let jitter = backoff.mul_f64(rand::rng().random_range(0.0..0.5));
    (backoff + jitter).min(max)
}
