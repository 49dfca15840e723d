//! The review agent: one pull request in, one [`AnalysisResult`] out.
//!
//! The agent executes the phase plan sequentially, publishing a progress
//! snapshot at every phase boundary. It is stateless across jobs; the
//! executor builds a fresh agent per attempt and injects its own sink.

pub mod planner;
pub mod prompts;
pub mod state;

pub use planner::{PER_FILE_THRESHOLD, Phase, plan};
pub use state::{AnalysisState, NullSink, ProgressSink, ProgressUpdate};

use crate::errors::AgentError;
use crate::gateways::{
    DiffAnalysis, InferenceGateway, SourceGateway, decode_code_analysis, decode_diff_analysis,
    decode_summary,
};
use crate::review::{
    AnalysisResult, ChangedFile, FileStatus, PullRequestMetadata, PullRequestRef,
    PullRequestSummary, dedup_issues,
};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Files with at least this many changed lines are skipped by per-file
/// analysis.
const MAX_FILE_CHANGES: u64 = 500;

/// At most this many files go through per-file analysis.
const MAX_FILES_ANALYZED: usize = 10;

const ANALYSIS_TEMPERATURE: f32 = 0.3;
const ANALYSIS_MAX_TOKENS: u32 = 2000;

/// Sequential analysis pipeline over injected gateways.
pub struct ReviewAgent {
    source: Arc<dyn SourceGateway>,
    inference: Arc<dyn InferenceGateway>,
    sink: Arc<dyn ProgressSink>,
    token: Option<String>,
    soft_deadline: Option<Instant>,
}

impl ReviewAgent {
    pub fn new(
        source: Arc<dyn SourceGateway>,
        inference: Arc<dyn InferenceGateway>,
        sink: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            source,
            inference,
            sink,
            token: None,
            soft_deadline: None,
        }
    }

    /// Per-submission credential, overriding any configured default.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    /// Instant after which the next phase boundary aborts the run with a
    /// timeout failure.
    pub fn with_soft_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.soft_deadline = deadline;
        self
    }

    /// Run the full pipeline for one pull request.
    pub async fn execute(&self, pr: &PullRequestRef) -> Result<AnalysisResult, AgentError> {
        let started = Instant::now();
        let mut state = AnalysisState::new();

        self.checkpoint(&mut state, Phase::FetchMetadata.label(), 10)
            .await?;
        let metadata = self
            .source
            .fetch_metadata(pr, self.token.as_deref())
            .await?;
        let phases = plan(&metadata);
        info!(pr = %pr, files_changed = metadata.files_changed, phases = phases.len(), "planned analysis");

        self.checkpoint(&mut state, Phase::FetchFiles.label(), 20)
            .await?;
        let files = self.source.fetch_files(pr, self.token.as_deref()).await?;

        self.checkpoint(&mut state, Phase::AnalyzeDiff.label(), 40)
            .await?;
        let diff_analysis = self.analyze_diff(pr, &metadata).await?;
        let positive_changes = diff_analysis.positive_changes;
        state.issues.extend(diff_analysis.issues);

        if phases.contains(&Phase::AnalyzeFiles) {
            self.checkpoint(&mut state, Phase::AnalyzeFiles.label(), 60)
                .await?;
            self.analyze_files(&mut state, &files, &metadata).await?;
        }

        state.issues = dedup_issues(std::mem::take(&mut state.issues));

        self.checkpoint(&mut state, Phase::Summarize.label(), 90)
            .await?;
        let outcome = self.summarize(&state, &metadata).await?;

        let update = state.advance("Complete", 100);
        self.sink.publish(update).await;

        Ok(AnalysisResult {
            pr_summary: PullRequestSummary::from(&metadata),
            issues: state.issues,
            overall_score: outcome.overall_score,
            summary: outcome.summary,
            recommendations: outcome.recommendations,
            positive_changes,
            analyzed_at: Utc::now(),
            processing_time_secs: started.elapsed().as_secs_f64(),
            files_analyzed: state.files_analyzed,
        })
    }

    /// Soft-deadline check plus a progress snapshot. Runs at every phase
    /// boundary, so a job over budget stops before starting more work.
    async fn checkpoint(
        &self,
        state: &mut AnalysisState,
        phase: &str,
        progress: u8,
    ) -> Result<(), AgentError> {
        if let Some(deadline) = self.soft_deadline
            && Instant::now() >= deadline
        {
            return Err(AgentError::timeout(format!(
                "soft time limit reached before phase '{phase}'"
            )));
        }
        let update = state.advance(phase, progress);
        self.sink.publish(update).await;
        Ok(())
    }

    async fn analyze_diff(
        &self,
        pr: &PullRequestRef,
        metadata: &PullRequestMetadata,
    ) -> Result<DiffAnalysis, AgentError> {
        let diff = self.source.fetch_diff(pr, self.token.as_deref()).await?;
        if diff.trim().is_empty() {
            debug!(pr = %pr, "empty diff, skipping inference");
            return Ok(DiffAnalysis {
                summary: "No changes to analyze".to_string(),
                ..Default::default()
            });
        }
        let prompt = prompts::diff_prompt(&diff, metadata);
        let output = self
            .inference
            .complete(
                prompts::DIFF_SYSTEM_PROMPT,
                &prompt,
                ANALYSIS_TEMPERATURE,
                ANALYSIS_MAX_TOKENS,
            )
            .await?;
        Ok(decode_diff_analysis(&output))
    }

    /// Per-file pass over eligible source files. A single file failing
    /// inference is logged and skipped; it never fails the job.
    async fn analyze_files(
        &self,
        state: &mut AnalysisState,
        files: &[ChangedFile],
        metadata: &PullRequestMetadata,
    ) -> Result<(), AgentError> {
        let candidates: Vec<&ChangedFile> = files
            .iter()
            .filter(|f| {
                f.status != FileStatus::Removed && f.changes < MAX_FILE_CHANGES && f.is_source_file()
            })
            .take(MAX_FILES_ANALYZED)
            .collect();
        let total = candidates.len();
        for (index, file) in candidates.into_iter().enumerate() {
            let code = file.added_lines();
            if !code.is_empty() {
                let prompt = prompts::code_prompt(&code, &file.filename, &metadata.title);
                let output = match self
                    .inference
                    .complete(
                        prompts::CODE_SYSTEM_PROMPT,
                        &prompt,
                        ANALYSIS_TEMPERATURE,
                        ANALYSIS_MAX_TOKENS,
                    )
                    .await
                {
                    Ok(output) => output,
                    Err(err) => {
                        warn!(file = %file.filename, %err, "per-file analysis failed, skipping");
                        continue;
                    }
                };
                let mut analysis = decode_code_analysis(&output);
                for issue in &mut analysis.issues {
                    issue.file_path.get_or_insert_with(|| file.filename.clone());
                }
                state.issues.extend(analysis.issues);
            }
            state.files_analyzed += 1;
            let progress = 60 + ((index as u32 + 1) * 20 / total.max(1) as u32) as u8;
            self.checkpoint(state, Phase::AnalyzeFiles.label(), progress)
                .await?;
        }
        Ok(())
    }

    async fn summarize(
        &self,
        state: &AnalysisState,
        metadata: &PullRequestMetadata,
    ) -> Result<crate::gateways::SummaryOutcome, AgentError> {
        let prompt = prompts::summary_prompt(&state.issues, metadata);
        let output = self
            .inference
            .complete(
                prompts::SUMMARY_SYSTEM_PROMPT,
                &prompt,
                ANALYSIS_TEMPERATURE,
                ANALYSIS_MAX_TOKENS,
            )
            .await?;
        Ok(decode_summary(&output))
    }
}
