//! HTTP facade: submit analyses, poll status, fetch results.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::{Path as UrlPath, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::cache::FingerprintCache;
use crate::config::CriticConfig;
use crate::gateways::{GitHubGateway, OllamaGateway};
use crate::review::{AnalysisResult, PullRequestRef};
use crate::task::{
    JobStatus, KvStore, MemoryStore, ResultsOutcome, StatusOutcome, Submission, TaskExecutor,
};

pub struct AppState {
    pub executor: Arc<TaskExecutor>,
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub repo: String,
    pub number: u64,
    /// Per-submission credential, overriding the configured default.
    #[serde(default)]
    pub github_token: Option<String>,
}

#[derive(Debug, Serialize)]
struct AnalyzeAccepted {
    job_id: String,
    status: &'static str,
    message: &'static str,
}

#[derive(Debug, Serialize)]
struct CachedResponse {
    status: &'static str,
    result: Box<AnalysisResult>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
        .into_response()
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn submit_analysis(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AnalyzeRequest>,
) -> Response {
    let pr = match PullRequestRef::parse(&request.repo, request.number) {
        Ok(pr) => pr,
        Err(err) => return error_response(StatusCode::UNPROCESSABLE_ENTITY, err.message),
    };
    match state
        .executor
        .submit_or_cached(pr, request.github_token)
        .await
    {
        Ok(Submission::Cached(result)) => (
            StatusCode::OK,
            Json(CachedResponse {
                status: "cached",
                result,
            }),
        )
            .into_response(),
        Ok(Submission::Queued(job_id)) => (
            StatusCode::ACCEPTED,
            Json(AnalyzeAccepted {
                job_id,
                status: "pending",
                message: "analysis queued",
            }),
        )
            .into_response(),
        Err(err) => {
            error!(%err, "failed to queue analysis");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, err.message)
        }
    }
}

async fn job_status(
    State(state): State<Arc<AppState>>,
    UrlPath(job_id): UrlPath<String>,
) -> Response {
    match state.executor.status(&job_id).await {
        Ok(StatusOutcome::NotFound) => {
            error_response(StatusCode::NOT_FOUND, format!("no job with id {job_id}"))
        }
        Ok(StatusOutcome::Status(status)) => Json::<JobStatus>(status).into_response(),
        Err(err) => {
            error!(%job_id, %err, "status lookup failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "status lookup failed")
        }
    }
}

async fn job_results(
    State(state): State<Arc<AppState>>,
    UrlPath(job_id): UrlPath<String>,
) -> Response {
    match state.executor.results(&job_id).await {
        Ok(ResultsOutcome::NotFound) => {
            error_response(StatusCode::NOT_FOUND, format!("no job with id {job_id}"))
        }
        Ok(ResultsOutcome::NotReady(job_state)) => error_response(
            StatusCode::CONFLICT,
            format!("job is still {job_state}, results not available yet"),
        ),
        Ok(ResultsOutcome::Failed(failure)) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("{}: {}", failure.kind, failure.message),
        ),
        Ok(ResultsOutcome::Ready(result)) => Json(result).into_response(),
        Err(err) => {
            error!(%job_id, %err, "results lookup failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "results lookup failed")
        }
    }
}

/// Build the application router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/analyses", post(submit_analysis))
        .route("/api/v1/analyses/{job_id}/status", get(job_status))
        .route("/api/v1/analyses/{job_id}/results", get(job_results))
        .with_state(state)
}

/// Wire up the store, gateways, and executor, then serve until Ctrl+C.
pub async fn serve(config: CriticConfig) -> Result<()> {
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    let cache = if config.cache.enabled {
        FingerprintCache::new(Arc::clone(&store), config.cache_ttl())
    } else {
        FingerprintCache::disabled()
    };
    let source = Arc::new(GitHubGateway::new(
        config.github.api_url.clone(),
        config.github.token.clone(),
    )?);
    let inference = Arc::new(OllamaGateway::new(
        config.ollama.base_url.clone(),
        config.ollama.model.clone(),
        config.ollama_timeout(),
    ));
    let executor = TaskExecutor::new(
        config.executor_config(),
        store,
        cache,
        source,
        inference,
    );
    let state = Arc::new(AppState { executor });
    let app = build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;
    let local_addr = listener.local_addr()?;
    tracing::info!(addr = %local_addr, "critic listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    tracing::info!("server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(%err, "failed to install Ctrl+C handler");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::errors::SourceError;
    use crate::gateways::{InferenceGateway, SourceGateway};
    use crate::review::{ChangedFile, PullRequestMetadata};
    use crate::task::ExecutorConfig;
    use async_trait::async_trait;
    use std::time::Duration;

    struct EmptySource;

    #[async_trait]
    impl SourceGateway for EmptySource {
        async fn fetch_metadata(
            &self,
            _pr: &PullRequestRef,
            _token: Option<&str>,
        ) -> Result<PullRequestMetadata, SourceError> {
            Ok(PullRequestMetadata::default())
        }

        async fn fetch_files(
            &self,
            _pr: &PullRequestRef,
            _token: Option<&str>,
        ) -> Result<Vec<ChangedFile>, SourceError> {
            Ok(vec![])
        }

        async fn fetch_diff(
            &self,
            _pr: &PullRequestRef,
            _token: Option<&str>,
        ) -> Result<String, SourceError> {
            Ok(String::new())
        }
    }

    struct CannedInference;

    #[async_trait]
    impl InferenceGateway for CannedInference {
        async fn complete(
            &self,
            _system_prompt: &str,
            _user_prompt: &str,
            _temperature: f32,
            _max_tokens: u32,
        ) -> Result<String, crate::errors::InferenceError> {
            Ok(r#"{"overall_score": 90, "summary": "clean", "recommendations": []}"#.to_string())
        }
    }

    fn test_router() -> Router {
        let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        let cache = FingerprintCache::new(Arc::clone(&store), Duration::from_secs(60));
        let executor = TaskExecutor::new(
            ExecutorConfig {
                workers: 1,
                ..Default::default()
            },
            store,
            cache,
            Arc::new(EmptySource),
            Arc::new(CannedInference),
        );
        build_router(Arc::new(AppState { executor }))
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let app = test_router();
        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn submit_returns_202_with_job_id() {
        let app = test_router();
        let req = Request::builder()
            .method("POST")
            .uri("/api/v1/analyses")
            .header("content-type", "application/json")
            .body(Body::from(
                serde_json::json!({"repo": "acme/widgets", "number": 7}).to_string(),
            ))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "pending");
        assert!(body["job_id"].as_str().is_some_and(|id| !id.is_empty()));
    }

    #[tokio::test]
    async fn malformed_repo_is_rejected_with_422() {
        let app = test_router();
        let req = Request::builder()
            .method("POST")
            .uri("/api/v1/analyses")
            .header("content-type", "application/json")
            .body(Body::from(
                serde_json::json!({"repo": "not-a-repo", "number": 7}).to_string(),
            ))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn zero_pr_number_is_rejected_with_422() {
        let app = test_router();
        let req = Request::builder()
            .method("POST")
            .uri("/api/v1/analyses")
            .header("content-type", "application/json")
            .body(Body::from(
                serde_json::json!({"repo": "acme/widgets", "number": 0}).to_string(),
            ))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn unknown_job_status_is_404() {
        let app = test_router();
        let req = Request::builder()
            .uri("/api/v1/analyses/does-not-exist/status")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_job_results_is_404() {
        let app = test_router();
        let req = Request::builder()
            .uri("/api/v1/analyses/does-not-exist/results")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
