//! Pull request source gateway and its GitHub implementation.

use crate::errors::SourceError;
use crate::review::{ChangedFile, PullRequestMetadata, PullRequestRef};
use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

const USER_AGENT: &str = concat!("critic/", env!("CARGO_PKG_VERSION"));
const PER_PAGE: usize = 100;

/// Read access to a pull request host. Implementations must map
/// authentication rejections to [`SourceError::AuthRejected`] so the
/// pipeline can fail fast instead of retrying.
#[async_trait]
pub trait SourceGateway: Send + Sync {
    async fn fetch_metadata(
        &self,
        pr: &PullRequestRef,
        token: Option<&str>,
    ) -> Result<PullRequestMetadata, SourceError>;

    async fn fetch_files(
        &self,
        pr: &PullRequestRef,
        token: Option<&str>,
    ) -> Result<Vec<ChangedFile>, SourceError>;

    async fn fetch_diff(
        &self,
        pr: &PullRequestRef,
        token: Option<&str>,
    ) -> Result<String, SourceError>;
}

#[derive(Debug, Deserialize)]
struct PullResponse {
    #[serde(default)]
    number: u64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    user: Option<UserResponse>,
    base: BranchResponse,
    head: BranchResponse,
    #[serde(default)]
    state: String,
    #[serde(default)]
    created_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    updated_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    changed_files: u64,
    #[serde(default)]
    additions: u64,
    #[serde(default)]
    deletions: u64,
    #[serde(default)]
    commits: u64,
    #[serde(default)]
    mergeable: Option<bool>,
    #[serde(default)]
    draft: bool,
    #[serde(default)]
    labels: Vec<LabelResponse>,
    #[serde(default)]
    html_url: String,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    login: String,
}

#[derive(Debug, Deserialize)]
struct BranchResponse {
    #[serde(rename = "ref")]
    name: String,
}

#[derive(Debug, Deserialize)]
struct LabelResponse {
    name: String,
}

#[derive(Debug, Deserialize)]
struct FileResponse {
    filename: String,
    status: crate::review::FileStatus,
    #[serde(default)]
    additions: u64,
    #[serde(default)]
    deletions: u64,
    #[serde(default)]
    changes: u64,
    #[serde(default)]
    patch: Option<String>,
    #[serde(default)]
    raw_url: Option<String>,
    #[serde(default)]
    blob_url: Option<String>,
}

impl From<FileResponse> for ChangedFile {
    fn from(file: FileResponse) -> Self {
        ChangedFile {
            filename: file.filename,
            status: file.status,
            additions: file.additions,
            deletions: file.deletions,
            changes: file.changes,
            patch: file.patch,
            raw_url: file.raw_url,
            blob_url: file.blob_url,
        }
    }
}

/// GitHub REST v3 client. A configured token is the default credential;
/// a per-request token (from the submission) takes precedence.
pub struct GitHubGateway {
    client: reqwest::Client,
    api_url: String,
    token: Option<String>,
}

impl GitHubGateway {
    pub fn new(api_url: impl Into<String>, token: Option<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to build GitHub HTTP client")?;
        Ok(Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    fn pull_url(&self, pr: &PullRequestRef) -> String {
        format!("{}/repos/{}/pulls/{}", self.api_url, pr.repo, pr.number)
    }

    fn authorize(
        &self,
        request: reqwest::RequestBuilder,
        token: Option<&str>,
    ) -> reqwest::RequestBuilder {
        match token.or(self.token.as_deref()) {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        query: &[(&str, String)],
        token: Option<&str>,
    ) -> Result<T, SourceError> {
        let request = self
            .authorize(self.client.get(url), token)
            .header("Accept", "application/vnd.github+json")
            .query(query);
        let response = request
            .send()
            .await
            .map_err(|err| SourceError::Unavailable(format!("request to {url} failed: {err}")))?;
        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(SourceError::AuthRejected(format!(
                "GitHub rejected credentials for {url} ({status})"
            )));
        }
        if !status.is_success() {
            return Err(SourceError::Unavailable(format!(
                "GitHub returned {status} for {url}"
            )));
        }
        response
            .json::<T>()
            .await
            .map_err(|err| SourceError::Unavailable(format!("invalid response from {url}: {err}")))
    }
}

#[async_trait]
impl SourceGateway for GitHubGateway {
    async fn fetch_metadata(
        &self,
        pr: &PullRequestRef,
        token: Option<&str>,
    ) -> Result<PullRequestMetadata, SourceError> {
        let pull: PullResponse = self.get_json(&self.pull_url(pr), &[], token).await?;
        Ok(PullRequestMetadata {
            number: pull.number,
            title: pull.title,
            description: pull.body.unwrap_or_default(),
            state: pull.state,
            author: pull.user.map(|u| u.login).unwrap_or_default(),
            created_at: pull.created_at,
            updated_at: pull.updated_at,
            base_branch: pull.base.name,
            head_branch: pull.head.name,
            files_changed: pull.changed_files,
            additions: pull.additions,
            deletions: pull.deletions,
            commits: pull.commits,
            mergeable: pull.mergeable,
            draft: pull.draft,
            labels: pull.labels.into_iter().map(|l| l.name).collect(),
            url: pull.html_url,
        })
    }

    async fn fetch_files(
        &self,
        pr: &PullRequestRef,
        token: Option<&str>,
    ) -> Result<Vec<ChangedFile>, SourceError> {
        let url = format!("{}/files", self.pull_url(pr));
        let mut files = Vec::new();
        let mut page = 1usize;
        loop {
            let batch: Vec<FileResponse> = self
                .get_json(
                    &url,
                    &[
                        ("per_page", PER_PAGE.to_string()),
                        ("page", page.to_string()),
                    ],
                    token,
                )
                .await?;
            let count = batch.len();
            files.extend(batch.into_iter().map(ChangedFile::from));
            if count < PER_PAGE {
                break;
            }
            page += 1;
        }
        Ok(files)
    }

    async fn fetch_diff(
        &self,
        pr: &PullRequestRef,
        token: Option<&str>,
    ) -> Result<String, SourceError> {
        let files = self.fetch_files(pr, token).await?;
        Ok(assemble_diff(&files))
    }
}

/// Build a unified-diff style document from per-file patches. Files
/// without a patch (binary, oversized) are skipped.
pub fn assemble_diff(files: &[ChangedFile]) -> String {
    let mut diff = String::new();
    for file in files {
        let Some(patch) = file.patch.as_deref() else {
            continue;
        };
        diff.push_str(&format!(
            "diff --git a/{name} b/{name}\n--- a/{name}\n+++ b/{name}\n{patch}\n",
            name = file.filename,
        ));
    }
    diff
}
