//! GitHub REST client: changed files, file contents, comments, statuses, gists.
//!
//! Reads use the read token and writes the write token, so a read-only token
//! can be used to fetch from a private fork. Transient failures (network,
//! 5xx, 429) are retried once after a short backoff; everything else is
//! returned to the caller.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use thiserror::Error;

use crate::models::LintComment;
use crate::stages::status::CommitStatus;

const PER_PAGE: usize = 100;
const RETRY_DELAY: Duration = Duration::from_secs(1);
const USER_AGENT: &str = "pr-lint";
const ACCEPT_JSON: &str = "application/vnd.github+json";
const ACCEPT_RAW: &str = "application/vnd.github.raw";

#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("invalid GitHub URL: {0}")]
    InvalidUrl(String),
    #[error("GitHub request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("GitHub returned {status} for {url}: {body}")]
    Status {
        status: u16,
        url: String,
        body: String,
    },
}

impl GitHubError {
    fn is_transient(&self) -> bool {
        match self {
            GitHubError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            GitHubError::Status { status, .. } => is_transient_status(*status),
            GitHubError::InvalidUrl(_) => false,
        }
    }
}

fn is_transient_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

/// A file entry from `GET /pulls/{n}/files`.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct PullFile {
    pub filename: String,
    /// `added`, `modified`, `removed`, `renamed`, ...
    #[serde(default)]
    pub status: String,
    /// Old path for renamed files.
    pub previous_filename: Option<String>,
}

/// The pull request operations the lint pipeline needs.
#[async_trait]
pub trait PullRequestApi: Send + Sync {
    async fn base_sha(&self, pr_num: u64) -> Result<String, GitHubError>;
    /// Common ancestor of `base` and `head`, where the pull request branched off.
    async fn merge_base(&self, base: &str, head: &str) -> Result<String, GitHubError>;
    async fn changed_files(&self, pr_num: u64) -> Result<Vec<PullFile>, GitHubError>;
    /// `Ok(None)` when the file does not exist at `git_ref`.
    async fn file_content(&self, path: &str, git_ref: &str) -> Result<Option<String>, GitHubError>;
    async fn list_comments(&self, pr_num: u64) -> Result<Vec<LintComment>, GitHubError>;
    async fn create_comment(&self, pr_num: u64, body: &str) -> Result<(), GitHubError>;
    async fn update_comment(&self, comment_id: u64, body: &str) -> Result<(), GitHubError>;
    async fn set_status(&self, sha: &str, status: &CommitStatus) -> Result<(), GitHubError>;
    /// Store the full lint log somewhere linkable and return its URL.
    async fn upload_log(&self, description: &str, log: &str) -> Result<String, GitHubError>;
}

#[derive(Deserialize)]
struct PullDetails {
    base: GitRef,
}

#[derive(Deserialize)]
struct GitRef {
    sha: String,
}

#[derive(Deserialize)]
struct Comparison {
    merge_base_commit: GitRef,
}

#[derive(Deserialize)]
struct Gist {
    html_url: String,
}

pub struct GitHubClient {
    http: reqwest::Client,
    /// e.g. `https://api.github.com/repos/owner/name`
    repo_base: Url,
    /// e.g. `https://api.github.com`
    api_root: Url,
    read_token: String,
    write_token: String,
    retry_delay: Duration,
}

impl GitHubClient {
    pub fn new(
        repo_base: &str,
        api_root: &str,
        read_token: String,
        write_token: String,
    ) -> Result<Self, GitHubError> {
        Ok(Self {
            http: reqwest::Client::new(),
            repo_base: parse_base(repo_base)?,
            api_root: parse_base(api_root)?,
            read_token,
            write_token,
            retry_delay: RETRY_DELAY,
        })
    }

    fn repo_url<'a>(
        &self,
        segments: impl IntoIterator<Item = &'a str>,
    ) -> Result<Url, GitHubError> {
        join_segments(&self.repo_base, segments)
    }

    fn request(&self, method: Method, url: Url, token: &str) -> RequestBuilder {
        self.request_as(method, url, token, ACCEPT_JSON)
    }

    fn request_as(&self, method: Method, url: Url, token: &str, accept: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .header("Authorization", format!("Bearer {token}"))
            .header("Accept", accept)
            .header("User-Agent", USER_AGENT)
    }

    /// Send, retrying once on a transient failure. Non-2xx becomes an error.
    async fn send(&self, build: impl Fn() -> RequestBuilder) -> Result<Response, GitHubError> {
        match self.send_once(build()).await {
            Err(e) if e.is_transient() => {
                tracing::warn!("GitHub request failed, retrying in {:?}: {e}", self.retry_delay);
                tokio::time::sleep(self.retry_delay).await;
                self.send_once(build()).await
            }
            other => other,
        }
    }

    async fn send_once(&self, request: RequestBuilder) -> Result<Response, GitHubError> {
        let resp = request.send().await?;
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status().as_u16();
        let url = resp.url().to_string();
        let body = resp.text().await.unwrap_or_default();
        Err(GitHubError::Status { status, url, body })
    }

    async fn get_pages<T>(&self, url: Url) -> Result<Vec<T>, GitHubError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let mut all = Vec::new();
        for page in 1.. {
            let mut page_url = url.clone();
            page_url
                .query_pairs_mut()
                .append_pair("per_page", &PER_PAGE.to_string())
                .append_pair("page", &page.to_string());

            let batch: Vec<T> = self
                .send(|| self.request(Method::GET, page_url.clone(), &self.read_token))
                .await?
                .json()
                .await?;
            let done = batch.len() < PER_PAGE;
            all.extend(batch);
            if done {
                break;
            }
        }
        Ok(all)
    }
}

fn parse_base(raw: &str) -> Result<Url, GitHubError> {
    let url = Url::parse(raw.trim_end_matches('/'))
        .map_err(|e| GitHubError::InvalidUrl(format!("{raw}: {e}")))?;
    if url.cannot_be_a_base() {
        return Err(GitHubError::InvalidUrl(raw.to_string()));
    }
    Ok(url)
}

/// Append path segments, percent-encoding each one.
fn join_segments<'a>(
    base: &Url,
    segments: impl IntoIterator<Item = &'a str>,
) -> Result<Url, GitHubError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| GitHubError::InvalidUrl(base.to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

#[async_trait]
impl PullRequestApi for GitHubClient {
    async fn base_sha(&self, pr_num: u64) -> Result<String, GitHubError> {
        let url = self.repo_url(["pulls", &pr_num.to_string()])?;
        let details: PullDetails = self
            .send(|| self.request(Method::GET, url.clone(), &self.read_token))
            .await?
            .json()
            .await?;
        Ok(details.base.sha)
    }

    async fn merge_base(&self, base: &str, head: &str) -> Result<String, GitHubError> {
        let url = self.repo_url(["compare", &format!("{base}...{head}")])?;
        let comparison: Comparison = self
            .send(|| self.request(Method::GET, url.clone(), &self.read_token))
            .await?
            .json()
            .await?;
        Ok(comparison.merge_base_commit.sha)
    }

    async fn changed_files(&self, pr_num: u64) -> Result<Vec<PullFile>, GitHubError> {
        let url = self.repo_url(["pulls", &pr_num.to_string(), "files"])?;
        self.get_pages(url).await
    }

    async fn file_content(&self, path: &str, git_ref: &str) -> Result<Option<String>, GitHubError> {
        let mut url = self.repo_url(std::iter::once("contents").chain(path.split('/')))?;
        url.query_pairs_mut().append_pair("ref", git_ref);

        let result = self
            .send(|| self.request_as(Method::GET, url.clone(), &self.read_token, ACCEPT_RAW))
            .await;

        match result {
            Ok(resp) => Ok(Some(resp.text().await?)),
            Err(GitHubError::Status { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn list_comments(&self, pr_num: u64) -> Result<Vec<LintComment>, GitHubError> {
        let url = self.repo_url(["issues", &pr_num.to_string(), "comments"])?;
        self.get_pages(url).await
    }

    async fn create_comment(&self, pr_num: u64, body: &str) -> Result<(), GitHubError> {
        let url = self.repo_url(["issues", &pr_num.to_string(), "comments"])?;
        let payload = serde_json::json!({ "body": body });
        self.send(|| self.request(Method::POST, url.clone(), &self.write_token).json(&payload))
            .await?;
        Ok(())
    }

    async fn update_comment(&self, comment_id: u64, body: &str) -> Result<(), GitHubError> {
        let url = self.repo_url(["issues", "comments", &comment_id.to_string()])?;
        let payload = serde_json::json!({ "body": body });
        self.send(|| self.request(Method::PATCH, url.clone(), &self.write_token).json(&payload))
            .await?;
        Ok(())
    }

    async fn set_status(&self, sha: &str, status: &CommitStatus) -> Result<(), GitHubError> {
        let url = self.repo_url(["statuses", sha])?;
        self.send(|| self.request(Method::POST, url.clone(), &self.write_token).json(status))
            .await?;
        Ok(())
    }

    async fn upload_log(&self, description: &str, log: &str) -> Result<String, GitHubError> {
        let url = join_segments(&self.api_root, ["gists"])?;
        let payload = serde_json::json!({
            "description": description,
            "public": false,
            "files": { "lint.log": { "content": log } },
        });
        let gist: Gist = self
            .send(|| self.request(Method::POST, url.clone(), &self.write_token).json(&payload))
            .await?
            .json()
            .await?;
        Ok(gist.html_url)
    }
}
