//! Bamboo integration — queue a plan build for a pull request.

use async_trait::async_trait;
use reqwest::Url;
use thiserror::Error;

use crate::config::CiCredentials;
use crate::models::event::BuildRequest;

#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("invalid Bamboo URL: {0}")]
    InvalidUrl(String),
    #[error("Bamboo request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Bamboo rejected the build request: {status} {body}")]
    Rejected { status: u16, body: String },
}

/// Something that can start a CI build for a pull request.
#[async_trait]
pub trait BuildTrigger: Send + Sync {
    async fn queue_build(
        &self,
        credentials: &CiCredentials,
        request: &BuildRequest,
    ) -> Result<(), TriggerError>;
}

/// Build the queue endpoint with every plan variable URL-encoded.
pub fn queue_url(credentials: &CiCredentials, request: &BuildRequest) -> Result<Url, TriggerError> {
    let base = format!("https://{}:{}/", credentials.host, credentials.port);
    let mut url = Url::parse(&base).map_err(|e| TriggerError::InvalidUrl(format!("{base}: {e}")))?;

    url.path_segments_mut()
        .map_err(|_| TriggerError::InvalidUrl(base.clone()))?
        .pop_if_empty()
        .extend(["builds", "rest", "api", "latest", "queue", credentials.plan.as_str()]);

    url.query_pairs_mut()
        .append_pair("os_authType", "basic")
        .append_pair("bamboo.variable.pull_num", &request.pull_num.to_string())
        .append_pair("bamboo.variable.pull_sha", &request.pull_sha);

    Ok(url)
}

pub struct BambooClient {
    http: reqwest::Client,
}

impl BambooClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }
}

impl Default for BambooClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BuildTrigger for BambooClient {
    async fn queue_build(
        &self,
        credentials: &CiCredentials,
        request: &BuildRequest,
    ) -> Result<(), TriggerError> {
        let url = queue_url(credentials, request)?;

        let resp = self
            .http
            .post(url)
            .basic_auth(&credentials.user, Some(&credentials.password))
            .header("Accept", "application/json")
            .header("User-Agent", "pr-feedback-server")
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(TriggerError::Rejected { status, body });
        }

        tracing::info!(
            plan = %credentials.plan,
            pull_num = request.pull_num,
            pull_sha = %request.pull_sha,
            "Bamboo build queued"
        );
        Ok(())
    }
}
