//! Sends a signed fake pull-request delivery, for checking a deployment end to end.

use crate::config::ServerConfig;
use crate::services::signature::{sign, SignatureFormat};

/// Minimal `pull_request` payload shaped like GitHub's.
pub fn payload(pr_num: u64, commit_sha: &str) -> Vec<u8> {
    serde_json::json!({
        "action": "opened",
        "number": pr_num,
        "pull_request": {
            "number": pr_num,
            "state": "open",
            "title": "test pr",
            "head": { "sha": commit_sha }
        }
    })
    .to_string()
    .into_bytes()
}

pub async fn send(
    config: &ServerConfig,
    url: &str,
    pr_num: u64,
    commit_sha: &str,
) -> anyhow::Result<reqwest::StatusCode> {
    let secret = config
        .shared_secret()
        .ok_or_else(|| anyhow::anyhow!("no shared secret configured; cannot sign a delivery"))?;

    let body = payload(pr_num, commit_sha);
    let header = sign(secret.as_bytes(), &body, config.signature_format)
        .ok_or_else(|| anyhow::anyhow!("could not key HMAC with the configured secret"))?;

    let resp = reqwest::Client::new()
        .post(url)
        .header("Content-Type", "application/json")
        .header("X-GitHub-Event", "pull_request")
        .header("X-Hub-Signature", header)
        .body(body)
        .send()
        .await?;

    tracing::info!(status = %resp.status(), "Test delivery sent");
    Ok(resp.status())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::event::{BuildRequest, PullRequestEvent};
    use crate::services::signature::verify;

    #[test]
    fn payload_parses_as_buildable_event() {
        let event = PullRequestEvent::parse(&payload(17, "beef")).unwrap();
        assert!(event.wants_build());
        assert_eq!(
            event.build_request(),
            Some(BuildRequest {
                pull_num: 17,
                pull_sha: "beef".into()
            })
        );
    }

    #[test]
    fn payload_signature_verifies() {
        let config = ServerConfig::from_json(r#"{"secret": "abc"}"#).unwrap();
        let body = payload(1, "sha");
        let header = sign(b"abc", &body, SignatureFormat::Hex).unwrap();
        let outcome = verify(
            config.shared_secret(),
            &body,
            Some(&header),
            config.signature_format,
        );
        assert!(outcome.is_valid());
    }

    #[tokio::test]
    async fn send_without_secret_fails_before_network() {
        let config = ServerConfig::default();
        let err = send(&config, "http://127.0.0.1:9/gh", 1, "sha").await.unwrap_err();
        assert!(err.to_string().contains("no shared secret"));
    }
}
