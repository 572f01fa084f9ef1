//! GitHub webhook handler — verifies the delivery, then queues a Bamboo build.

use axum::body::Bytes;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use super::AppState;
use crate::models::event::PullRequestEvent;
use crate::services::bamboo_service::TriggerError;
use crate::services::signature;

/// Header name for GitHub event type.
pub const HEADER_EVENT: &str = "x-github-event";
/// Header name for the HMAC-SHA1 signature.
pub const HEADER_SIGNATURE: &str = "x-hub-signature";

#[derive(Debug, Error)]
pub enum WebhookError {
    /// The cause is logged by the verifier and deliberately not in the message.
    #[error("unauthorized")]
    SignatureInvalid,

    #[error("invalid JSON body: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    #[error("payload has no pull request number or head sha")]
    MissingPullRequest,

    #[error("CI server is not configured")]
    ConfigMissing,

    #[error("CI server did not accept the build")]
    Upstream(#[from] TriggerError),
}

impl WebhookError {
    fn metric_label(&self) -> &'static str {
        match self {
            WebhookError::SignatureInvalid => "signature",
            WebhookError::MalformedPayload(_) => "malformed_payload",
            WebhookError::MissingPullRequest => "missing_pull_request",
            WebhookError::ConfigMissing => "config_missing",
            WebhookError::Upstream(_) => "upstream",
        }
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        crate::metrics::webhook_rejected(self.metric_label());
        let status = match &self {
            WebhookError::SignatureInvalid => StatusCode::UNAUTHORIZED,
            WebhookError::MalformedPayload(_) | WebhookError::MissingPullRequest => {
                StatusCode::BAD_REQUEST
            }
            WebhookError::ConfigMissing => StatusCode::SERVICE_UNAVAILABLE,
            WebhookError::Upstream(_) => StatusCode::BAD_GATEWAY,
        };
        (status, self.to_string()).into_response()
    }
}

/// Handle an incoming GitHub webhook payload.
pub async fn handle_webhook(
    state: &AppState,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<StatusCode, WebhookError> {
    let config = &state.config;

    let provided = headers
        .get(HEADER_SIGNATURE)
        .and_then(|v| v.to_str().ok());

    let verification = signature::verify(
        config.shared_secret(),
        &body,
        provided,
        config.signature_format,
    );
    if !verification.is_valid() {
        tracing::debug!(reason = verification.reason(), "Webhook rejected");
        return Err(WebhookError::SignatureInvalid);
    }

    let event_type = headers
        .get(HEADER_EVENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("pull_request");
    crate::metrics::webhook_received(event_type);

    match event_type {
        "ping" => {
            tracing::info!("Received GitHub ping webhook");
            return Ok(StatusCode::OK);
        }
        "pull_request" => {}
        other => {
            tracing::debug!("Ignoring webhook event: {}", other);
            return Ok(StatusCode::OK);
        }
    }

    let event = PullRequestEvent::parse(&body).map_err(|e| {
        tracing::warn!("Received invalid JSON: {e}");
        WebhookError::MalformedPayload(e)
    })?;

    if !event.wants_build() {
        tracing::debug!(action = ?event.action, "Ignoring pull request action");
        return Ok(StatusCode::OK);
    }

    let request = event.build_request().ok_or_else(|| {
        tracing::warn!("Pull request payload is missing its number or head sha");
        WebhookError::MissingPullRequest
    })?;

    let credentials = config.ci_credentials().ok_or_else(|| {
        tracing::error!(
            pull_num = request.pull_num,
            "Bamboo settings incomplete, cannot queue build"
        );
        WebhookError::ConfigMissing
    })?;

    match state.trigger.queue_build(&credentials, &request).await {
        Ok(()) => {
            crate::metrics::build_triggered("queued");
            Ok(StatusCode::ACCEPTED)
        }
        Err(e) => {
            crate::metrics::build_triggered("failed");
            tracing::error!(pull_num = request.pull_num, "Failed to queue Bamboo build: {e}");
            Err(WebhookError::Upstream(e))
        }
    }
}
