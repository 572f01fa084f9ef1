//! HTTP routes — GitHub webhook and health check.

pub mod webhook;

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::services::bamboo_service::BuildTrigger;

/// Shared state for route handlers. Read-only for the life of the process.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub trigger: Arc<dyn BuildTrigger>,
}

impl AppState {
    pub fn new(config: ServerConfig, trigger: Arc<dyn BuildTrigger>) -> Self {
        Self {
            config: Arc::new(config),
            trigger,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/gh", post(webhook_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn webhook_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, webhook::WebhookError> {
    webhook::handle_webhook(&state, &headers, body).await
}

async fn health_handler() -> &'static str {
    "OK"
}
