//! Prometheus metrics for webhook relay observability.

use metrics::counter;

/// Initialize metrics exporter (Prometheus).
pub fn init_metrics() {
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    if let Err(e) = builder.install() {
        tracing::warn!("Failed to install Prometheus exporter: {}", e);
    }
}

/// Record a verified webhook. The header value is folded into a fixed label set.
pub fn webhook_received(event_type: &str) {
    counter!("pr_feedback_webhooks_received_total", "event" => event_label(event_type))
        .increment(1);
}

fn event_label(event_type: &str) -> &'static str {
    match event_type {
        "pull_request" => "pull_request",
        "ping" => "ping",
        _ => "other",
    }
}

/// Record a rejected delivery. `reason` is a fixed label, never request data.
pub fn webhook_rejected(reason: &'static str) {
    counter!("pr_feedback_webhooks_rejected_total", "reason" => reason).increment(1);
}

/// Record the outcome of a Bamboo queue request.
pub fn build_triggered(outcome: &'static str) {
    counter!("pr_feedback_builds_triggered_total", "outcome" => outcome).increment(1);
}
