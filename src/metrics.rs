use anyhow::{Context, Result};
use axum::{extract::State, http::StatusCode, response::IntoResponse};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

use crate::web::AppState;

/// Initialize Prometheus metrics exporter
/// Returns a handle that can be used to render metrics for scraping
pub fn init_metrics() -> Result<PrometheusHandle> {
    PrometheusBuilder::new()
        // Webhook processing is mostly a single transaction, so buckets are in milliseconds
        .set_buckets_for_metric(
            Matcher::Full("webhook.processing_ms".to_string()),
            &[1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0],
        )
        .context("failed to set buckets for webhook.processing_ms")?
        .install_recorder()
        .context("failed to install Prometheus recorder")
}

/// Initialize ledger metrics to zero so they appear in Prometheus queries
/// even before the first request
pub fn initialize_ledger_metrics() {
    metrics::counter!("ledger.accounts.registered").absolute(0);
    metrics::counter!("ledger.credits.added").absolute(0);
    metrics::counter!("ledger.credits.used").absolute(0);
    metrics::counter!("ledger.credits.insufficient").absolute(0);

    metrics::counter!("webhook.received").absolute(0);
    metrics::counter!("webhook.ignored").absolute(0);
    metrics::counter!("webhook.already_processed").absolute(0);
    metrics::counter!("webhook.processed").absolute(0);
    metrics::counter!("webhook.failed").absolute(0);
    metrics::counter!("webhook.credits.granted").absolute(0);
}

/// GET /metrics
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()).into_response(),
        None => (StatusCode::NOT_FOUND, "Metrics are not enabled").into_response(),
    }
}
