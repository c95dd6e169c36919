//! Prometheus metrics

use crate::operation::OperationKind;
use anyhow::Result;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Install a Prometheus recorder
/// Returns a handle that can be used to render the collected metrics
pub fn setup_metrics() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus recorder: {}", e))?;

    tracing::info!("Prometheus metrics recorder installed");

    Ok(handle)
}

/// Record a finished operation
pub fn record_operation(kind: OperationKind, ok: bool, elapsed: Duration) {
    let outcome = if ok { "success" } else { "failure" };
    metrics::counter!("omm_operations_total",
        "operation" => kind.as_str(),
        "outcome" => outcome
    )
    .increment(1);
    metrics::histogram!("omm_operation_duration_seconds",
        "operation" => kind.as_str()
    )
    .record(elapsed.as_secs_f64());
}

/// Record an operation displaced by a newer one ("stopped" or "terminated")
pub fn record_operation_displaced(mode: &'static str) {
    metrics::counter!("omm_operations_displaced_total", "mode" => mode).increment(1);
}

/// Record a cancelled operation
pub fn record_operation_cancelled(kind: OperationKind) {
    metrics::counter!("omm_operations_cancelled_total",
        "operation" => kind.as_str()
    )
    .increment(1);
}

/// Update the size of the last refreshed inventory
pub fn update_models_listed(count: usize) {
    metrics::gauge!("omm_models_listed").set(count as f64);
}
