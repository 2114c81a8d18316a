//! Metrics collection and Prometheus export.
//!
//! Initializes the metrics exporter and provides the /metrics endpoint handler.

use crate::services::providers::FinishReason;
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use service_core::error::AppError;
use std::sync::OnceLock;
use std::time::Duration;

/// Global handle to the Prometheus recorder.
pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the metrics recorder.
///
/// Must be called once at startup before any metrics are recorded.
pub fn init_metrics() -> Result<(), AppError> {
    let handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
        AppError::ConfigError(anyhow::anyhow!("Failed to install Prometheus recorder: {}", e))
    })?;

    METRICS_HANDLE.set(handle).map_err(|_| {
        AppError::ConfigError(anyhow::anyhow!("Metrics handle already initialized"))
    })
}

/// Get the current metrics in Prometheus text format.
///
/// Returns a string suitable for the /metrics HTTP endpoint.
pub fn get_metrics() -> String {
    METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized".to_string())
}

/// Record the outcome of one describe call.
pub fn record_description(model: &str, outcome: &'static str, elapsed: Duration) {
    counter!(
        "vision_descriptions_total",
        "model" => model.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    histogram!(
        "vision_completion_duration_seconds",
        "model" => model.to_string()
    )
    .record(elapsed.as_secs_f64());
}

/// Record token usage reported by the provider.
pub fn record_tokens(model: &str, input_tokens: u32, output_tokens: u32) {
    counter!("vision_tokens_total", "model" => model.to_string(), "type" => "input")
        .increment(u64::from(input_tokens));
    counter!("vision_tokens_total", "model" => model.to_string(), "type" => "output")
        .increment(u64::from(output_tokens));
}

/// Record why the provider stopped generating.
pub fn record_finish_reason(model: &str, finish_reason: FinishReason) {
    counter!(
        "vision_finish_reasons_total",
        "model" => model.to_string(),
        "reason" => finish_reason.as_str()
    )
    .increment(1);
}
