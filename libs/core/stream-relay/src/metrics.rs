//! Prometheus metrics for the relay core.
//!
//! Counters and histograms go through the `metrics` facade; the recorder is
//! installed once per process and rendered by the `/metrics` endpoint.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use std::time::Duration;
use tracing::info;

static PROMETHEUS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Initialize the Prometheus recorder.
///
/// Call this once at startup. Subsequent calls are no-ops.
pub fn init_metrics() {
    let _ = PROMETHEUS_HANDLE.get_or_init(|| {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .expect("Failed to install Prometheus recorder");
        info!("Prometheus metrics initialized");
        handle
    });
}

/// Get the Prometheus handle for rendering metrics
pub fn prometheus_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

/// Render metrics in Prometheus exposition format
pub fn render_metrics() -> String {
    prometheus_handle().map(|h| h.render()).unwrap_or_default()
}

/// A full buffer evicted its oldest entry to admit a new one.
pub(crate) fn record_buffer_discard() {
    counter!("relay_buffer_discarded_total").increment(1);
}

/// A non-empty batch left the buffer; `wire_bytes` is the base64-inflated
/// size estimate.
pub(crate) fn record_batch_assembled(len: usize, wire_bytes: usize) {
    counter!("relay_messages_published_total").increment(len as u64);
    histogram!("relay_published_bytes_estimate").record(wire_bytes as f64);
}

/// One sink call completed successfully.
pub(crate) fn record_publish_duration(duration: Duration) {
    histogram!("relay_publish_duration_seconds").record(duration.as_secs_f64());
}

/// A transient failure triggered a backoff wait.
pub(crate) fn record_backoff() {
    counter!("relay_backoff_total").increment(1);
}

/// A batch was abandoned after exhausting its retry budget.
pub(crate) fn record_giveup() {
    counter!("relay_giveup_total").increment(1);
}

/// The worker loop swallowed an error it could not classify.
pub(crate) fn record_worker_error() {
    counter!("relay_worker_errors_total").increment(1);
}
