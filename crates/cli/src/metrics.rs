//! Prometheus metrics for a single run.
//!
//! The run-level gauges live here; everything the core counts is pulled in
//! through `reelsync_core::metrics::all_metrics()`. The exposition is written
//! to a file at the end of a run for a textfile collector to pick up.

use once_cell::sync::Lazy;
use prometheus::{self, Encoder, Gauge, IntGauge, Registry, TextEncoder};
use tracing::warn;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// Wall-clock duration of the last run.
pub static RUN_DURATION: Lazy<Gauge> = Lazy::new(|| {
    Gauge::new(
        "reelsync_run_duration_seconds",
        "Duration of the last run in seconds",
    )
    .unwrap()
});

/// Exit code of the last run.
pub static RUN_EXIT_CODE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("reelsync_run_exit_code", "Process exit code of the last run").unwrap()
});

/// Unix time the last run finished.
pub static RUN_FINISHED: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "reelsync_run_finished_timestamp_seconds",
        "Unix timestamp at which the last run finished",
    )
    .unwrap()
});

/// Records left in a non-DONE state after the run.
pub static PENDING_REVIEW: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "reelsync_pending_review",
        "Status records not in DONE at the end of the run",
    )
    .unwrap()
});

fn register_metrics(registry: &Registry) {
    let run: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(RUN_DURATION.clone()),
        Box::new(RUN_EXIT_CODE.clone()),
        Box::new(RUN_FINISHED.clone()),
        Box::new(PENDING_REVIEW.clone()),
    ];

    // Core metrics (orchestrator, transfers, crawl, connectivity)
    for metric in run.into_iter().chain(reelsync_core::metrics::all_metrics()) {
        if let Err(e) = registry.register(metric) {
            warn!("Failed to register metric: {}", e);
        }
    }
}

/// Encode all metrics as Prometheus text format.
pub fn render() -> anyhow::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
