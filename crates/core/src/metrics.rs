//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Orchestrator (per-item outcomes, fallbacks, durations)
//! - Transfers (bytes, segments, stall aborts)
//! - Catalog crawling and connectivity

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Orchestrator
// =============================================================================

/// Items processed, by final outcome.
pub static ITEMS_PROCESSED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("reelsync_items_total", "Catalog items processed by outcome"),
        // "done", "error", "moved", "page_broken", "no_downloads",
        // "already_present", "skipped", "unresolved", "no_quality_match", "todo"
        &["outcome"],
    )
    .unwrap()
});

/// Direct downloads that fell back to the stream path.
pub static STREAM_FALLBACKS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "reelsync_stream_fallbacks_total",
        "Direct downloads that fell back to the stream path",
    )
    .unwrap()
});

/// Download duration in seconds.
pub static DOWNLOAD_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "reelsync_download_duration_seconds",
            "Duration of a single download attempt",
        )
        .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 300.0, 900.0, 1800.0, 3600.0]),
        &["path", "result"], // path: "direct" | "stream"; result: "ok" | "failed"
    )
    .unwrap()
});

// =============================================================================
// Transfers
// =============================================================================

/// Bytes written to disk by download path.
pub static BYTES_DOWNLOADED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("reelsync_bytes_downloaded_total", "Bytes written to disk"),
        &["path"],
    )
    .unwrap()
});

/// Stream segments fetched.
pub static SEGMENTS_FETCHED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "reelsync_segments_fetched_total",
        "Stream segments fetched",
    )
    .unwrap()
});

/// Direct downloads cancelled by the stall detector.
pub static STALL_ABORTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "reelsync_stall_aborts_total",
        "Direct downloads cancelled as stalled",
    )
    .unwrap()
});

// =============================================================================
// Catalog & connectivity
// =============================================================================

/// Catalog pages scanned through the renderer.
pub static CATALOG_PAGES_SCANNED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "reelsync_catalog_pages_scanned_total",
        "Catalog pages scanned",
    )
    .unwrap()
});

/// Connectivity waits that saw at least one failed probe.
pub static CONNECTIVITY_OUTAGES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "reelsync_connectivity_outages_total",
        "Connectivity waits that observed an outage",
    )
    .unwrap()
});

/// Failed reachability probes.
pub static PROBE_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "reelsync_probe_failures_total",
        "Failed reachability probes",
    )
    .unwrap()
});

/// Get all core metrics for registration.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Orchestrator
        Box::new(ITEMS_PROCESSED.clone()),
        Box::new(STREAM_FALLBACKS.clone()),
        Box::new(DOWNLOAD_DURATION.clone()),
        // Transfers
        Box::new(BYTES_DOWNLOADED.clone()),
        Box::new(SEGMENTS_FETCHED.clone()),
        Box::new(STALL_ABORTS.clone()),
        // Catalog & connectivity
        Box::new(CATALOG_PAGES_SCANNED.clone()),
        Box::new(CONNECTIVITY_OUTAGES.clone()),
        Box::new(PROBE_FAILURES.clone()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::Registry;

    #[test]
    fn test_all_metrics_register_cleanly() {
        let registry = Registry::new();
        for metric in all_metrics() {
            registry.register(metric).unwrap();
        }
        ITEMS_PROCESSED.with_label_values(&["done"]).inc();
        let names: Vec<_> = registry
            .gather()
            .iter()
            .map(|family| family.get_name().to_string())
            .collect();
        assert!(names.contains(&"reelsync_items_total".to_string()));
    }
}
