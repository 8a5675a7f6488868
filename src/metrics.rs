//! Process-wide counters for the engine.
//!
//! Plain atomics so the CLI can print a summary without a metrics backend.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use veil_blur::ScanReport;
use veil_classification::Verdict;

static SCAN_TOTAL: AtomicU64 = AtomicU64::new(0);
static SCAN_LAT_NS: AtomicU64 = AtomicU64::new(0);
static SCAN_LAT_SAMPLES: AtomicU64 = AtomicU64::new(0);
static NODES_SCANNED: AtomicU64 = AtomicU64::new(0);
static NODES_OBSTRUCTED: AtomicU64 = AtomicU64::new(0);

static VERDICT_UPDATES: AtomicU64 = AtomicU64::new(0);
static LOOKUP_FAILURES: AtomicU64 = AtomicU64::new(0);

static OVERLAY_UPDATES: AtomicU64 = AtomicU64::new(0);
static OVERLAY_INTENTS: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Copy, Serialize)]
pub struct MetricCounter {
    pub total: u64,
    pub avg_ms: f64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct MetricSnapshot {
    pub scans: MetricCounter,
    pub nodes_scanned: u64,
    pub nodes_obstructed: u64,
    /// Verdict changes announced by the cache after the initial seed.
    pub verdict_updates: u64,
    pub lookup_failures: u64,
    pub overlay_updates: u64,
    /// Pointer-downs that pre-obstructed the overlay.
    pub overlay_intents: u64,
}

pub fn record_scan(report: &ScanReport, duration: Duration) {
    SCAN_TOTAL.fetch_add(1, Ordering::Relaxed);
    NODES_SCANNED.fetch_add(report.scanned as u64, Ordering::Relaxed);
    NODES_OBSTRUCTED.fetch_add(report.obstructed as u64, Ordering::Relaxed);
    record_latency(&SCAN_LAT_NS, &SCAN_LAT_SAMPLES, duration);
}

pub fn record_verdict(verdict: Verdict) {
    VERDICT_UPDATES.fetch_add(1, Ordering::Relaxed);
    if verdict == Verdict::Failed {
        LOOKUP_FAILURES.fetch_add(1, Ordering::Relaxed);
    }
}

pub fn record_overlay_update() {
    OVERLAY_UPDATES.fetch_add(1, Ordering::Relaxed);
}

pub fn record_overlay_intent() {
    OVERLAY_INTENTS.fetch_add(1, Ordering::Relaxed);
}

pub fn snapshot() -> MetricSnapshot {
    MetricSnapshot {
        scans: make_counter(
            SCAN_TOTAL.load(Ordering::Relaxed),
            SCAN_LAT_NS.load(Ordering::Relaxed),
            SCAN_LAT_SAMPLES.load(Ordering::Relaxed),
        ),
        nodes_scanned: NODES_SCANNED.load(Ordering::Relaxed),
        nodes_obstructed: NODES_OBSTRUCTED.load(Ordering::Relaxed),
        verdict_updates: VERDICT_UPDATES.load(Ordering::Relaxed),
        lookup_failures: LOOKUP_FAILURES.load(Ordering::Relaxed),
        overlay_updates: OVERLAY_UPDATES.load(Ordering::Relaxed),
        overlay_intents: OVERLAY_INTENTS.load(Ordering::Relaxed),
    }
}

fn make_counter(total: u64, nanos: u64, samples: u64) -> MetricCounter {
    let avg_ms = if samples == 0 {
        0.0
    } else {
        (nanos as f64 / samples as f64) / 1_000_000.0
    };
    MetricCounter { total, avg_ms }
}

fn record_latency(total_ns: &AtomicU64, samples: &AtomicU64, duration: Duration) {
    let nanos = duration.as_nanos().min(u64::MAX as u128) as u64;
    total_ns.fetch_add(nanos, Ordering::Relaxed);
    samples.fetch_add(1, Ordering::Relaxed);
}
