//! Metrics — lock-free driver counters.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use serde::Serialize;

/// Counters updated on the ingestion and export hot paths.
///
/// All operations are `Relaxed`: the values are reported, never used for
/// synchronisation.
#[derive(Debug, Default)]
pub struct DriverMetrics {
    /// Gauge: ingestion loops currently running
    pub active_ingestions: AtomicI64,
    pub entries_ingested: AtomicU64,
    pub decode_failures: AtomicU64,
    pub exports_started: AtomicU64,
    pub exports_aborted: AtomicU64,
    pub entries_exported: AtomicU64,
}

/// Serializable copy of [`DriverMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub active_ingestions: i64,
    pub entries_ingested: u64,
    pub decode_failures: u64,
    pub exports_started: u64,
    pub exports_aborted: u64,
    pub entries_exported: u64,
}

impl DriverMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_ingested(&self) {
        self.entries_ingested.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_export_started(&self) {
        self.exports_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_export_aborted(&self) {
        self.exports_aborted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_exported(&self) {
        self.entries_exported.fetch_add(1, Ordering::Relaxed);
    }

    /// Bump the active-ingestion gauge; it drops back when the guard does.
    pub fn ingestion_guard(&self) -> IngestionGuard<'_> {
        self.active_ingestions.fetch_add(1, Ordering::Relaxed);
        IngestionGuard { metrics: self }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            active_ingestions: self.active_ingestions.load(Ordering::Relaxed),
            entries_ingested: self.entries_ingested.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            exports_started: self.exports_started.load(Ordering::Relaxed),
            exports_aborted: self.exports_aborted.load(Ordering::Relaxed),
            entries_exported: self.entries_exported.load(Ordering::Relaxed),
        }
    }
}

/// Holds one unit of the active-ingestion gauge.
#[derive(Debug)]
pub struct IngestionGuard<'a> {
    metrics: &'a DriverMetrics,
}

impl Drop for IngestionGuard<'_> {
    fn drop(&mut self) {
        self.metrics.active_ingestions.fetch_sub(1, Ordering::Relaxed);
    }
}
