//! # Client Metrics
//!
//! Purpose: Provide lightweight counters and a latency histogram so callers
//! can compute op rate, error rate, retry rate, and tail latency.
//!
//! ## Design Principles
//! 1. **Accumulator Pattern**: Atomic counters aggregate events cheaply.
//! 2. **Fixed Buckets**: Histogram buckets live in a contiguous array.
//! 3. **Zero-Cost Access**: Snapshots are plain structs without heap work
//!    beyond the bucket copy.
//!
//! ## Notes
//! - `Ordering::Relaxed` is sufficient: no cross-field ordering is needed,
//!   only eventual consistency of the counts.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Default latency bucket boundaries in microseconds, tuned for networked
/// operations rather than in-process calls.
pub const DEFAULT_LATENCY_BUCKETS_US: [u64; 12] = [
    100, 250, 500, 1_000, 2_500, 5_000, 10_000, 25_000, 50_000, 100_000, 250_000, 500_000,
];

/// Snapshot of all client metrics at a point in time.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    /// Total operations dispatched (each counted once, however many attempts).
    pub ops_total: u64,
    /// Operations that ultimately failed.
    pub errors_total: u64,
    /// Individual retry attempts across all operations.
    pub retries_total: u64,
    /// Latency histogram snapshot.
    pub latency: LatencySnapshot,
}

/// Snapshot of the latency histogram.
#[derive(Debug, Clone)]
pub struct LatencySnapshot {
    /// Bucket boundaries in microseconds.
    pub bounds_us: Vec<u64>,
    /// Bucket counts, including the overflow bucket at the end.
    pub buckets: Vec<u64>,
    /// Total number of samples.
    pub samples: u64,
    /// Sum of latencies in microseconds.
    pub sum_us: u64,
}

impl LatencySnapshot {
    /// Mean latency in microseconds, or 0 with no samples.
    pub fn mean_us(&self) -> u64 {
        if self.samples == 0 {
            0
        } else {
            self.sum_us / self.samples
        }
    }
}

/// Thread-safe metrics aggregator for the client.
pub(crate) struct ClientMetrics {
    ops_total: AtomicU64,
    errors_total: AtomicU64,
    retries_total: AtomicU64,
    latency: LatencyHistogram,
}

impl ClientMetrics {
    /// Creates an aggregator with the default latency buckets.
    pub(crate) fn new() -> Self {
        ClientMetrics {
            ops_total: AtomicU64::new(0),
            errors_total: AtomicU64::new(0),
            retries_total: AtomicU64::new(0),
            latency: LatencyHistogram::new(DEFAULT_LATENCY_BUCKETS_US.to_vec()),
        }
    }

    /// Records a completed operation and its end-to-end latency.
    pub(crate) fn record_op(&self, latency: Duration) {
        self.ops_total.fetch_add(1, Ordering::Relaxed);
        self.latency.record(latency);
    }

    /// Records an operation that ultimately failed.
    pub(crate) fn record_error(&self) {
        self.errors_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one retry attempt.
    pub(crate) fn record_retry(&self) {
        self.retries_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a snapshot of all counters and histogram buckets.
    pub(crate) fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            ops_total: self.ops_total.load(Ordering::Relaxed),
            errors_total: self.errors_total.load(Ordering::Relaxed),
            retries_total: self.retries_total.load(Ordering::Relaxed),
            latency: self.latency.snapshot(),
        }
    }
}

/// Fixed-bucket latency histogram.
///
/// Bucket selection is a linear scan; the list is small and stays hot in
/// cache.
struct LatencyHistogram {
    bounds_us: Vec<u64>,
    buckets: Vec<AtomicU64>,
    sum_us: AtomicU64,
    samples: AtomicU64,
}

impl LatencyHistogram {
    /// Creates a histogram with explicit bucket boundaries (microseconds,
    /// sorted ascending). The final bucket is the overflow bucket.
    fn new(bounds_us: Vec<u64>) -> Self {
        let buckets = (0..bounds_us.len() + 1).map(|_| AtomicU64::new(0)).collect();
        LatencyHistogram {
            bounds_us,
            buckets,
            sum_us: AtomicU64::new(0),
            samples: AtomicU64::new(0),
        }
    }

    /// Records one latency measurement.
    fn record(&self, latency: Duration) {
        let micros = latency.as_micros().min(u128::from(u64::MAX)) as u64;
        self.samples.fetch_add(1, Ordering::Relaxed);
        self.sum_us.fetch_add(micros, Ordering::Relaxed);

        let idx = self
            .bounds_us
            .iter()
            .position(|bound| micros <= *bound)
            .unwrap_or(self.bounds_us.len());
        self.buckets[idx].fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a point-in-time snapshot.
    fn snapshot(&self) -> LatencySnapshot {
        LatencySnapshot {
            bounds_us: self.bounds_us.clone(),
            buckets: self
                .buckets
                .iter()
                .map(|bucket| bucket.load(Ordering::Relaxed))
                .collect(),
            samples: self.samples.load(Ordering::Relaxed),
            sum_us: self.sum_us.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let metrics = ClientMetrics::new();
        metrics.record_op(Duration::from_micros(50));
        metrics.record_op(Duration::from_micros(150));
        metrics.record_retry();
        metrics.record_error();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.ops_total, 2);
        assert_eq!(snapshot.errors_total, 1);
        assert_eq!(snapshot.retries_total, 1);
        assert_eq!(snapshot.latency.samples, 2);
        assert_eq!(snapshot.latency.sum_us, 200);
        assert_eq!(snapshot.latency.mean_us(), 100);
    }

    #[test]
    fn test_histogram_bucket_selection() {
        let histogram = LatencyHistogram::new(vec![100, 1_000]);
        histogram.record(Duration::from_micros(50)); // bucket 0
        histogram.record(Duration::from_micros(100)); // bucket 0 (inclusive bound)
        histogram.record(Duration::from_micros(500)); // bucket 1
        histogram.record(Duration::from_micros(5_000)); // overflow

        let snapshot = histogram.snapshot();
        assert_eq!(snapshot.buckets, vec![2, 1, 1]);
        assert_eq!(snapshot.samples, 4);
    }

    #[test]
    fn test_empty_histogram_mean() {
        let metrics = ClientMetrics::new();
        assert_eq!(metrics.snapshot().latency.mean_us(), 0);
    }
}
