//! In-process pipeline metrics.
//!
//! All values are lock-free atomics so the hot paths (record filtering,
//! queue hand-off) never contend. The worker pool logs a [`MetricsSnapshot`]
//! on an interval; nothing is exported.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering::Relaxed};
use std::sync::LazyLock;
use std::time::Duration;

/// Monotonic count.
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub const fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }

    pub fn inc(&self) {
        self.inc_by(1);
    }

    pub fn inc_by(&self, n: u64) {
        self.value.fetch_add(n, Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Relaxed)
    }
}

/// Current level of something that rises and falls, never below zero.
#[derive(Debug, Default)]
pub struct Gauge {
    value: AtomicU64,
}

impl Gauge {
    pub const fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }

    pub fn set(&self, value: u64) {
        self.value.store(value, Relaxed);
    }

    pub fn inc(&self) {
        self.value.fetch_add(1, Relaxed);
    }

    pub fn dec(&self) {
        let _ = self
            .value
            .fetch_update(Relaxed, Relaxed, |v| Some(v.saturating_sub(1)));
    }

    pub fn get(&self) -> u64 {
        self.value.load(Relaxed)
    }
}

/// Upper bounds (ms) of the latency buckets. Larger samples land in a
/// trailing overflow bucket.
pub const LATENCY_BOUNDS_MS: [u64; 12] = [5, 10, 25, 50, 100, 250, 500, 1_000, 2_500, 5_000, 10_000, 30_000];

/// Bucketed latency distribution in milliseconds.
#[derive(Debug, Default)]
pub struct LatencyHistogram {
    buckets: [AtomicU64; LATENCY_BOUNDS_MS.len() + 1],
    total_ms: AtomicU64,
    samples: AtomicU64,
    max_ms: AtomicU64,
}

impl LatencyHistogram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&self, ms: u64) {
        let slot = LATENCY_BOUNDS_MS
            .iter()
            .position(|&bound| ms <= bound)
            .unwrap_or(LATENCY_BOUNDS_MS.len());
        self.buckets[slot].fetch_add(1, Relaxed);
        self.total_ms.fetch_add(ms, Relaxed);
        self.samples.fetch_add(1, Relaxed);
        self.max_ms.fetch_max(ms, Relaxed);
    }

    pub fn observe_duration(&self, elapsed: Duration) {
        self.observe(u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX));
    }

    pub fn samples(&self) -> u64 {
        self.samples.load(Relaxed)
    }

    /// Upper bound of the bucket holding the `q` quantile (0.0..=1.0).
    /// Samples in the overflow bucket report the largest value seen.
    pub fn quantile_ms(&self, q: f64) -> u64 {
        let samples = self.samples();
        if samples == 0 {
            return 0;
        }
        let rank = ((samples as f64) * q.clamp(0.0, 1.0)).ceil().max(1.0) as u64;

        let mut seen = 0;
        for (slot, bucket) in self.buckets.iter().enumerate() {
            seen += bucket.load(Relaxed);
            if seen >= rank {
                return LATENCY_BOUNDS_MS
                    .get(slot)
                    .copied()
                    .unwrap_or_else(|| self.max_ms.load(Relaxed));
            }
        }
        self.max_ms.load(Relaxed)
    }

    pub fn snapshot(&self) -> HistogramSnapshot {
        let samples = self.samples();
        let total = self.total_ms.load(Relaxed);
        HistogramSnapshot {
            samples,
            mean_ms: if samples == 0 {
                0.0
            } else {
                total as f64 / samples as f64
            },
            p50_ms: self.quantile_ms(0.50),
            p95_ms: self.quantile_ms(0.95),
            max_ms: self.max_ms.load(Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistogramSnapshot {
    pub samples: u64,
    pub mean_ms: f64,
    pub p50_ms: u64,
    pub p95_ms: u64,
    pub max_ms: u64,
}

#[derive(Debug, Default)]
pub struct Metrics {
    pub tasks_submitted: Counter,
    /// Submissions refused by validation or the queue
    pub tasks_rejected: Counter,
    pub tasks_started: Counter,
    pub tasks_completed: Counter,
    pub tasks_failed: Counter,
    /// Dequeued ids that were unknown or no longer pending
    pub tasks_dropped: Counter,

    pub records_loaded: Counter,
    pub records_accepted: Counter,
    pub records_rejected: Counter,
    pub records_malformed: Counter,

    pub source_failures: Counter,
    pub store_errors: Counter,

    pub task_latency_ms: LatencyHistogram,
    pub source_load_latency_ms: LatencyHistogram,
    pub persist_latency_ms: LatencyHistogram,

    pub queue_depth: Gauge,
    pub in_flight_tasks: Gauge,
    pub active_workers: Gauge,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            taken_at: Utc::now(),
            tasks_submitted: self.tasks_submitted.get(),
            tasks_rejected: self.tasks_rejected.get(),
            tasks_started: self.tasks_started.get(),
            tasks_completed: self.tasks_completed.get(),
            tasks_failed: self.tasks_failed.get(),
            tasks_dropped: self.tasks_dropped.get(),
            records_loaded: self.records_loaded.get(),
            records_accepted: self.records_accepted.get(),
            records_rejected: self.records_rejected.get(),
            records_malformed: self.records_malformed.get(),
            source_failures: self.source_failures.get(),
            store_errors: self.store_errors.get(),
            task_latency: self.task_latency_ms.snapshot(),
            source_load_latency: self.source_load_latency_ms.snapshot(),
            persist_latency: self.persist_latency_ms.snapshot(),
            queue_depth: self.queue_depth.get(),
            in_flight_tasks: self.in_flight_tasks.get(),
            active_workers: self.active_workers.get(),
        }
    }
}

/// Point-in-time copy of [`Metrics`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub taken_at: DateTime<Utc>,
    pub tasks_submitted: u64,
    pub tasks_rejected: u64,
    pub tasks_started: u64,
    pub tasks_completed: u64,
    pub tasks_failed: u64,
    pub tasks_dropped: u64,
    pub records_loaded: u64,
    pub records_accepted: u64,
    pub records_rejected: u64,
    pub records_malformed: u64,
    pub source_failures: u64,
    pub store_errors: u64,
    pub task_latency: HistogramSnapshot,
    pub source_load_latency: HistogramSnapshot,
    pub persist_latency: HistogramSnapshot,
    pub queue_depth: u64,
    pub in_flight_tasks: u64,
    pub active_workers: u64,
}

static METRICS: LazyLock<Metrics> = LazyLock::new(Metrics::new);

/// Process-wide metrics registry.
pub fn metrics() -> &'static Metrics {
    &METRICS
}
