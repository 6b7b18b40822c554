//! Ingestion merge engine: load both sources, filter, concatenate.

use engine_core::{evaluate, Error, NormalizedRecord, Result, SourceTag, Task, Verdict};
use serde::{Deserialize, Serialize};
use sources::{DataSource, SourceBatch};
use std::sync::Arc;
use std::time::Instant;
use telemetry::{health, metrics};
use tracing::{debug, warn};

/// Per-source record counts for one merge pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceStats {
    /// Raw rows seen, including malformed ones
    pub loaded: usize,
    pub accepted: usize,
    pub rejected: usize,
    /// Rows skipped by the adapter or by the year check
    pub malformed: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeStats {
    pub source_a: SourceStats,
    pub source_b: SourceStats,
}

impl MergeStats {
    pub fn accepted(&self) -> usize {
        self.source_a.accepted + self.source_b.accepted
    }

    pub fn malformed(&self) -> usize {
        self.source_a.malformed + self.source_b.malformed
    }
}

/// Accepted records, A before B, each in adapter order.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub records: Vec<NormalizedRecord>,
    pub stats: MergeStats,
}

/// Reconciles Source A and Source B into one filtered record set.
pub struct MergeEngine {
    source_a: Arc<dyn DataSource>,
    source_b: Arc<dyn DataSource>,
}

impl MergeEngine {
    pub fn new(source_a: Arc<dyn DataSource>, source_b: Arc<dyn DataSource>) -> Self {
        Self { source_a, source_b }
    }

    /// Loads both sources concurrently and keeps the records matching the
    /// task's criteria.
    ///
    /// If either source is unavailable the whole pass fails with that
    /// source's error (A is reported first when both fail) and no records
    /// are returned.
    pub async fn process(&self, task: &Task) -> Result<MergeOutcome> {
        let (a, b) = tokio::join!(
            load_source(self.source_a.as_ref()),
            load_source(self.source_b.as_ref())
        );
        let (a, b) = (a?, b?);

        let mut records = Vec::new();
        let stats = MergeStats {
            source_a: filter_batch(task, a, &mut records),
            source_b: filter_batch(task, b, &mut records),
        };

        let m = metrics();
        for s in [&stats.source_a, &stats.source_b] {
            m.records_loaded.inc_by(s.loaded as u64);
            m.records_accepted.inc_by(s.accepted as u64);
            m.records_rejected.inc_by(s.rejected as u64);
            m.records_malformed.inc_by(s.malformed as u64);
        }

        debug!(
            task_id = %task.id,
            accepted_a = stats.source_a.accepted,
            accepted_b = stats.source_b.accepted,
            malformed = stats.malformed(),
            "Merged sources"
        );

        Ok(MergeOutcome { records, stats })
    }
}

async fn load_source(source: &dyn DataSource) -> Result<SourceBatch> {
    let started = Instant::now();
    let result = source.load().await;
    metrics()
        .source_load_latency_ms
        .observe_duration(started.elapsed());

    let component = match source.tag() {
        SourceTag::A => &health().source_a,
        SourceTag::B => &health().source_b,
    };
    match &result {
        Ok(_) => component.record_success(),
        Err(e) => {
            metrics().source_failures.inc();
            component.record_failure(e.to_string());
            warn!(source = %source.tag(), location = %source.describe(), error = %e, "Source unavailable");
        }
    }
    result
}

fn filter_batch(task: &Task, batch: SourceBatch, out: &mut Vec<NormalizedRecord>) -> SourceStats {
    let mut stats = SourceStats {
        loaded: batch.rows_seen(),
        malformed: batch.malformed.len(),
        ..Default::default()
    };

    for record in batch.records {
        match evaluate(&record, &task.filters) {
            Verdict::Accepted => {
                stats.accepted += 1;
                out.push(record);
            }
            Verdict::Rejected => stats.rejected += 1,
            Verdict::Malformed(reason) => {
                stats.malformed += 1;
                let err = Error::record_malformed(batch.tag, reason);
                warn!(task_id = %task.id, code = err.error_code(), error = %err, "Skipping record");
            }
        }
    }
    stats
}
