//! Data source adapters for the sales task pipeline.
//!
//! Each adapter reads one physical format and maps its rows onto
//! [`NormalizedRecord`]:
//! - Source A (`JsonSource`): JSON array of objects
//! - Source B (`CsvSource`): CSV with a header row

pub mod config;
pub mod fields;
pub mod source_a;
pub mod source_b;

use async_trait::async_trait;
use engine_core::{MalformedRow, NormalizedRecord, Result, SourceTag};
use std::sync::Arc;

pub use config::SourcesConfig;
pub use source_a::{JsonSource, SourceARow};
pub use source_b::{CsvSource, SourceBRow};

/// Output of one adapter load.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceBatch {
    pub tag: SourceTag,
    /// Normalized rows in source order.
    pub records: Vec<NormalizedRecord>,
    /// Rows skipped because they could not be normalized.
    pub malformed: Vec<MalformedRow>,
}

impl SourceBatch {
    pub fn new(tag: SourceTag) -> Self {
        Self {
            tag,
            records: Vec::new(),
            malformed: Vec::new(),
        }
    }

    /// Total raw rows seen, including skipped ones.
    pub fn rows_seen(&self) -> usize {
        self.records.len() + self.malformed.len()
    }
}

/// A readable sales data source.
///
/// `load` fails with `Error::SourceUnavailable` when the backing resource
/// cannot be read at all; individual bad rows end up in
/// [`SourceBatch::malformed`].
#[async_trait]
pub trait DataSource: Send + Sync {
    fn tag(&self) -> SourceTag;

    /// Human-readable location, used in logs.
    fn describe(&self) -> String;

    async fn load(&self) -> Result<SourceBatch>;
}

/// Builds the file-backed adapters for both sources.
pub fn from_config(config: &SourcesConfig) -> (Arc<dyn DataSource>, Arc<dyn DataSource>) {
    let timeout = config.read_timeout();
    (
        Arc::new(JsonSource::new(&config.source_a_path).with_timeout(timeout)),
        Arc::new(CsvSource::new(&config.source_b_path).with_timeout(timeout)),
    )
}
