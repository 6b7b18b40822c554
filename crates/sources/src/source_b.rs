//! Source B: a flat CSV table with a header row.

use async_trait::async_trait;
use engine_core::{Error, MalformedRow, NormalizedRecord, Result, SourceTag};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use crate::fields::{parse_price, read_resource, text_or_empty, DEFAULT_READ_TIMEOUT};
use crate::{DataSource, SourceBatch};

/// Raw Source B row.
///
/// Source B spells the fields `car_model` / `sale_date`; the Source A
/// spellings are accepted as aliases.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceBRow {
    pub company: String,
    #[serde(alias = "model")]
    pub car_model: String,
    #[serde(alias = "date_of_sale")]
    pub sale_date: String,
    pub price: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub customer_type: Option<String>,
}

impl SourceBRow {
    pub fn into_record(self) -> std::result::Result<NormalizedRecord, String> {
        let price = parse_price(&self.price)?;
        Ok(NormalizedRecord {
            company: self.company,
            model: self.car_model,
            sale_date: self.sale_date,
            price,
            location: text_or_empty(self.location),
            customer_type: text_or_empty(self.customer_type),
            source: SourceTag::B,
        })
    }
}

/// File-backed Source B adapter.
#[derive(Debug, Clone)]
pub struct CsvSource {
    path: PathBuf,
    timeout: Duration,
}

impl CsvSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Normalizes an already-read CSV document.
    pub fn parse(bytes: &[u8]) -> Result<SourceBatch> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(bytes);

        let headers = reader
            .headers()
            .map_err(|e| Error::source_unavailable(SourceTag::B, format!("unreadable header: {}", e)))?
            .clone();

        if headers.is_empty() {
            return Err(Error::source_unavailable(SourceTag::B, "missing header row"));
        }

        let mut batch = SourceBatch::new(SourceTag::B);
        for (index, row) in reader.records().enumerate() {
            let mapped = row
                .and_then(|r| r.deserialize::<SourceBRow>(Some(&headers)))
                .map_err(|e| e.to_string())
                .and_then(SourceBRow::into_record);

            match mapped {
                Ok(record) => batch.records.push(record),
                Err(reason) => {
                    let row = MalformedRow::new(SourceTag::B, index, reason);
                    let err = row.to_error();
                    warn!(row = index, code = err.error_code(), error = %err, "Skipping malformed row");
                    batch.malformed.push(row);
                }
            }
        }

        Ok(batch)
    }
}

#[async_trait]
impl DataSource for CsvSource {
    fn tag(&self) -> SourceTag {
        SourceTag::B
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn load(&self) -> Result<SourceBatch> {
        let bytes = read_resource(SourceTag::B, &self.path, self.timeout).await?;
        let batch = Self::parse(&bytes)?;

        debug!(
            path = %self.path.display(),
            records = batch.records.len(),
            malformed = batch.malformed.len(),
            "Loaded source B"
        );

        Ok(batch)
    }
}
