//! Source A: a JSON array of sale objects.

use async_trait::async_trait;
use engine_core::{Error, MalformedRow, NormalizedRecord, Result, SourceTag};
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use crate::fields::{coerce_price, read_resource, text_or_empty, DEFAULT_READ_TIMEOUT};
use crate::{DataSource, SourceBatch};

/// Raw Source A row.
///
/// Source A spells the fields `model` / `date_of_sale`; the Source B
/// spellings are accepted as aliases.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceARow {
    pub company: String,
    #[serde(alias = "car_model")]
    pub model: String,
    #[serde(alias = "sale_date")]
    pub date_of_sale: String,
    pub price: Value,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub customer_type: Option<String>,
}

impl SourceARow {
    pub fn into_record(self) -> std::result::Result<NormalizedRecord, String> {
        let price = coerce_price(&self.price)?;
        Ok(NormalizedRecord {
            company: self.company,
            model: self.model,
            sale_date: self.date_of_sale,
            price,
            location: text_or_empty(self.location),
            customer_type: text_or_empty(self.customer_type),
            source: SourceTag::A,
        })
    }
}

/// File-backed Source A adapter.
#[derive(Debug, Clone)]
pub struct JsonSource {
    path: PathBuf,
    timeout: Duration,
}

impl JsonSource {
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

    /// Normalizes an already-read JSON document.
    pub fn parse(bytes: &[u8]) -> Result<SourceBatch> {
        let rows: Vec<Value> = serde_json::from_slice(bytes).map_err(|e| {
            Error::source_unavailable(SourceTag::A, format!("not a JSON array of objects: {}", e))
        })?;

        let mut batch = SourceBatch::new(SourceTag::A);
        for (index, raw) in rows.into_iter().enumerate() {
            let mapped = serde_json::from_value::<SourceARow>(raw)
                .map_err(|e| e.to_string())
                .and_then(SourceARow::into_record);

            match mapped {
                Ok(record) => batch.records.push(record),
                Err(reason) => {
                    let row = MalformedRow::new(SourceTag::A, index, reason);
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
impl DataSource for JsonSource {
    fn tag(&self) -> SourceTag {
        SourceTag::A
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn load(&self) -> Result<SourceBatch> {
        let bytes = read_resource(SourceTag::A, &self.path, self.timeout).await?;
        let batch = Self::parse(&bytes)?;

        debug!(
            path = %self.path.display(),
            records = batch.records.len(),
            malformed = batch.malformed.len(),
            "Loaded source A"
        );

        Ok(batch)
    }
}
