//! Canonical sales record shapes shared by adapters, evaluator and stores.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::task::TaskId;

/// Originating data source of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceTag {
    A,
    B,
}

impl SourceTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
        }
    }
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceTag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A" => Ok(Self::A),
            "B" => Ok(Self::B),
            other => Err(Error::internal(format!("unknown source tag: {}", other))),
        }
    }
}

/// One sales event after adapter mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub company: String,
    pub model: String,
    /// ISO-like date; the first four characters are the year.
    pub sale_date: String,
    pub price: f64,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub customer_type: String,
    pub source: SourceTag,
}

impl NormalizedRecord {
    /// Year encoded in the leading four characters of `sale_date`.
    pub fn sale_year(&self) -> Option<i32> {
        self.sale_date.get(..4)?.parse().ok()
    }
}

/// A record persisted as part of a task's result set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesRecord {
    pub task_id: TaskId,
    /// Position within the task's result set.
    pub seq: u32,
    #[serde(flatten)]
    pub record: NormalizedRecord,
}

/// A raw row that failed normalization and was skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MalformedRow {
    pub source: SourceTag,
    /// Zero-based row index within the source.
    pub row: usize,
    pub reason: String,
}

impl MalformedRow {
    pub fn new(source: SourceTag, row: usize, reason: impl Into<String>) -> Self {
        Self {
            source,
            row,
            reason: reason.into(),
        }
    }

    /// The `SRC_002` error describing this row.
    pub fn to_error(&self) -> Error {
        Error::record_malformed(self.source, format!("row {}: {}", self.row, self.reason))
    }
}
