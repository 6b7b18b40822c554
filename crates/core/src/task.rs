//! Task lifecycle types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

use crate::error::{Error, Result};
use crate::filter::{FilterCriteria, PriceRange};
use crate::limits::{MAX_BRANDS_PER_SOURCE, MAX_LOCATION_LEN, MAX_TASK_NAME_LEN};
use crate::record::SalesRecord;

/// Unique task identifier, assigned at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for TaskId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| Error::validation(format!("invalid task id {:?}: {}", s, e)))
    }
}

/// Task lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether the lifecycle permits moving from `self` to `next`.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::InProgress)
                | (Self::InProgress, Self::Completed)
                | (Self::InProgress, Self::Failed)
                | (Self::Pending, Self::Failed)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(Error::internal(format!("unknown task status: {}", other))),
        }
    }
}

/// A submitted analysis request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub status: TaskStatus,
    pub filters: FilterCriteria,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Failure reason, present only when `status` is `failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Task {
    /// Creates a new pending task.
    pub fn new(name: impl Into<String>, filters: FilterCriteria) -> Self {
        let now = Utc::now();
        Self {
            id: TaskId::new(),
            name: name.into(),
            status: TaskStatus::Pending,
            filters,
            created_at: now,
            updated_at: now,
            error: None,
        }
    }
}

/// Incoming submission, as read from the batch input.
///
/// Validated once here; downstream code only sees the typed
/// [`FilterCriteria`].
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TaskSubmission {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub start_year: i32,
    pub end_year: i32,
    #[serde(default)]
    #[validate(length(max = 100))]
    pub source_a_brands: Vec<String>,
    #[serde(default)]
    #[validate(length(max = 100))]
    pub source_b_brands: Vec<String>,
    #[serde(default)]
    pub price_range: Option<PriceRange>,
    #[serde(default)]
    #[validate(length(max = 200))]
    pub location: Option<String>,
}

impl TaskSubmission {
    /// Validates the submission and splits it into a task name and criteria.
    ///
    /// An inverted year range is accepted; it simply matches nothing.
    pub fn into_parts(self) -> Result<(String, FilterCriteria)> {
        self.validate().map_err(|e| {
            let mut fields: Vec<String> = e.field_errors().keys().map(|k| k.to_string()).collect();
            fields.sort();
            let messages: Vec<String> = fields.iter().map(|f| limit_message(f)).collect();
            Error::validation(messages.join("; "))
        })?;

        if self.name.trim().is_empty() {
            return Err(Error::validation("name: must not be blank"));
        }

        let price_range = match self.price_range {
            Some(range) => {
                for (label, bound) in [("min", range.min), ("max", range.max)] {
                    if matches!(bound, Some(v) if !v.is_finite()) {
                        return Err(Error::validation(format!(
                            "price_range.{}: must be a finite number",
                            label
                        )));
                    }
                }
                if range.is_unbounded() {
                    None
                } else {
                    Some(range)
                }
            }
            None => None,
        };

        let location = self
            .location
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty());

        let criteria = FilterCriteria {
            start_year: self.start_year,
            end_year: self.end_year,
            source_a_brands: self.source_a_brands,
            source_b_brands: self.source_b_brands,
            price_range,
            location,
        };

        Ok((self.name, criteria))
    }
}

fn limit_message(field: &str) -> String {
    match field {
        "name" => format!("name: must be 1 to {} characters", MAX_TASK_NAME_LEN),
        "source_a_brands" | "source_b_brands" => {
            format!("{}: at most {} brands", field, MAX_BRANDS_PER_SOURCE)
        }
        "location" => format!("location: at most {} characters", MAX_LOCATION_LEN),
        other => format!("{}: invalid", other),
    }
}

/// Query-side view of a task and its persisted result set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskReport {
    #[serde(flatten)]
    pub task: Task,
    pub records: Vec<SalesRecord>,
}
