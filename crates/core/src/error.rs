//! Unified error types for the sales task pipeline.
//!
//! Error codes:
//! - SRC_001-002: Data source errors
//! - TASK_001: Task lookup errors
//! - QUEUE_001-002: Task queue errors
//! - VALID_001: Submission validation errors
//! - DB_001-002: Persistence errors

use thiserror::Error;

use crate::record::SourceTag;
use crate::task::TaskId;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Data source error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceErrorCode {
    /// SRC_001: Backing resource cannot be read at all
    Unavailable,
    /// SRC_002: A single row failed normalization
    Malformed,
}

impl SourceErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unavailable => "SRC_001",
            Self::Malformed => "SRC_002",
        }
    }
}

/// Queue error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueErrorCode {
    /// QUEUE_001: Bounded queue is at capacity
    Full,
    /// QUEUE_002: Queue no longer accepts items
    Closed,
}

impl QueueErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Full => "QUEUE_001",
            Self::Closed => "QUEUE_002",
        }
    }
}

/// Database error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbErrorCode {
    /// DB_001: Failed to write tasks or records
    StoreFailed,
    /// DB_002: Failed to read tasks or records
    QueryFailed,
}

impl DbErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::StoreFailed => "DB_001",
            Self::QueryFailed => "DB_002",
        }
    }
}

/// Unified error type for the pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// A data source could not be read; fatal to the task.
    #[error("[SRC_001] source {tag} unavailable: {reason}")]
    SourceUnavailable { tag: SourceTag, reason: String },

    /// A single row could not be normalized; the row is skipped.
    #[error("[SRC_002] malformed record from source {tag}: {reason}")]
    RecordMalformed { tag: SourceTag, reason: String },

    #[error("[TASK_001] task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("[QUEUE_001] task queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },

    #[error("[QUEUE_002] task queue is closed")]
    QueueClosed,

    /// Database error with code.
    #[error("[{code}] {message}")]
    Database { code: &'static str, message: String },

    #[error("[VALID_001] validation error: {0}")]
    Validation(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn source_unavailable(tag: SourceTag, reason: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            tag,
            reason: reason.into(),
        }
    }

    pub fn record_malformed(tag: SourceTag, reason: impl Into<String>) -> Self {
        Self::RecordMalformed {
            tag,
            reason: reason.into(),
        }
    }

    /// Create a database error.
    pub fn database(code: DbErrorCode, msg: impl Into<String>) -> Self {
        Self::Database {
            code: code.code(),
            message: msg.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Get the error code if this is a coded error.
    pub fn error_code(&self) -> Option<&'static str> {
        match self {
            Self::SourceUnavailable { .. } => Some(SourceErrorCode::Unavailable.code()),
            Self::RecordMalformed { .. } => Some(SourceErrorCode::Malformed.code()),
            Self::TaskNotFound(_) => Some("TASK_001"),
            Self::QueueFull { .. } => Some(QueueErrorCode::Full.code()),
            Self::QueueClosed => Some(QueueErrorCode::Closed.code()),
            Self::Database { code, .. } => Some(code),
            Self::Validation(_) => Some("VALID_001"),
            _ => None,
        }
    }

    /// Whether the error should be reported back to the submitter rather than
    /// recorded against a task.
    pub fn is_submission_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::QueueFull { .. } | Self::QueueClosed
        )
    }
}
