//! Background processing for the sales task pipeline.
//!
//! - [`merge`]: loads both sources and applies a task's filter criteria
//! - [`processor`]: drives one task through its lifecycle
//! - [`scheduler`]: pool of worker loops over the task queue
//! - [`service`]: submission, query and startup recovery

pub mod merge;
pub mod processor;
pub mod scheduler;
pub mod service;

pub use merge::{MergeEngine, MergeOutcome, MergeStats, SourceStats};
pub use processor::{InFlightGuard, InFlightRegistry, ProcessOutcome, SkipReason, TaskProcessor};
pub use scheduler::{WorkerConfig, WorkerPool};
pub use service::{RecoveryReport, TaskService, INTERRUPTED_REASON};
