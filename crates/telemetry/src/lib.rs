//! Process-local telemetry for the sales task pipeline.
//!
//! Counters and gauges live in a global registry that the worker pool logs
//! periodically; there is no external metrics exporter.

pub mod health;
pub mod metrics;
pub mod tracing_setup;

pub use health::*;
pub use metrics::*;
pub use tracing_setup::*;
