//! Core types, filter evaluation and the persistence boundary for the sales
//! task pipeline.

pub mod error;
pub mod filter;
pub mod limits;
pub mod record;
pub mod store;
pub mod task;

pub use error::{DbErrorCode, Error, QueueErrorCode, Result, SourceErrorCode};
pub use filter::*;
pub use record::*;
pub use store::*;
pub use task::*;
