//! Task queue configuration.

use serde::{Deserialize, Serialize};

/// Queue sizing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Maximum queued ids. `None` means unbounded, so submission is never
    /// rejected for capacity reasons.
    #[serde(default)]
    pub capacity: Option<usize>,
}

impl QueueConfig {
    pub fn unbounded() -> Self {
        Self { capacity: None }
    }

    pub fn bounded(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
        }
    }
}
