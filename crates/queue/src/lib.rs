//! FIFO hand-off of task identifiers between the submission path and the
//! worker loops.

pub mod config;
pub mod memory;

use async_trait::async_trait;
use engine_core::{Result, TaskId};

pub use config::QueueConfig;
pub use memory::InMemoryQueue;

/// Queue of task identifiers (never task bodies).
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Adds an id to the back of the queue. Never blocks.
    ///
    /// Fails with `Error::QueueFull` on a bounded queue at capacity and
    /// `Error::QueueClosed` after [`TaskQueue::close`].
    fn enqueue(&self, id: TaskId) -> Result<()>;

    /// Takes the id at the front, waiting until one is available.
    ///
    /// Returns `None` once the queue is closed and drained.
    async fn dequeue(&self) -> Option<TaskId>;

    /// Number of ids waiting.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stops accepting new ids. Already queued ids are still delivered.
    fn close(&self);
}
