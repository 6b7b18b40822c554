//! In-process FIFO queue over a tokio mpsc channel.
//!
//! The single receiver sits behind an async mutex so any number of worker
//! loops can share it; each id is handed to exactly one of them.

use async_trait::async_trait;
use engine_core::{Error, Result, TaskId};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use telemetry::metrics;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::debug;

use crate::{QueueConfig, TaskQueue};

enum Sender {
    Unbounded(mpsc::UnboundedSender<TaskId>),
    Bounded(mpsc::Sender<TaskId>),
}

enum Receiver {
    Unbounded(mpsc::UnboundedReceiver<TaskId>),
    Bounded(mpsc::Receiver<TaskId>),
}

impl Receiver {
    async fn recv(&mut self) -> Option<TaskId> {
        match self {
            Self::Unbounded(rx) => rx.recv().await,
            Self::Bounded(rx) => rx.recv().await,
        }
    }
}

/// FIFO queue of task ids held in memory.
pub struct InMemoryQueue {
    /// `None` once closed
    sender: Mutex<Option<Sender>>,
    receiver: tokio::sync::Mutex<Receiver>,
    depth: AtomicUsize,
    capacity: Option<usize>,
}

impl InMemoryQueue {
    /// Creates a queue. A bounded capacity of zero is treated as one.
    pub fn new(config: &QueueConfig) -> Self {
        let (sender, receiver) = match config.capacity {
            None => {
                let (tx, rx) = mpsc::unbounded_channel();
                (Sender::Unbounded(tx), Receiver::Unbounded(rx))
            }
            Some(capacity) => {
                let (tx, rx) = mpsc::channel(capacity.max(1));
                (Sender::Bounded(tx), Receiver::Bounded(rx))
            }
        };

        Self {
            sender: Mutex::new(Some(sender)),
            receiver: tokio::sync::Mutex::new(receiver),
            depth: AtomicUsize::new(0),
            capacity: config.capacity.map(|c| c.max(1)),
        }
    }

    pub fn unbounded() -> Self {
        Self::new(&QueueConfig::unbounded())
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    fn publish_depth(&self) {
        metrics().queue_depth.set(self.depth.load(Ordering::Relaxed) as u64);
    }
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::unbounded()
    }
}

#[async_trait]
impl TaskQueue for InMemoryQueue {
    fn enqueue(&self, id: TaskId) -> Result<()> {
        let guard = self.sender.lock();
        let sender = guard.as_ref().ok_or(Error::QueueClosed)?;

        // Counted before the send so a fast consumer never underflows it.
        self.depth.fetch_add(1, Ordering::Relaxed);
        let sent = match sender {
            Sender::Unbounded(tx) => tx.send(id).map_err(|_| Error::QueueClosed),
            Sender::Bounded(tx) => tx.try_send(id).map_err(|e| match e {
                TrySendError::Full(_) => Error::QueueFull {
                    capacity: self.capacity.unwrap_or_default(),
                },
                TrySendError::Closed(_) => Error::QueueClosed,
            }),
        };
        if sent.is_err() {
            self.depth.fetch_sub(1, Ordering::Relaxed);
        }
        drop(guard);

        self.publish_depth();
        if sent.is_ok() {
            debug!(task_id = %id, depth = self.len(), "Enqueued task");
        }
        sent
    }

    async fn dequeue(&self) -> Option<TaskId> {
        let id = self.receiver.lock().await.recv().await?;
        self.depth.fetch_sub(1, Ordering::Relaxed);
        self.publish_depth();
        Some(id)
    }

    fn len(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    fn close(&self) {
        if self.sender.lock().take().is_some() {
            debug!(remaining = self.len(), "Queue closed");
        }
    }
}
