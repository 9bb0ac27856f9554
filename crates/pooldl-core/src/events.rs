//! Lifecycle events emitted by connection handles and the pool.
//!
//! Events go out on a `tokio::sync::broadcast` channel. Nobody has to listen;
//! a send with no subscribers is dropped. Slow subscribers lose the oldest
//! events (`RecvError::Lagged`), the pool itself never waits on them.

use tokio::sync::broadcast;

/// Default capacity of the event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolEvent {
    /// A connection was created during `init`.
    Connected { handle: usize },
    /// The connector failed; capacity was reduced to `remaining`.
    ConnectFailed { attempt: usize, remaining: usize },
    /// A handle was given to a caller.
    Acquired { handle: usize },
    /// An acquire request had to queue.
    Queued { waiting: usize },
    /// A handle started a download.
    DownloadStarted { handle: usize },
    /// A handle finished a download and is free for the next waiter.
    DownloadFinished { handle: usize },
    /// A download on a handle failed. The handle is not released.
    DownloadFailed { handle: usize },
    /// A handle is closing.
    Closing { handle: usize },
}

impl PoolEvent {
    /// Handle id this event refers to, if it refers to one.
    pub fn handle(&self) -> Option<usize> {
        match self {
            PoolEvent::Connected { handle }
            | PoolEvent::Acquired { handle }
            | PoolEvent::DownloadStarted { handle }
            | PoolEvent::DownloadFinished { handle }
            | PoolEvent::DownloadFailed { handle }
            | PoolEvent::Closing { handle } => Some(*handle),
            PoolEvent::ConnectFailed { .. } | PoolEvent::Queued { .. } => None,
        }
    }
}

/// Cloneable sender side shared by the pool and its handles.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PoolEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn emit(&self, event: PoolEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PoolEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}
