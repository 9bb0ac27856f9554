//! Admission bookkeeping: admitted count, FIFO wait queue, parked handles.
//!
//! Every field here is read-modify-write from several tasks, so the pool keeps
//! the whole struct behind one mutex and never touches a field outside it.

use std::collections::VecDeque;
use tokio::sync::oneshot;

use crate::connection::Connection;

use super::handle::ConnectionHandle;

pub(super) type Waiter<C> = oneshot::Sender<ConnectionHandle<C>>;

/// Outcome of one acquire request.
pub(super) enum Admission<C: Connection> {
    Ready(ConnectionHandle<C>),
    Queued {
        rx: oneshot::Receiver<ConnectionHandle<C>>,
        position: usize,
    },
}

/// Where a freed handle ended up.
pub(super) enum Release {
    /// Given to the oldest live waiter.
    Handed,
    /// Nobody was waiting; kept for the next acquirer.
    Parked,
}

pub(super) struct PoolState<C: Connection> {
    /// Only ever lowered, and only while `init` runs.
    pub(super) max_concurrency: usize,
    /// Handles handed out at least once, in creation order.
    pub(super) admitted: usize,
    waiters: VecDeque<Waiter<C>>,
    parked: VecDeque<ConnectionHandle<C>>,
}

impl<C: Connection> PoolState<C> {
    pub(super) fn new(max_concurrency: usize) -> Self {
        Self {
            max_concurrency,
            admitted: 0,
            waiters: VecDeque::new(),
            parked: VecDeque::new(),
        }
    }

    /// First use goes through `handles` in creation order; after that a
    /// parked handle is reused; otherwise the request queues.
    pub(super) fn admit(&mut self, handles: &[ConnectionHandle<C>]) -> Admission<C> {
        if self.admitted < self.max_concurrency {
            if let Some(handle) = handles.get(self.admitted) {
                self.admitted += 1;
                return Admission::Ready(handle.clone());
            }
        }
        // Without parking, a handle freed while nobody waited would never circulate again.
        if let Some(handle) = self.parked.pop_front() {
            return Admission::Ready(handle);
        }
        self.waiters.retain(|w| !w.is_closed());
        let (tx, rx) = oneshot::channel();
        self.waiters.push_back(tx);
        Admission::Queued {
            rx,
            position: self.waiters.len(),
        }
    }

    /// Resolves the head of the wait queue with `handle`. Waiters whose
    /// acquire future was dropped are discarded on the way.
    pub(super) fn release(&mut self, mut handle: ConnectionHandle<C>) -> Release {
        while let Some(waiter) = self.waiters.pop_front() {
            match waiter.send(handle) {
                Ok(()) => return Release::Handed,
                Err(returned) => handle = returned,
            }
        }
        self.parked.push_back(handle);
        Release::Parked
    }

    /// Queued requests that are still being awaited.
    pub(super) fn waiting(&self) -> usize {
        self.waiters.iter().filter(|w| !w.is_closed()).count()
    }

    pub(super) fn parked(&self) -> usize {
        self.parked.len()
    }
}
