//! Fixed-size pool of reusable connections.
//!
//! `init` opens up to `max_concurrency` connections one after another; if the
//! connector fails part way, the pool keeps what it has and lowers its
//! capacity instead of failing. `acquire` hands each connection out once in
//! creation order, then queues callers FIFO. A connection goes back into
//! circulation only when a download on it finishes: the finished handle
//! resolves the oldest queued request.

mod handle;
mod state;

#[cfg(test)]
pub(crate) mod testing;

pub use handle::{ConnectionHandle, HandleState};

use futures::future::join_all;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::broadcast;

use crate::connection::{Connect, Connection};
use crate::error::{CloseFailure, PoolError};
use crate::events::{EventBus, PoolEvent};

use handle::OnDownloaded;
use state::{Admission, PoolState, Release};

/// State shared between the pool and the release reaction of its handles.
struct Shared<C: Connection> {
    state: Mutex<PoolState<C>>,
    events: EventBus,
}

impl<C: Connection> Shared<C> {
    fn lock(&self) -> MutexGuard<'_, PoolState<C>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn release(&self, handle: ConnectionHandle<C>) {
        let id = handle.id();
        let outcome = self.lock().release(handle);
        match outcome {
            Release::Handed => {
                self.events.emit(PoolEvent::Acquired { handle: id });
                tracing::trace!(handle = id, "handed to queued acquirer");
            }
            Release::Parked => tracing::trace!(handle = id, "no acquirer waiting, parked"),
        }
    }
}

/// Registers the pool's reaction to a handle's finished download. Holds the
/// pool weakly so handles do not keep a dropped pool alive.
fn release_to<C: Connection>(shared: &Arc<Shared<C>>) -> OnDownloaded<C> {
    let shared: Weak<Shared<C>> = Arc::downgrade(shared);
    Box::new(move |handle| {
        if let Some(shared) = shared.upgrade() {
            shared.release(handle);
        }
    })
}

pub struct ConnectionPool<F: Connect> {
    connector: F,
    requested: usize,
    handles: Vec<ConnectionHandle<F::Conn>>,
    shared: Arc<Shared<F::Conn>>,
}

impl<F: Connect> ConnectionPool<F> {
    /// Creates an empty pool. Nothing is connected until [`init`](Self::init).
    pub fn new(connector: F, max_concurrency: usize) -> Self {
        Self::with_events(connector, max_concurrency, EventBus::default())
    }

    /// Like `new`, but publishes lifecycle events on `events`.
    pub fn with_events(connector: F, max_concurrency: usize, events: EventBus) -> Self {
        Self {
            connector,
            requested: max_concurrency,
            handles: Vec::with_capacity(max_concurrency),
            shared: Arc::new(Shared {
                state: Mutex::new(PoolState::new(max_concurrency)),
                events,
            }),
        }
    }

    /// Opens connections sequentially until `max_concurrency` are open.
    ///
    /// The first connector failure stops creation and lowers the capacity to
    /// the number of connections created so far. Fails only if that number is
    /// zero. Calling `init` again after success does nothing.
    pub async fn init(&mut self) -> Result<(), PoolError> {
        while self.handles.len() < self.max_concurrency() {
            let attempt = self.handles.len();
            match self.connector.connect().await {
                Ok(conn) => {
                    let handle = ConnectionHandle::new(
                        attempt,
                        conn,
                        self.shared.events.clone(),
                        release_to(&self.shared),
                    );
                    self.handles.push(handle);
                    self.shared.events.emit(PoolEvent::Connected { handle: attempt });
                    tracing::debug!(handle = attempt, "connection created");
                }
                Err(err) => {
                    self.shared.lock().max_concurrency = attempt;
                    if attempt == 0 {
                        tracing::warn!(error = %format!("{:#}", err), "no connection could be created");
                        return Err(PoolError::Initialization {
                            attempted: self.requested,
                            source: err,
                        });
                    }
                    self.shared.events.emit(PoolEvent::ConnectFailed {
                        attempt,
                        remaining: attempt,
                    });
                    tracing::warn!(
                        requested = self.requested,
                        created = attempt,
                        error = %format!("{:#}", err),
                        "connect failed, continuing with fewer connections"
                    );
                }
            }
        }

        if self.handles.is_empty() {
            return Err(PoolError::Initialization {
                attempted: self.requested,
                source: anyhow::anyhow!("no connections requested"),
            });
        }

        tracing::info!(connections = self.handles.len(), "connection pool ready");
        Ok(())
    }

    /// Requests a connection.
    ///
    /// The request is registered when `acquire` is called, not when the
    /// returned future is first polled, so queued requests are served in call
    /// order. Never fails and never times out; a request queued when the pool
    /// shuts down (or is dropped) stays pending forever.
    pub fn acquire(&self) -> impl Future<Output = ConnectionHandle<F::Conn>> + Send + 'static {
        let admission = self.shared.lock().admit(&self.handles);
        match &admission {
            Admission::Ready(handle) => {
                self.shared.events.emit(PoolEvent::Acquired { handle: handle.id() });
                tracing::trace!(handle = handle.id(), "acquired");
            }
            Admission::Queued { position, .. } => {
                self.shared.events.emit(PoolEvent::Queued { waiting: *position });
                tracing::trace!(position, "all connections in use, queued");
            }
        }

        async move {
            match admission {
                Admission::Ready(handle) => handle,
                Admission::Queued { rx, .. } => match rx.await {
                    Ok(handle) => handle,
                    Err(_) => std::future::pending().await,
                },
            }
        }
    }

    /// Closes every connection concurrently and waits for all of them.
    ///
    /// Queued acquire requests are left pending. Calling this twice closes
    /// every connection twice.
    pub async fn shutdown(&self) -> Result<(), PoolError> {
        let waiting = self.waiting();
        if waiting > 0 {
            tracing::warn!(waiting, "shutting down with queued acquire requests");
        }

        let results = join_all(
            self.handles
                .iter()
                .map(|handle| async move { (handle.id(), handle.close().await) }),
        )
        .await;

        let failures: Vec<CloseFailure> = results
            .into_iter()
            .filter_map(|(handle, res)| res.err().map(|source| CloseFailure { handle, source }))
            .collect();

        if failures.is_empty() {
            tracing::debug!(connections = self.handles.len(), "connection pool shut down");
            return Ok(());
        }
        for failure in &failures {
            tracing::warn!("close failed: {}", failure);
        }
        Err(PoolError::Close {
            failures,
            total: self.handles.len(),
        })
    }

    /// Effective capacity; lower than requested if `init` degraded.
    pub fn max_concurrency(&self) -> usize {
        self.shared.lock().max_concurrency
    }

    /// Number of open connections.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Handles in creation order.
    pub fn handles(&self) -> &[ConnectionHandle<F::Conn>] {
        &self.handles
    }

    /// Acquire requests currently queued.
    pub fn waiting(&self) -> usize {
        self.shared.lock().waiting()
    }

    /// Handles that finished a download while nobody was waiting.
    pub fn parked(&self) -> usize {
        self.shared.lock().parked()
    }

    /// Handles currently mid-download.
    pub fn busy(&self) -> usize {
        self.handles
            .iter()
            .filter(|h| h.state() == HandleState::Busy)
            .count()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PoolEvent> {
        self.shared.events.subscribe()
    }
}
