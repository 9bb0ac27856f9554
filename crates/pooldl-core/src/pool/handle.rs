//! Connection handle: one pooled connection plus its busy/idle state.

use anyhow::Result;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use crate::connection::Connection;
use crate::events::{EventBus, PoolEvent};

const IDLE: u8 = 0;
const BUSY: u8 = 1;
const CLOSED: u8 = 2;

/// Activity state of a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    Idle,
    /// Mid-download.
    Busy,
    /// Closed during shutdown; terminal.
    Closed,
}

impl HandleState {
    fn from_raw(raw: u8) -> Self {
        match raw {
            BUSY => HandleState::Busy,
            CLOSED => HandleState::Closed,
            _ => HandleState::Idle,
        }
    }
}

/// Reaction registered by the pool; runs after every successful download.
pub(crate) type OnDownloaded<C> = Box<dyn Fn(ConnectionHandle<C>) + Send + Sync>;

struct HandleInner<C: Connection> {
    id: usize,
    conn: C,
    state: AtomicU8,
    downloads: AtomicU64,
    events: EventBus,
    on_downloaded: OnDownloaded<C>,
}

/// Cheap, cloneable reference to one pooled connection.
///
/// A handle only becomes available to the next waiter when a download on it
/// finishes successfully. There is no release call: a handle that was acquired
/// and never used, or whose download failed, stays out of circulation until
/// the pool is shut down.
pub struct ConnectionHandle<C: Connection> {
    inner: Arc<HandleInner<C>>,
}

impl<C: Connection> Clone for ConnectionHandle<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Connection> ConnectionHandle<C> {
    pub(crate) fn new(id: usize, conn: C, events: EventBus, on_downloaded: OnDownloaded<C>) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                id,
                conn,
                state: AtomicU8::new(IDLE),
                downloads: AtomicU64::new(0),
                events,
                on_downloaded,
            }),
        }
    }

    /// Creation index within the pool.
    pub fn id(&self) -> usize {
        self.inner.id
    }

    pub fn state(&self) -> HandleState {
        HandleState::from_raw(self.inner.state.load(Ordering::Acquire))
    }

    /// Number of downloads completed successfully on this connection.
    pub fn downloads(&self) -> u64 {
        self.inner.downloads.load(Ordering::Relaxed)
    }

    /// Downloads `item` over the wrapped connection.
    ///
    /// On success the handle is handed to the oldest queued acquirer (if any)
    /// before the content is returned. Failures are returned as-is, without
    /// retry, and do not free the handle.
    pub async fn download(&self, item: &C::Item) -> Result<C::Content> {
        let id = self.inner.id;
        self.transition(IDLE, BUSY);
        self.inner.events.emit(PoolEvent::DownloadStarted { handle: id });
        tracing::debug!(handle = id, "download started");

        match self.inner.conn.download(item).await {
            Ok(content) => {
                self.inner.downloads.fetch_add(1, Ordering::Relaxed);
                self.transition(BUSY, IDLE);
                self.inner.events.emit(PoolEvent::DownloadFinished { handle: id });
                tracing::debug!(handle = id, "download finished");
                (self.inner.on_downloaded)(self.clone());
                Ok(content)
            }
            Err(err) => {
                self.transition(BUSY, IDLE);
                self.inner.events.emit(PoolEvent::DownloadFailed { handle: id });
                tracing::debug!(handle = id, error = %format!("{:#}", err), "download failed");
                Err(err)
            }
        }
    }

    /// Closes the wrapped connection. Not guarded: a second call closes again.
    pub async fn close(&self) -> Result<()> {
        let id = self.inner.id;
        self.inner.state.store(CLOSED, Ordering::Release);
        self.inner.events.emit(PoolEvent::Closing { handle: id });
        tracing::debug!(handle = id, "closing connection");
        self.inner.conn.close().await
    }

    /// Closed is terminal; a download racing shutdown must not reopen the handle.
    fn transition(&self, from: u8, to: u8) {
        let _ = self
            .inner
            .state
            .compare_exchange(from, to, Ordering::AcqRel, Ordering::Acquire);
    }
}

impl<C: Connection> fmt::Debug for ConnectionHandle<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.id())
            .field("state", &self.state())
            .field("downloads", &self.downloads())
            .finish()
    }
}
