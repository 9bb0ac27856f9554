//! In-memory connector and connection used by pool and batch tests.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::connection::{Connect, Connection};

/// Shared record of everything the mock connections did.
#[derive(Debug, Default)]
pub(crate) struct Recorder {
    connects: AtomicUsize,
    active: AtomicUsize,
    peak: AtomicUsize,
    downloads: Mutex<Vec<(usize, String)>>,
    closed: Mutex<Vec<usize>>,
}

impl Recorder {
    /// Connect attempts, including failed ones.
    pub(crate) fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Highest number of downloads in flight at the same time.
    pub(crate) fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Successful downloads as (connection id, item), in completion order.
    pub(crate) fn downloads(&self) -> Vec<(usize, String)> {
        self.downloads.lock().unwrap().clone()
    }

    /// Ids of closed connections, sorted.
    pub(crate) fn closed(&self) -> Vec<usize> {
        let mut closed = self.closed.lock().unwrap().clone();
        closed.sort_unstable();
        closed
    }
}

#[derive(Debug, Default, Clone)]
pub(crate) struct MockConnector {
    pub(crate) recorder: Arc<Recorder>,
    /// Connect attempts with this index or higher fail.
    pub(crate) fail_from: Option<usize>,
    /// Items whose download fails.
    pub(crate) fail_items: Vec<String>,
    /// Connection ids whose close fails.
    pub(crate) fail_close: Vec<usize>,
    pub(crate) download_delay: Duration,
    pub(crate) close_delay: Duration,
}

impl MockConnector {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn failing_from(mut self, attempt: usize) -> Self {
        self.fail_from = Some(attempt);
        self
    }

    pub(crate) fn failing_item(mut self, item: &str) -> Self {
        self.fail_items.push(item.to_string());
        self
    }

    pub(crate) fn failing_close(mut self, id: usize) -> Self {
        self.fail_close.push(id);
        self
    }

    pub(crate) fn with_download_delay(mut self, delay: Duration) -> Self {
        self.download_delay = delay;
        self
    }

    pub(crate) fn with_close_delay(mut self, delay: Duration) -> Self {
        self.close_delay = delay;
        self
    }
}

#[async_trait]
impl Connect for MockConnector {
    type Conn = MockConnection;

    async fn connect(&self) -> Result<MockConnection> {
        let attempt = self.recorder.connects.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        if self.fail_from.is_some_and(|from| attempt >= from) {
            bail!("connect attempt {} refused", attempt);
        }
        Ok(MockConnection {
            id: attempt,
            connector: self.clone(),
        })
    }
}

#[derive(Debug)]
pub(crate) struct MockConnection {
    id: usize,
    connector: MockConnector,
}

#[async_trait]
impl Connection for MockConnection {
    type Item = String;
    type Content = String;

    async fn download(&self, item: &String) -> Result<String> {
        let recorder = &self.connector.recorder;
        let now = recorder.active.fetch_add(1, Ordering::SeqCst) + 1;
        recorder.peak.fetch_max(now, Ordering::SeqCst);
        if self.connector.download_delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.connector.download_delay).await;
        }
        recorder.active.fetch_sub(1, Ordering::SeqCst);

        if self.connector.fail_items.contains(item) {
            bail!("{} not found", item);
        }
        recorder
            .downloads
            .lock()
            .unwrap()
            .push((self.id, item.clone()));
        Ok(format!("content:{}", item))
    }

    async fn close(&self) -> Result<()> {
        if !self.connector.close_delay.is_zero() {
            tokio::time::sleep(self.connector.close_delay * (self.id as u32 + 1)).await;
        }
        self.connector.recorder.closed.lock().unwrap().push(self.id);
        if self.connector.fail_close.contains(&self.id) {
            bail!("socket {} reset", self.id);
        }
        Ok(())
    }
}
