//! Batch orchestration: download every item over a shared connection pool.
//!
//! One task per item: acquire → download → save. All acquire requests are
//! registered up front in item order, so items beyond the pool's capacity are
//! served in input order as connections free up. The first failing item fails
//! the batch; other in-flight tasks are detached, not aborted. The pool is
//! shut down whether the items succeeded or not.

use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;

use crate::connection::{Connect, Connection, Save};
use crate::error::PoolError;
use crate::events::EventBus;
use crate::pool::ConnectionPool;

type Item<F> = <<F as Connect>::Conn as Connection>::Item;
type Content<F> = <<F as Connect>::Conn as Connection>::Content;

/// Summary of a completed batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchReport {
    /// Items downloaded and saved.
    pub saved: usize,
    /// Connections the batch actually ran on (may be below the requested
    /// concurrency if some could not be opened).
    pub connections: usize,
}

/// Downloads `items` over at most `max_concurrency` reused connections,
/// passing each content to `save`.
///
/// Save order follows download completion, not input order.
pub async fn pooled_download<F, S>(
    connect: F,
    save: S,
    items: Vec<Item<F>>,
    max_concurrency: usize,
) -> Result<BatchReport, PoolError>
where
    F: Connect,
    S: Save<Content<F>>,
{
    pooled_download_with_events(connect, save, items, max_concurrency, EventBus::default()).await
}

/// Like [`pooled_download`], publishing pool lifecycle events on `events`.
pub async fn pooled_download_with_events<F, S>(
    connect: F,
    save: S,
    items: Vec<Item<F>>,
    max_concurrency: usize,
    events: EventBus,
) -> Result<BatchReport, PoolError>
where
    F: Connect,
    S: Save<Content<F>>,
{
    let mut pool = ConnectionPool::with_events(connect, max_concurrency, events);
    pool.init().await?;
    let pool = Arc::new(pool);
    let connections = pool.len();
    tracing::info!(items = items.len(), connections, "starting batch");

    let outcome = run_items(&pool, Arc::new(save), items).await;
    let closed = pool.shutdown().await;

    match (outcome, closed) {
        (Err(err), closed) => {
            if let Err(close_err) = closed {
                tracing::warn!("{}", close_err);
            }
            tracing::warn!(error = %err, "batch failed");
            Err(err)
        }
        (Ok(_), Err(close_err)) => Err(close_err),
        (Ok(saved), Ok(())) => {
            tracing::info!(saved, connections, "batch complete");
            Ok(BatchReport { saved, connections })
        }
    }
}

async fn run_items<F, S>(
    pool: &Arc<ConnectionPool<F>>,
    save: Arc<S>,
    items: Vec<Item<F>>,
) -> Result<usize, PoolError>
where
    F: Connect,
    S: Save<Content<F>>,
{
    let mut tasks: FuturesUnordered<_> = items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            let acquire = pool.acquire();
            let save = Arc::clone(&save);
            tokio::spawn(async move {
                let handle = acquire.await;
                let content = handle
                    .download(&item)
                    .await
                    .map_err(|source| PoolError::Download { index, source })?;
                save.save(content)
                    .await
                    .map_err(|source| PoolError::Save { index, source })?;
                tracing::debug!(index, handle = handle.id(), "item saved");
                Ok::<_, PoolError>(())
            })
        })
        .collect();

    let mut saved = 0;
    while let Some(joined) = tasks.next().await {
        joined??;
        saved += 1;
    }
    Ok(saved)
}
