//! Collaborator contracts consumed by the pool.
//!
//! A [`Connect`] produces [`Connection`]s; the batch orchestrator hands each
//! downloaded content to a [`Save`] step. Plain async closures implement
//! `Connect` and `Save`, so callers only write a type when they want one.

use anyhow::Result;
use async_trait::async_trait;
use std::future::Future;

/// One reusable connection. Downloads on the same connection never overlap;
/// the pool guarantees that, the connection does not have to.
#[async_trait]
pub trait Connection: Send + Sync + 'static {
    /// What gets downloaded (e.g. a URL).
    type Item: Send + Sync + 'static;
    /// What a download produces.
    type Content: Send + 'static;

    async fn download(&self, item: &Self::Item) -> Result<Self::Content>;

    /// Called once during pool shutdown.
    async fn close(&self) -> Result<()>;
}

/// Connection factory. May fail per call.
#[async_trait]
pub trait Connect: Send + Sync + 'static {
    type Conn: Connection;

    async fn connect(&self) -> Result<Self::Conn>;
}

#[async_trait]
impl<F, Fut, C> Connect for F
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<C>> + Send,
    C: Connection,
{
    type Conn = C;

    async fn connect(&self) -> Result<C> {
        (self)().await
    }
}

/// Persistence step, invoked once per downloaded item.
#[async_trait]
pub trait Save<T: Send + 'static>: Send + Sync + 'static {
    async fn save(&self, content: T) -> Result<()>;
}

#[async_trait]
impl<F, Fut, T> Save<T> for F
where
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send,
    T: Send + 'static,
{
    async fn save(&self, content: T) -> Result<()> {
        (self)(content).await
    }
}
