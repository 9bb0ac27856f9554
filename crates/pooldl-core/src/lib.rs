//! Bounded-concurrency batch downloads over a fixed pool of reusable connections.

pub mod config;
pub mod logging;

pub mod batch;
pub mod connection;
pub mod error;
pub mod events;
pub mod pool;
pub mod storage;
pub mod transport;
pub mod url_model;

pub use batch::{pooled_download, pooled_download_with_events, BatchReport};
pub use connection::{Connect, Connection, Save};
pub use error::{CloseFailure, PoolError};
pub use events::{EventBus, PoolEvent};
pub use pool::{ConnectionHandle, ConnectionPool, HandleState};
