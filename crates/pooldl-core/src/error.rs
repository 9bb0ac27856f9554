//! Error types surfaced by the pool and the batch orchestrator.
//!
//! Collaborators (connector, connection, save step) report failures as
//! `anyhow::Error`; the pool wraps them with the item or handle they belong to.

use std::fmt;

/// One handle whose `close()` failed during shutdown.
#[derive(Debug)]
pub struct CloseFailure {
    /// Id (creation index) of the handle.
    pub handle: usize,
    pub source: anyhow::Error,
}

impl fmt::Display for CloseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "connection {}: {:#}", self.handle, self.source)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// The connector failed before a single connection was created.
    #[error("connection failed")]
    Initialization {
        /// Number of connections that were requested.
        attempted: usize,
        #[source]
        source: anyhow::Error,
    },

    /// Downloading one item failed. Not retried.
    #[error("download of item {index} failed")]
    Download {
        index: usize,
        #[source]
        source: anyhow::Error,
    },

    /// The save step rejected the content of one item.
    #[error("saving item {index} failed")]
    Save {
        index: usize,
        #[source]
        source: anyhow::Error,
    },

    /// One or more connections failed to close during shutdown.
    #[error("failed to close {} of {total} connection(s): {}", .failures.len(), join_failures(.failures))]
    Close {
        failures: Vec<CloseFailure>,
        total: usize,
    },

    /// A per-item task panicked before it could report a result.
    #[error("download task panicked")]
    Task(#[from] tokio::task::JoinError),
}

impl PoolError {
    /// Index of the batch item this error belongs to, if any.
    pub fn item_index(&self) -> Option<usize> {
        match self {
            PoolError::Download { index, .. } | PoolError::Save { index, .. } => Some(*index),
            _ => None,
        }
    }
}

fn join_failures(failures: &[CloseFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn initialization_message_and_source() {
        let err = PoolError::Initialization {
            attempted: 3,
            source: anyhow::anyhow!("refused"),
        };
        assert_eq!(err.to_string(), "connection failed");
        assert_eq!(err.source().unwrap().to_string(), "refused");
        assert_eq!(err.item_index(), None);
    }

    #[test]
    fn close_lists_every_failure() {
        let err = PoolError::Close {
            failures: vec![
                CloseFailure {
                    handle: 0,
                    source: anyhow::anyhow!("reset"),
                },
                CloseFailure {
                    handle: 2,
                    source: anyhow::anyhow!("timeout"),
                },
            ],
            total: 3,
        };
        assert_eq!(
            err.to_string(),
            "failed to close 2 of 3 connection(s): connection 0: reset; connection 2: timeout"
        );
    }

    #[test]
    fn item_index_for_item_errors() {
        let err = PoolError::Save {
            index: 4,
            source: anyhow::anyhow!("disk full"),
        };
        assert_eq!(err.item_index(), Some(4));
    }
}
