//! Error taxonomy for a load run.

use crate::client::{BroadcastError, ConnectionError, QueryError, RequestError};
use crate::config::ConfigError;
use ibcload_types::{ChainId, KeyDerivationError};

/// Errors that terminate one chain pair's send loop.
///
/// Setup problems surface as [`ConfigError`] before any task starts; every
/// other variant is fatal only to the task that produced it.
#[derive(Debug, thiserror::Error)]
pub enum SpammerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    #[error("Broadcast error: {0}")]
    Broadcast(#[from] BroadcastError),

    #[error("Failed to retrieve account from mnemonic: {0}")]
    Signing(#[from] KeyDerivationError),

    #[error("No open transfer channel from {src_chain} to {dst_chain}")]
    Routing { src_chain: ChainId, dst_chain: ChainId },

    #[error("Transaction with sequence {sequence} rejected with code {code}: {log}")]
    BroadcastRejected { code: u32, log: String, sequence: u64 },

    #[error("Source chain {chain} unavailable: {reason}")]
    SourceUnavailable { chain: ChainId, reason: String },

    #[error("Task panicked: {0}")]
    TaskPanicked(String),
}

impl SpammerError {
    /// Whether the error came from the run being cancelled.
    pub fn is_cancelled(&self) -> bool {
        match self {
            SpammerError::Query(e) => e.is_cancelled(),
            SpammerError::Broadcast(e) => e.is_cancelled(),
            SpammerError::Connection(ConnectionError::Unreachable {
                source: RequestError::Cancelled,
                ..
            }) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellation_detected_through_wrappers() {
        assert!(SpammerError::from(QueryError::Cancelled).is_cancelled());
        assert!(SpammerError::from(BroadcastError::from(RequestError::Cancelled)).is_cancelled());
        assert!(SpammerError::from(ConnectionError::Unreachable {
            endpoint: "http://a:26657".into(),
            source: RequestError::Cancelled,
        })
        .is_cancelled());

        assert!(!SpammerError::from(QueryError::request(
            "status",
            RequestError::Decode("bad".into())
        ))
        .is_cancelled());
        assert!(!SpammerError::TaskPanicked("boom".into()).is_cancelled());
    }
}
