//! Chain endpoint clients.
//!
//! [`ChainClient`] is everything a send loop needs from one node. The
//! production implementation, [`RpcClient`], talks Tendermint JSON-RPC for
//! status, blocks and broadcasts, and the Cosmos REST gateway for account and
//! IBC channel queries.

mod rpc;
pub mod types;

pub use rpc::{RpcClient, RpcConnector};

use async_trait::async_trait;
use ibcload_types::{BlockHeight, BlockSummary, ChainId, ChainTarget, IbcHeight};
use std::time::Duration;

/// On-chain account state used to seed the sequencer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountInfo {
    pub account_number: u64,
    pub sequence: u64,
}

/// Node answer to a synchronous broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastResponse {
    /// `CheckTx` result code; 0 means accepted into the mempool.
    pub code: u32,
    pub log: String,
    pub hash: String,
}

/// One open transfer channel and the chain on its other end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    /// Chain id tracked by the channel's light client.
    pub remote_chain_id: ChainId,
    pub port_id: String,
    pub channel_id: String,
    /// Latest height of the counterparty known to the light client.
    pub counterparty_height: Option<IbcHeight>,
}

/// Queries and broadcasts against one chain.
///
/// All methods are safe to call concurrently from several send loops.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Chain id reported by the node.
    async fn chain_id(&self) -> Result<ChainId, QueryError>;

    /// Latest committed height.
    async fn latest_height(&self) -> Result<BlockHeight, QueryError>;

    /// Committed block at `height`.
    async fn block(&self, height: BlockHeight) -> Result<BlockSummary, QueryError>;

    /// Resolve once the chain has committed `height`.
    async fn wait_for_height(&self, height: BlockHeight) -> Result<(), QueryError>;

    /// Account number and next sequence of `address`.
    async fn account_info(&self, address: &str) -> Result<AccountInfo, QueryError>;

    /// Submit a signed transaction and wait for `CheckTx`.
    async fn broadcast(&self, tx_bytes: Vec<u8>) -> Result<BroadcastResponse, BroadcastError>;

    /// Open transfer channels with their remote chain ids.
    async fn routing_table(&self) -> Result<Vec<RouteEntry>, QueryError>;

    /// Latest counterparty height of the client behind `port`/`channel`.
    async fn channel_client_height(
        &self,
        port: &str,
        channel: &str,
    ) -> Result<Option<IbcHeight>, QueryError>;
}

/// Opens [`ChainClient`]s for configured chains.
#[async_trait]
pub trait ChainConnector: Send + Sync {
    type Client: ChainClient + 'static;

    /// Connect to `target` and confirm the node answers.
    async fn connect(&self, target: &ChainTarget) -> Result<Self::Client, ConnectionError>;
}

/// Failure of a single HTTP exchange.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Malformed response: {0}")]
    Decode(String),

    #[error("Cancelled")]
    Cancelled,
}

/// Failure to open a client.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("Invalid {kind} endpoint '{endpoint}': {reason}")]
    InvalidEndpoint {
        kind: &'static str,
        endpoint: String,
        reason: String,
    },

    #[error("Failed to build HTTP client: {0}")]
    Builder(#[source] reqwest::Error),

    #[error("Node at {endpoint} unreachable: {source}")]
    Unreachable {
        endpoint: String,
        #[source]
        source: RequestError,
    },
}

/// Failure of a read query.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("{what} query failed: {source}")]
    Request {
        what: &'static str,
        #[source]
        source: RequestError,
    },

    #[error("Block {0} not found")]
    BlockNotFound(BlockHeight),

    #[error("Account {0} not found")]
    AccountNotFound(String),

    #[error("Malformed {what}: {reason}")]
    Malformed { what: &'static str, reason: String },

    #[error("Height {target} is {ahead} blocks ahead of {current}, more than {max}")]
    TooFarAhead {
        target: BlockHeight,
        current: BlockHeight,
        ahead: u64,
        max: u64,
    },

    #[error("Timed out after {waited:?} waiting for height {target} (last seen {current})")]
    WaitTimeout {
        target: BlockHeight,
        current: BlockHeight,
        waited: Duration,
    },

    #[error("Cancelled")]
    Cancelled,
}

impl QueryError {
    /// Wrap a failed request for the `what` query.
    pub fn request(what: &'static str, source: RequestError) -> Self {
        match source {
            RequestError::Cancelled => QueryError::Cancelled,
            source => QueryError::Request { what, source },
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, QueryError::Cancelled)
    }
}

/// Failure to submit a transaction. A non-zero `CheckTx` code is not an error.
#[derive(Debug, thiserror::Error)]
pub enum BroadcastError {
    #[error("Broadcast request failed: {0}")]
    Request(#[source] RequestError),

    #[error("Cancelled")]
    Cancelled,
}

impl From<RequestError> for BroadcastError {
    fn from(source: RequestError) -> Self {
        match source {
            RequestError::Cancelled => BroadcastError::Cancelled,
            source => BroadcastError::Request(source),
        }
    }
}

impl BroadcastError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, BroadcastError::Cancelled)
    }
}
