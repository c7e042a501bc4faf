//! Chain targets and run parameters.

use crate::ChainId;
use serde::{Deserialize, Serialize};

/// Identity and connection info for one chain.
///
/// Loaded once from configuration and shared read-only by every task that
/// sends from or to this chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainTarget {
    /// Chain identifier used to name the chain on the command line.
    pub chain_id: ChainId,

    /// Tendermint RPC endpoint (e.g. `http://127.0.0.1:26657`).
    pub rpc: String,

    /// REST gateway endpoint used for account and IBC queries
    /// (e.g. `http://127.0.0.1:1317`).
    #[serde(alias = "grpc")]
    pub rest: String,

    /// Native token denomination used for fees and transfers.
    pub token_denom: String,

    /// Bech32 address prefix (e.g. `cosmos`).
    #[serde(alias = "account_addr_prefix")]
    pub account_prefix: String,

    /// BIP-32 derivation path (e.g. `m/44'/118'/0'/0/0`).
    pub account_hd_path: String,

    /// Receiver address when this chain is the destination of a transfer.
    #[serde(default)]
    pub dst_address: String,
}

/// Block count and per-block load for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunParameters {
    /// Number of blocks to fill.
    pub blocks: u64,
    /// Transactions to broadcast into each block.
    pub txs_per_block: usize,
    /// Transfer messages per transaction.
    pub msgs_per_tx: usize,
}

/// Invalid run parameters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RunParametersError {
    #[error("{name} must be a non-negative integer: {value}")]
    NotAnInteger { name: &'static str, value: String },

    #[error("msg-num must be at least 1")]
    NoMessages,
}

impl RunParameters {
    /// Create validated run parameters.
    pub fn new(
        blocks: u64,
        txs_per_block: usize,
        msgs_per_tx: usize,
    ) -> Result<Self, RunParametersError> {
        if msgs_per_tx == 0 {
            return Err(RunParametersError::NoMessages);
        }
        Ok(Self {
            blocks,
            txs_per_block,
            msgs_per_tx,
        })
    }

    /// Parse the positional `blocks`, `tx-num` and `msg-num` arguments.
    pub fn parse(blocks: &str, tx_num: &str, msg_num: &str) -> Result<Self, RunParametersError> {
        let blocks = blocks
            .trim()
            .parse()
            .map_err(|_| RunParametersError::NotAnInteger {
                name: "blocks",
                value: blocks.to_string(),
            })?;
        let txs_per_block =
            tx_num
                .trim()
                .parse()
                .map_err(|_| RunParametersError::NotAnInteger {
                    name: "tx-num",
                    value: tx_num.to_string(),
                })?;
        let msgs_per_tx =
            msg_num
                .trim()
                .parse()
                .map_err(|_| RunParametersError::NotAnInteger {
                    name: "msg-num",
                    value: msg_num.to_string(),
                })?;
        Self::new(blocks, txs_per_block, msgs_per_tx)
    }
}
