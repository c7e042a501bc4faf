//! Committed block summaries and per-block load records.

use crate::BlockHeight;
use std::time::{Duration, SystemTime};

/// What the load generator needs from a committed block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSummary {
    /// Block height.
    pub height: BlockHeight,
    /// Header timestamp.
    pub time: SystemTime,
    /// Number of transactions included in the block.
    pub tx_count: usize,
}

/// One filled block, logged once and then discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRecord {
    /// Target height that was filled.
    pub height: BlockHeight,
    /// Header timestamp of the committed block.
    pub time: SystemTime,
    /// Time since the previous height's block, when that block was retained.
    pub duration: Option<Duration>,
    /// Transactions broadcast while targeting this height.
    pub broadcast_txs: usize,
    /// Broadcasts answered with a non-zero code other than mempool-full.
    pub rejected_txs: usize,
    /// Transactions the chain committed in this block.
    pub committed_txs: usize,
}

/// Timestamp of the last committed block, kept to compute block durations.
///
/// At most one previous block is retained at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreviousBlock {
    pub height: BlockHeight,
    pub time: SystemTime,
}

impl PreviousBlock {
    /// Duration between this block and `block`, if `block` directly follows it.
    pub fn duration_until(&self, block: &BlockSummary) -> Option<Duration> {
        if self.height.next() != block.height {
            return None;
        }
        Some(block.time.duration_since(self.time).unwrap_or_default())
    }
}

impl From<&BlockSummary> for PreviousBlock {
    fn from(block: &BlockSummary) -> Self {
        Self {
            height: block.height,
            time: block.time,
        }
    }
}
