//! Block height pacing.

use crate::client::{ChainClient, QueryError};
use ibcload_types::{BlockHeight, BlockSummary, ChainId};
use std::sync::Arc;
use tracing::{info, warn};

/// Decides which height a send loop targets next.
///
/// Holds no state of its own: every decision is based on a fresh query.
pub struct HeightTracker<C> {
    client: Arc<C>,
    chain: ChainId,
}

impl<C: ChainClient> HeightTracker<C> {
    pub fn new(client: Arc<C>, chain: ChainId) -> Self {
        Self { client, chain }
    }

    /// Pick the first target height and wait until the block before it is
    /// committed, so filling starts at the beginning of a block interval.
    ///
    /// Returns `latest + 2`.
    pub async fn await_start(&self) -> Result<BlockHeight, QueryError> {
        let latest = self.client.latest_height().await?;
        let start = latest.plus(2);
        info!(
            chain = %self.chain,
            height = %latest,
            "Current block height is {latest}, waiting for the next block to be committed"
        );
        self.client.wait_for_height(latest.next()).await?;
        Ok(start)
    }

    /// Compare the chain's height against the one the loop expects.
    ///
    /// If the latest committed height is not `expected - 1`, warn and return
    /// `latest + 1` as the new target; otherwise return `expected`.
    pub async fn check_drift(&self, expected: BlockHeight) -> Result<BlockHeight, QueryError> {
        let latest = self.client.latest_height().await?;
        if latest.next() == expected {
            return Ok(expected);
        }

        warn!(
            chain = %self.chain,
            expected = %expected.prev().unwrap_or(expected),
            got = %latest,
            "Mismatching block height"
        );
        Ok(latest.next())
    }

    /// Wait until `height` is committed.
    pub async fn await_height(&self, height: BlockHeight) -> Result<(), QueryError> {
        self.client.wait_for_height(height).await
    }

    /// Fetch the committed block at `height`.
    pub async fn fetch_block(&self, height: BlockHeight) -> Result<BlockSummary, QueryError> {
        self.client.block(height).await
    }
}
