//! Per-chain send loop.
//!
//! One [`SendLoop`] drives one (source, destination) pair: it waits for a
//! fresh block, fills the mempool with transfers aimed at the next height,
//! waits for that height to commit, records the block, and repeats for the
//! configured number of blocks.

use crate::accounts::AccountSequencer;
use crate::broadcaster::{BatchBroadcaster, FillOutcome};
use crate::client::ChainClient;
use crate::config::RejectionPolicy;
use crate::error::SpammerError;
use crate::tracker::HeightTracker;
use crate::workloads::TransferWorkload;
use hdrhistogram::Histogram;
use ibcload_types::{
    BlockHeight, BlockRecord, BlockSummary, ChainId, IbcHeight, PreviousBlock, RunParameters,
    SigningAccount, TransferSpec, TxFee,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Static settings of one send loop.
#[derive(Debug, Clone)]
pub struct SendLoopConfig {
    /// Chain the loop broadcasts to.
    pub source: ChainId,
    /// Label of the transfer destination, used in logs and reports.
    pub destination: ChainId,
    pub params: RunParameters,
    pub fee: TxFee,
    pub policy: RejectionPolicy,
}

/// Lifecycle of a send loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    AwaitingStart,
    /// Filling the `iteration`-th block (zero-based).
    Running { iteration: u64 },
    Done,
}

/// Drives one chain pair for a fixed number of blocks.
pub struct SendLoop<C> {
    config: SendLoopConfig,
    tracker: HeightTracker<C>,
    broadcaster: BatchBroadcaster<C>,
    state: LoopState,
}

impl<C: ChainClient> SendLoop<C> {
    /// Seed the loop from chain state.
    ///
    /// Reads the node's chain id (used for signing) and the signer's account
    /// number and sequence. Nothing is broadcast.
    pub async fn prepare(
        client: Arc<C>,
        config: SendLoopConfig,
        signer: SigningAccount,
        spec: TransferSpec,
        counterparty_height: Option<IbcHeight>,
    ) -> Result<Self, SpammerError> {
        let node_chain_id = client.chain_id().await?;
        if node_chain_id != config.source {
            warn!(
                configured = %config.source,
                node = %node_chain_id,
                "Node reports a different chain id, signing for the node's"
            );
        }

        let account = client.account_info(signer.address()).await?;
        info!(
            chain = %config.source,
            address = %signer.address(),
            account_number = account.account_number,
            sequence = account.sequence,
            "Loaded signing account"
        );

        let workload = TransferWorkload::new(spec, node_chain_id, config.fee.clone())
            .with_counterparty_height(counterparty_height);
        let broadcaster = BatchBroadcaster::new(
            client.clone(),
            config.source.clone(),
            AccountSequencer::new(signer, account),
            workload,
            config.policy,
        );
        let tracker = HeightTracker::new(client, config.source.clone());

        Ok(Self {
            config,
            tracker,
            broadcaster,
            state: LoopState::AwaitingStart,
        })
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Run every block of the loop.
    ///
    /// Each iteration advances the target height by exactly one; the loop
    /// never targets a height beyond the last block it fills.
    pub async fn run(&mut self) -> Result<SendLoopReport, SpammerError> {
        let params = self.config.params;
        let mut report = SendLoopReport::new(&self.config);
        let mut target = self.tracker.await_start().await?;

        info!(
            src = %self.config.source,
            dst = %self.config.destination,
            blocks = params.blocks,
            txs_per_block = params.txs_per_block,
            msgs_per_tx = params.msgs_per_tx,
            "Starting simulation"
        );

        let mut previous: Option<PreviousBlock> = None;
        for iteration in 0..params.blocks {
            self.state = LoopState::Running { iteration };
            target = self.tracker.check_drift(target).await?;

            let started = Instant::now();
            let fill = self
                .broadcaster
                .fill_block(params.txs_per_block, params.msgs_per_tx)
                .await?;
            debug!(
                chain = %self.config.source,
                height = %target,
                sent = fill.sent,
                "Took {} broadcasting txs",
                humantime::format_duration(truncate_to_millis(started.elapsed()))
            );

            self.tracker.await_height(target).await?;
            let block = self.tracker.fetch_block(target).await?;
            let record = self.record_block(&block, fill, previous.as_ref());
            report.record(&record, fill.saturated);

            previous = Some(PreviousBlock::from(&block));
            target = target.next();
        }

        self.state = LoopState::Done;
        info!(
            src = %self.config.source,
            dst = %self.config.destination,
            blocks = report.blocks_completed,
            broadcast = report.total_broadcast,
            committed = report.total_committed,
            "Simulation finished"
        );
        Ok(report)
    }

    fn record_block(
        &self,
        block: &BlockSummary,
        fill: FillOutcome,
        previous: Option<&PreviousBlock>,
    ) -> BlockRecord {
        let duration = previous.and_then(|prev| prev.duration_until(block));
        if duration.is_none() {
            warn!(
                chain = %self.config.source,
                height = %block.height,
                "Past block time not found"
            );
        }

        let record = BlockRecord {
            height: block.height,
            time: block.time,
            duration,
            broadcast_txs: fill.sent,
            rejected_txs: fill.rejected,
            committed_txs: block.tx_count,
        };
        info!(
            src_chain = %self.config.source,
            dst_chain = %self.config.destination,
            height = %record.height,
            block_time = %humantime::format_rfc3339_millis(record.time),
            block_duration = %humantime::format_duration(truncate_to_millis(duration.unwrap_or_default())),
            broadcast_txs = record.broadcast_txs,
            rejected_txs = record.rejected_txs,
            committed_txs = record.committed_txs,
            saturated = fill.saturated,
            "Block committed"
        );
        record
    }
}

fn truncate_to_millis(duration: Duration) -> Duration {
    Duration::from_millis(duration.as_millis() as u64)
}

/// Totals of one send loop.
#[derive(Debug)]
pub struct SendLoopReport {
    pub source: ChainId,
    pub destination: ChainId,
    pub blocks_completed: u64,
    pub total_broadcast: u64,
    pub total_committed: u64,
    pub total_rejected: u64,
    /// Blocks that ended early on a full mempool.
    pub saturated_blocks: u64,
    /// Block durations in milliseconds, for blocks with a known predecessor.
    block_durations: Histogram<u64>,
    last_height: Option<BlockHeight>,
}

impl SendLoopReport {
    fn new(config: &SendLoopConfig) -> Self {
        Self {
            source: config.source.clone(),
            destination: config.destination.clone(),
            blocks_completed: 0,
            total_broadcast: 0,
            total_committed: 0,
            total_rejected: 0,
            saturated_blocks: 0,
            block_durations: Histogram::new(3).expect("histogram creation should succeed"),
            last_height: None,
        }
    }

    fn record(&mut self, record: &BlockRecord, saturated: bool) {
        self.blocks_completed += 1;
        self.total_broadcast += record.broadcast_txs as u64;
        self.total_committed += record.committed_txs as u64;
        self.total_rejected += record.rejected_txs as u64;
        if saturated {
            self.saturated_blocks += 1;
        }
        if let Some(duration) = record.duration {
            self.block_durations.saturating_record(duration.as_millis() as u64);
        }
        self.last_height = Some(record.height);
    }

    /// Last height the loop filled.
    pub fn last_height(&self) -> Option<BlockHeight> {
        self.last_height
    }

    /// Number of blocks with a measured duration.
    pub fn measured_blocks(&self) -> u64 {
        self.block_durations.len()
    }

    pub fn mean_block_time(&self) -> Duration {
        Duration::from_millis(self.block_durations.mean() as u64)
    }

    pub fn max_block_time(&self) -> Duration {
        Duration::from_millis(self.block_durations.max())
    }

    pub fn p90_block_time(&self) -> Duration {
        Duration::from_millis(self.block_durations.value_at_quantile(0.90))
    }

    /// Print the report to stdout.
    pub fn print(&self) {
        println!("\n--- {} -> {} ---", self.source, self.destination);
        println!("Blocks:     {}", self.blocks_completed);
        println!("Broadcast:  {}", self.total_broadcast);
        println!("Committed:  {}", self.total_committed);
        println!("Rejected:   {}", self.total_rejected);
        println!("Saturated:  {}", self.saturated_blocks);
        if self.measured_blocks() > 0 {
            println!("Block time:");
            println!("  Avg:  {:?}", self.mean_block_time());
            println!("  P90:  {:?}", self.p90_block_time());
            println!("  Max:  {:?}", self.max_block_time());
        }
    }
}
