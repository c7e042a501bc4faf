//! Filling one block's worth of transactions.

use crate::accounts::AccountSequencer;
use crate::client::{BroadcastResponse, ChainClient};
use crate::config::RejectionPolicy;
use crate::error::SpammerError;
use crate::workloads::TransferWorkload;
use ibcload_types::{ChainId, CODE_MEMPOOL_FULL};
use std::sync::Arc;
use tracing::{trace, warn};

/// Classification of a node's answer to one broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BroadcastOutcome {
    Accepted,
    /// Mempool is full; nothing more fits this block.
    MempoolFull,
    Rejected { code: u32, log: String },
}

impl From<&BroadcastResponse> for BroadcastOutcome {
    fn from(response: &BroadcastResponse) -> Self {
        match response.code {
            0 => BroadcastOutcome::Accepted,
            CODE_MEMPOOL_FULL => BroadcastOutcome::MempoolFull,
            code => BroadcastOutcome::Rejected {
                code,
                log: response.log.clone(),
            },
        }
    }
}

/// Result of filling one block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FillOutcome {
    /// Broadcasts counted toward the target, rejected ones included.
    pub sent: usize,
    /// Broadcasts answered with a non-zero, non-mempool-full code.
    pub rejected: usize,
    /// Whether the block ended early on a full mempool.
    pub saturated: bool,
}

/// Broadcasts transactions for one send loop, one block at a time.
///
/// Owns the loop's [`AccountSequencer`]; broadcasts are strictly sequential
/// so sequences reach the node in issue order.
pub struct BatchBroadcaster<C> {
    client: Arc<C>,
    chain: ChainId,
    sequencer: AccountSequencer,
    workload: TransferWorkload,
    policy: RejectionPolicy,
}

impl<C: ChainClient> BatchBroadcaster<C> {
    pub fn new(
        client: Arc<C>,
        chain: ChainId,
        sequencer: AccountSequencer,
        workload: TransferWorkload,
        policy: RejectionPolicy,
    ) -> Self {
        Self {
            client,
            chain,
            sequencer,
            workload,
            policy,
        }
    }

    pub fn sequencer(&self) -> &AccountSequencer {
        &self.sequencer
    }

    /// Broadcast until `target_count` transactions are counted or the mempool
    /// reports full.
    ///
    /// On mempool-full the sequence is rolled back so the next block reuses
    /// it. Other rejections are handled per the [`RejectionPolicy`].
    pub async fn fill_block(
        &mut self,
        target_count: usize,
        msgs_per_tx: usize,
    ) -> Result<FillOutcome, SpammerError> {
        let mut outcome = FillOutcome::default();

        while outcome.sent < target_count {
            let messages = self
                .workload
                .build_messages(self.sequencer.account().address(), msgs_per_tx);
            let (account_number, sequence) = self.sequencer.next();
            let tx = self
                .workload
                .sign(self.sequencer.account(), account_number, sequence, messages);

            let response = self.client.broadcast(tx).await?;
            match BroadcastOutcome::from(&response) {
                BroadcastOutcome::Accepted => {
                    trace!(chain = %self.chain, sequence, hash = %response.hash, "Broadcast accepted");
                    outcome.sent += 1;
                }
                BroadcastOutcome::MempoolFull => {
                    warn!(
                        chain = %self.chain,
                        sequence,
                        sent = outcome.sent,
                        "Mempool is full, stopping"
                    );
                    self.sequencer.rollback();
                    outcome.saturated = true;
                    break;
                }
                BroadcastOutcome::Rejected { code, log } => match self.policy {
                    RejectionPolicy::Count => {
                        warn!(chain = %self.chain, sequence, code, %log, "Transaction rejected");
                        outcome.rejected += 1;
                        outcome.sent += 1;
                    }
                    RejectionPolicy::Fail => {
                        return Err(SpammerError::BroadcastRejected {
                            code,
                            log,
                            sequence,
                        });
                    }
                },
            }
        }

        Ok(outcome)
    }
}
