//! ICS-20 transfer workload.

use ibc_proto::google::protobuf::Any;
use ibcload_types::{
    build_transfer_messages, sign_transaction, ChainId, IbcHeight, SigningAccount, TransferSpec,
    TxFee,
};
use std::time::{SystemTime, UNIX_EPOCH};

/// Builds and signs `MsgTransfer` transactions for one chain pair.
#[derive(Debug, Clone)]
pub struct TransferWorkload {
    /// What each message transfers.
    spec: TransferSpec,

    /// Chain id included in the sign doc, as reported by the node.
    chain_id: ChainId,

    /// Fee and memo of every transaction.
    fee: TxFee,

    /// Latest destination height seen by the channel's client.
    counterparty_height: Option<IbcHeight>,
}

impl TransferWorkload {
    /// Create a new transfer workload.
    pub fn new(spec: TransferSpec, chain_id: ChainId, fee: TxFee) -> Self {
        Self {
            spec,
            chain_id,
            fee,
            counterparty_height: None,
        }
    }

    /// Set the counterparty height relative packet timeouts are based on.
    pub fn with_counterparty_height(mut self, height: Option<IbcHeight>) -> Self {
        self.counterparty_height = height;
        self
    }

    /// Build `count` transfer messages from `sender`, with packet timeouts
    /// resolved against the current time.
    pub fn build_messages(&self, sender: &str, count: usize) -> Vec<Any> {
        let timeout = self
            .spec
            .timeout
            .resolve(unix_nanos_now(), self.counterparty_height);
        build_transfer_messages(&self.spec, sender, timeout, count)
    }

    /// Sign `messages` into broadcastable transaction bytes.
    pub fn sign(
        &self,
        signer: &SigningAccount,
        account_number: u64,
        sequence: u64,
        messages: Vec<Any>,
    ) -> Vec<u8> {
        sign_transaction(
            signer,
            self.chain_id.as_str(),
            account_number,
            sequence,
            &self.fee,
            messages,
        )
    }
}

fn unix_nanos_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default()
}
