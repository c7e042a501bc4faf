//! Per-signer sequence bookkeeping.

use crate::client::AccountInfo;
use ibcload_types::SigningAccount;
use tracing::warn;

/// Issues monotonically increasing sequence numbers for one signing account.
///
/// The account's sequence is read from the chain once, when the send loop
/// starts; from then on this sequencer is the only source of truth. Each
/// sequence is issued exactly once unless the immediately preceding issuance
/// is rolled back after a mempool-full rejection.
#[derive(Debug)]
pub struct AccountSequencer {
    account: SigningAccount,
    account_number: u64,
    next_sequence: u64,
    /// Last issued sequence, cleared by `rollback` so it can only happen once.
    last_issued: Option<u64>,
}

impl AccountSequencer {
    pub fn new(account: SigningAccount, info: AccountInfo) -> Self {
        Self {
            account,
            account_number: info.account_number,
            next_sequence: info.sequence,
            last_issued: None,
        }
    }

    pub fn account(&self) -> &SigningAccount {
        &self.account
    }

    /// Issue the next `(account_number, sequence)` pair.
    pub fn next(&mut self) -> (u64, u64) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.last_issued = Some(sequence);
        (self.account_number, sequence)
    }

    /// Return the last issued sequence so the next call to [`next`](Self::next)
    /// reuses it.
    pub fn rollback(&mut self) {
        match self.last_issued.take() {
            Some(sequence) => self.next_sequence = sequence,
            None => warn!(
                address = %self.account.address(),
                next_sequence = self.next_sequence,
                "No issued sequence to roll back"
            ),
        }
    }

    /// Sequence the next call to [`next`](Self::next) will return.
    pub fn peek(&self) -> u64 {
        self.next_sequence
    }
}
