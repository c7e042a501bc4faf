//! Core types for the ibcload transaction generator.
//!
//! This crate provides the foundational types shared by the load engine:
//!
//! - **Identifiers**: ChainId, BlockHeight, IbcHeight
//! - **Configuration data**: ChainTarget, RunParameters
//! - **Transfers**: Coin, TransferSpec, PacketTimeout
//! - **Keys and signing**: SigningAccount, Cosmos `TxRaw` construction
//! - **Blocks**: BlockSummary, BlockRecord
//!
//! It performs no I/O and does not depend on any other workspace crate.

mod block;
mod chain;
mod coin;
mod crypto;
mod identifiers;
mod signing;
mod transfer;

pub use block::{BlockRecord, BlockSummary, PreviousBlock};
pub use chain::{ChainTarget, RunParameters, RunParametersError};
pub use coin::{ibc_denom, Coin, CoinError};
pub use crypto::{account_address, KeyDerivationError, SigningAccount};
pub use identifiers::{BlockHeight, ChainId, IbcHeight, ParseHeightError};
pub use signing::{
    build_transfer_messages, decode_signed_tx, sign_transaction, ResolvedTimeout,
    SignedTxSummary, TxFee, MSG_TRANSFER_TYPE_URL, SECP256K1_PUBKEY_TYPE_URL,
};
pub use transfer::{
    PacketTimeout, TransferSpec, DEFAULT_PACKET_TIMEOUT_HEIGHT, DEFAULT_PACKET_TIMEOUT_TIMESTAMP,
};

/// Cosmos SDK `ErrMempoolIsFull` code (0x14) returned by `CheckTx`.
pub const CODE_MEMPOOL_FULL: u32 = 0x14;
