//! Cosmos SDK transaction construction and SIGN_MODE_DIRECT signing.
//!
//! A signed transaction is the protobuf `TxRaw`:
//!
//! | Field | Content |
//! |-------|---------|
//! | `body_bytes` | `TxBody { messages, memo }` |
//! | `auth_info_bytes` | `AuthInfo { signer_infos: [pubkey, DIRECT, sequence], fee }` |
//! | `signatures` | secp256k1 signature over `SignDoc` |
//!
//! The `SignDoc` binds the body and auth info to the chain id and the
//! account number, so the same payload signed at a different sequence yields
//! a distinct transaction.

use crate::{Coin, IbcHeight, SigningAccount, TransferSpec};
use ibc_proto::cosmos::crypto::secp256k1::PubKey;
use ibc_proto::cosmos::tx::signing::v1beta1::SignMode;
use ibc_proto::cosmos::tx::v1beta1::{
    mode_info, AuthInfo, Fee, ModeInfo, SignDoc, SignerInfo, TxBody, TxRaw,
};
use ibc_proto::google::protobuf::Any;
use ibc_proto::ibc::applications::transfer::v1::MsgTransfer;
use prost::Message;

/// Type URL of an ICS-20 transfer message.
pub const MSG_TRANSFER_TYPE_URL: &str = "/ibc.applications.transfer.v1.MsgTransfer";

/// Type URL of a secp256k1 public key.
pub const SECP256K1_PUBKEY_TYPE_URL: &str = "/cosmos.crypto.secp256k1.PubKey";

/// Fee and memo attached to every transaction of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxFee {
    pub amount: Coin,
    pub gas_limit: u64,
    pub memo: String,
}

/// Packet timeout resolved for one batch of messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResolvedTimeout {
    /// Absolute timeout height on the destination; `None` disables it.
    pub height: Option<IbcHeight>,
    /// Absolute timeout in unix nanoseconds; `0` disables it.
    pub timestamp_nanos: u64,
}

/// Build `count` identical ICS-20 transfer messages from `sender`.
pub fn build_transfer_messages(
    spec: &TransferSpec,
    sender: &str,
    timeout: ResolvedTimeout,
    count: usize,
) -> Vec<Any> {
    let msg = MsgTransfer {
        source_port: spec.source_port.clone(),
        source_channel: spec.source_channel.clone(),
        token: Some((&spec.coin).into()),
        sender: sender.to_string(),
        receiver: spec.receiver.clone(),
        timeout_height: timeout.height.map(Into::into),
        timeout_timestamp: timeout.timestamp_nanos,
        ..Default::default()
    };
    let any = Any {
        type_url: MSG_TRANSFER_TYPE_URL.to_string(),
        value: msg.encode_to_vec(),
    };
    vec![any; count]
}

/// Sign `messages` at `(account_number, sequence)` and return the encoded
/// `TxRaw` bytes ready for broadcast.
pub fn sign_transaction(
    signer: &SigningAccount,
    chain_id: &str,
    account_number: u64,
    sequence: u64,
    fee: &TxFee,
    messages: Vec<Any>,
) -> Vec<u8> {
    let body = TxBody {
        messages,
        memo: fee.memo.clone(),
        ..Default::default()
    };
    let body_bytes = body.encode_to_vec();

    let public_key = Any {
        type_url: SECP256K1_PUBKEY_TYPE_URL.to_string(),
        value: PubKey {
            key: signer.public_key().to_vec(),
        }
        .encode_to_vec(),
    };
    let signer_info = SignerInfo {
        public_key: Some(public_key),
        mode_info: Some(ModeInfo {
            sum: Some(mode_info::Sum::Single(mode_info::Single {
                mode: SignMode::Direct as i32,
            })),
        }),
        sequence,
    };
    let auth_info = AuthInfo {
        signer_infos: vec![signer_info],
        fee: Some(Fee {
            amount: vec![(&fee.amount).into()],
            gas_limit: fee.gas_limit,
            ..Default::default()
        }),
        ..Default::default()
    };
    let auth_info_bytes = auth_info.encode_to_vec();

    let sign_doc = SignDoc {
        body_bytes: body_bytes.clone(),
        auth_info_bytes: auth_info_bytes.clone(),
        chain_id: chain_id.to_string(),
        account_number,
    };
    let signature = signer.sign(&sign_doc.encode_to_vec());

    TxRaw {
        body_bytes,
        auth_info_bytes,
        signatures: vec![signature],
    }
    .encode_to_vec()
}

/// Decoded view of a signed transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTxSummary {
    pub sequence: u64,
    pub message_count: usize,
    pub memo: String,
}

/// Decode the parts of a `TxRaw` that load accounting cares about.
pub fn decode_signed_tx(bytes: &[u8]) -> Result<SignedTxSummary, prost::DecodeError> {
    let raw = TxRaw::decode(bytes)?;
    let body = TxBody::decode(raw.body_bytes.as_slice())?;
    let auth_info = AuthInfo::decode(raw.auth_info_bytes.as_slice())?;
    let sequence = auth_info
        .signer_infos
        .first()
        .map(|info| info.sequence)
        .unwrap_or_default();

    Ok(SignedTxSummary {
        sequence,
        message_count: body.messages.len(),
        memo: body.memo,
    })
}
