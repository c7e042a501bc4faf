//! secp256k1 signing accounts derived from BIP-39 mnemonics.
//!
//! Cosmos accounts use:
//! - BIP-39 seed from the mnemonic (empty passphrase)
//! - BIP-32 derivation along the chain's HD path (e.g. `m/44'/118'/0'/0/0`)
//! - bech32 address of `ripemd160(sha256(compressed_pubkey))`

use bech32::{ToBase32, Variant};
use bip32::{DerivationPath, XPrv};
use bip39::{Language, Mnemonic};
use k256::ecdsa::{signature::Signer, Signature, SigningKey};
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};
use std::fmt;

/// Errors deriving a signing account.
#[derive(Debug, thiserror::Error)]
pub enum KeyDerivationError {
    #[error("invalid mnemonic: {0}")]
    Mnemonic(bip39::Error),

    #[error("invalid derivation path '{path}': {source}")]
    Path { path: String, source: bip32::Error },

    #[error("key derivation failed: {0}")]
    Derivation(bip32::Error),

    #[error("address encoding failed: {0}")]
    Address(#[from] bech32::Error),
}

/// A secp256k1 key pair plus its bech32 account address.
#[derive(Clone)]
pub struct SigningAccount {
    address: String,
    public_key: [u8; 33],
    signing_key: SigningKey,
}

impl SigningAccount {
    /// Recover an account from a mnemonic along `hd_path`, encoding the
    /// address with `prefix`.
    pub fn from_mnemonic(
        mnemonic: &str,
        hd_path: &str,
        prefix: &str,
    ) -> Result<Self, KeyDerivationError> {
        // 12 to 24 words, as Cosmos keyrings produce.
        let mnemonic = Mnemonic::parse_in_normalized(Language::English, mnemonic.trim())
            .map_err(KeyDerivationError::Mnemonic)?;
        let path: DerivationPath =
            hd_path
                .parse()
                .map_err(|source| KeyDerivationError::Path {
                    path: hd_path.to_string(),
                    source,
                })?;
        let seed = mnemonic.to_seed("");
        let xprv = XPrv::derive_from_path(seed, &path)
            .map_err(KeyDerivationError::Derivation)?;

        let signing_key = xprv.private_key().clone();
        Self::from_signing_key(signing_key, prefix)
    }

    /// Build an account from an existing key.
    pub fn from_signing_key(
        signing_key: SigningKey,
        prefix: &str,
    ) -> Result<Self, KeyDerivationError> {
        let point = signing_key.verifying_key().to_encoded_point(true);
        let mut public_key = [0u8; 33];
        public_key.copy_from_slice(point.as_bytes());
        let address = account_address(&public_key, prefix)?;

        Ok(Self {
            address,
            public_key,
            signing_key,
        })
    }

    /// Bech32 account address.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Compressed public key (33 bytes).
    pub fn public_key(&self) -> &[u8; 33] {
        &self.public_key
    }

    /// Sign `message` (SHA-256, RFC 6979, low-S). Returns the 64-byte `r || s`.
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        let signature: Signature = self.signing_key.sign(message);
        signature.to_bytes().to_vec()
    }
}

impl fmt::Debug for SigningAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningAccount")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// Bech32 address for a compressed secp256k1 public key.
pub fn account_address(public_key: &[u8; 33], prefix: &str) -> Result<String, bech32::Error> {
    let sha = Sha256::digest(public_key);
    let hash = Ripemd160::digest(sha);
    bech32::encode(prefix, hash.to_base32(), Variant::Bech32)
}
