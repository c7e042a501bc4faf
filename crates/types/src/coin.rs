//! Coins and IBC denomination handling.

use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// A fungible token amount.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Coin {
    pub denom: String,
    pub amount: u128,
}

/// Error parsing a coin string such as `10uatom`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoinError {
    #[error("invalid coin '{0}': expected <amount><denom>")]
    Malformed(String),

    #[error("invalid coin amount in '{0}'")]
    Amount(String),

    #[error("invalid denom '{0}'")]
    Denom(String),
}

impl Coin {
    pub fn new(denom: impl Into<String>, amount: u128) -> Self {
        Self {
            denom: denom.into(),
            amount,
        }
    }

    /// Rewrite a traced denom (`transfer/channel-0/uatom`) into its
    /// `ibc/<HASH>` form. Native and already-hashed denoms are unchanged.
    pub fn normalize_ibc_denom(mut self) -> Self {
        self.denom = ibc_denom(&self.denom);
        self
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

impl FromStr for Coin {
    type Err = CoinError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| CoinError::Malformed(s.to_string()))?;
        if split == 0 {
            return Err(CoinError::Malformed(s.to_string()));
        }
        let (amount, denom) = s.split_at(split);
        let amount = amount
            .parse::<u128>()
            .map_err(|_| CoinError::Amount(s.to_string()))?;
        if !is_valid_denom(denom) {
            return Err(CoinError::Denom(denom.to_string()));
        }
        Ok(Coin::new(denom, amount))
    }
}

impl From<&Coin> for ibc_proto::cosmos::base::v1beta1::Coin {
    fn from(coin: &Coin) -> Self {
        Self {
            denom: coin.denom.clone(),
            amount: coin.amount.to_string(),
        }
    }
}

/// Denoms are 3-128 chars: a letter followed by `[a-zA-Z0-9/:._-]`.
fn is_valid_denom(denom: &str) -> bool {
    let mut chars = denom.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (3..=128).contains(&denom.len())
        && first.is_ascii_alphabetic()
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | ':' | '.' | '_' | '-'))
}

/// ICS-20 voucher denom for a traced denomination.
pub fn ibc_denom(denom: &str) -> String {
    if denom.starts_with("ibc/") || !denom.contains('/') {
        return denom.to_string();
    }
    let digest = Sha256::digest(denom.as_bytes());
    format!("ibc/{}", hex::encode_upper(digest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_coin() {
        let coin: Coin = "10uatom".parse().unwrap();
        assert_eq!(coin, Coin::new("uatom", 10));
        assert_eq!(coin.to_string(), "10uatom");
    }

    #[test]
    fn test_parse_coin_errors() {
        assert!(matches!("uatom".parse::<Coin>(), Err(CoinError::Malformed(_))));
        assert!(matches!("10".parse::<Coin>(), Err(CoinError::Malformed(_))));
        assert!(matches!("10u".parse::<Coin>(), Err(CoinError::Denom(_))));
        assert!(matches!("10.5uatom".parse::<Coin>(), Err(CoinError::Denom(_))));
    }

    #[test]
    fn test_native_denom_unchanged() {
        assert_eq!(ibc_denom("uatom"), "uatom");
        assert_eq!(ibc_denom("ibc/ABCDEF"), "ibc/ABCDEF");
    }

    #[test]
    fn test_traced_denom_is_hashed() {
        // ATOM as seen on Osmosis over channel-0
        assert_eq!(
            ibc_denom("transfer/channel-0/uatom"),
            "ibc/27394FB092D2ECCD56123C74F36E4C1F926001CEADA9CA97EA622B25F41E5EB2"
        );

        let coin = Coin::new("transfer/channel-0/uatom", 5).normalize_ibc_denom();
        assert!(coin.denom.starts_with("ibc/"));
    }
}
