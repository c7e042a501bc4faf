//! Domain-specific identifier types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Chain identifier as reported by the node (`node_info.network`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainId(pub String);

impl ChainId {
    /// Create a chain id from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChainId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Block height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockHeight(pub u64);

impl BlockHeight {
    /// Get the next block height.
    pub fn next(self) -> Self {
        BlockHeight(self.0 + 1)
    }

    /// Get the previous block height (returns None at zero).
    pub fn prev(self) -> Option<Self> {
        if self.0 > 0 {
            Some(BlockHeight(self.0 - 1))
        } else {
            None
        }
    }

    /// Height `n` blocks above this one.
    pub fn plus(self, n: u64) -> Self {
        BlockHeight(self.0 + n)
    }
}

impl fmt::Display for BlockHeight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// IBC height: `{revision_number}-{revision_height}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct IbcHeight {
    pub revision_number: u64,
    pub revision_height: u64,
}

impl IbcHeight {
    pub fn new(revision_number: u64, revision_height: u64) -> Self {
        Self {
            revision_number,
            revision_height,
        }
    }

    /// `0-0` disables height-based packet timeouts.
    pub fn is_zero(&self) -> bool {
        self.revision_number == 0 && self.revision_height == 0
    }

    /// Offset this height by a relative timeout height.
    pub fn offset_by(self, relative: IbcHeight) -> Self {
        Self {
            revision_number: self.revision_number + relative.revision_number,
            revision_height: self.revision_height + relative.revision_height,
        }
    }
}

impl fmt::Display for IbcHeight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.revision_number, self.revision_height)
    }
}

/// Error parsing an IBC height string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid IBC height '{0}', expected <revision-number>-<revision-height>")]
pub struct ParseHeightError(pub String);

impl FromStr for IbcHeight {
    type Err = ParseHeightError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (number, height) = s
            .split_once('-')
            .ok_or_else(|| ParseHeightError(s.to_string()))?;
        let revision_number = number
            .parse()
            .map_err(|_| ParseHeightError(s.to_string()))?;
        let revision_height = height
            .parse()
            .map_err(|_| ParseHeightError(s.to_string()))?;
        Ok(Self::new(revision_number, revision_height))
    }
}

impl From<IbcHeight> for ibc_proto::ibc::core::client::v1::Height {
    fn from(h: IbcHeight) -> Self {
        Self {
            revision_number: h.revision_number,
            revision_height: h.revision_height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_height_navigation() {
        let h = BlockHeight(10);
        assert_eq!(h.next(), BlockHeight(11));
        assert_eq!(h.prev(), Some(BlockHeight(9)));
        assert_eq!(BlockHeight(0).prev(), None);
        assert_eq!(h.plus(2), BlockHeight(12));
    }

    #[test]
    fn test_ibc_height_parse() {
        let h: IbcHeight = "1-1000".parse().unwrap();
        assert_eq!(h, IbcHeight::new(1, 1000));
        assert_eq!(h.to_string(), "1-1000");
        assert!("0-0".parse::<IbcHeight>().unwrap().is_zero());
        assert!("1000".parse::<IbcHeight>().is_err());
        assert!("a-b".parse::<IbcHeight>().is_err());
    }

    #[test]
    fn test_ibc_height_offset() {
        let latest = IbcHeight::new(1, 500);
        assert_eq!(latest.offset_by(IbcHeight::new(0, 1000)), IbcHeight::new(1, 1500));
    }
}
