//! Transfer parameters shared by every transaction of one chain pair.

use crate::{Coin, IbcHeight, ResolvedTimeout};

/// Default relative packet timeout height (`0-1000`).
pub const DEFAULT_PACKET_TIMEOUT_HEIGHT: IbcHeight = IbcHeight {
    revision_number: 0,
    revision_height: 1000,
};

/// Default relative packet timeout: 10 minutes in nanoseconds.
pub const DEFAULT_PACKET_TIMEOUT_TIMESTAMP: u64 = 600_000_000_000;

/// Packet timeout settings as given on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketTimeout {
    /// Timeout height; `0-0` disables it.
    pub height: IbcHeight,
    /// Timeout timestamp in nanoseconds; `0` disables it.
    pub timestamp_nanos: u64,
    /// Treat the values as absolute instead of relative to the latest state.
    pub absolute: bool,
}

impl Default for PacketTimeout {
    fn default() -> Self {
        Self {
            height: DEFAULT_PACKET_TIMEOUT_HEIGHT,
            timestamp_nanos: DEFAULT_PACKET_TIMEOUT_TIMESTAMP,
            absolute: false,
        }
    }
}

impl PacketTimeout {
    /// Resolve to absolute values.
    ///
    /// Relative heights are offset from the counterparty client's latest
    /// height; when that height is unknown the height timeout is dropped and
    /// only the timestamp applies. Relative timestamps are offset from `now_nanos`.
    pub fn resolve(&self, now_nanos: u64, counterparty_height: Option<IbcHeight>) -> ResolvedTimeout {
        if self.absolute {
            return ResolvedTimeout {
                height: (!self.height.is_zero()).then_some(self.height),
                timestamp_nanos: self.timestamp_nanos,
            };
        }

        let height = if self.height.is_zero() {
            None
        } else {
            counterparty_height.map(|latest| latest.offset_by(self.height))
        };
        let timestamp_nanos = if self.timestamp_nanos == 0 {
            0
        } else {
            now_nanos.saturating_add(self.timestamp_nanos)
        };

        ResolvedTimeout {
            height,
            timestamp_nanos,
        }
    }
}

/// What every transaction of one (source, destination) pair transfers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferSpec {
    /// Token and amount sent by each message.
    pub coin: Coin,
    /// Receiver address on the destination chain.
    pub receiver: String,
    /// Source port (usually `transfer`).
    pub source_port: String,
    /// Source channel routing to the destination chain.
    pub source_channel: String,
    /// Transfer messages per transaction.
    pub msgs_per_tx: usize,
    /// Packet timeout settings.
    pub timeout: PacketTimeout,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_timeout() {
        let timeout = PacketTimeout::default();
        let resolved = timeout.resolve(1_000, Some(IbcHeight::new(1, 50)));
        assert_eq!(resolved.height, Some(IbcHeight::new(1, 1050)));
        assert_eq!(resolved.timestamp_nanos, 1_000 + DEFAULT_PACKET_TIMEOUT_TIMESTAMP);
    }

    #[test]
    fn test_relative_height_without_counterparty() {
        let resolved = PacketTimeout::default().resolve(0, None);
        assert_eq!(resolved.height, None);
        assert_eq!(resolved.timestamp_nanos, DEFAULT_PACKET_TIMEOUT_TIMESTAMP);
    }

    #[test]
    fn test_absolute_and_disabled_timeouts() {
        let absolute = PacketTimeout {
            height: IbcHeight::new(2, 9),
            timestamp_nanos: 77,
            absolute: true,
        };
        let resolved = absolute.resolve(1_000, Some(IbcHeight::new(1, 50)));
        assert_eq!(resolved.height, Some(IbcHeight::new(2, 9)));
        assert_eq!(resolved.timestamp_nanos, 77);

        let disabled = PacketTimeout {
            height: IbcHeight::default(),
            timestamp_nanos: 0,
            absolute: false,
        };
        assert_eq!(disabled.resolve(1_000, Some(IbcHeight::new(1, 50))), ResolvedTimeout::default());
    }
}
