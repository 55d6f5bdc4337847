use crate::link::LossReason;
use castline_core::PeerId;
use std::fmt;

/// What a viewer reports to its host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewerEvent {
    /// A broadcaster announced the stream. Joining is left to the host.
    StreamAvailable { broadcaster: PeerId },

    /// First inbound media arrived.
    Connected,

    /// No media within the connect timeout. Not retried.
    ConnectTimeout,

    ConnectionLost { reason: LossReason },

    StreamEnded,
}

/// Where the current connect attempt stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewerStatus {
    #[default]
    Idle,
    Connecting,
    Connected,
    TimedOut,
    Lost,
    Ended,
}

impl fmt::Display for ViewerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::TimedOut => "timed out",
            Self::Lost => "connection lost",
            Self::Ended => "stream ended",
        })
    }
}
