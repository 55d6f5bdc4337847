use std::fmt;

/// Why a link was torn down before either side asked for it to end normally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LossReason {
    /// The viewer announced it was leaving.
    Left,
    TransportFailed,
    TransportClosed,
    /// Setting up the offer/answer exchange failed locally.
    NegotiationFailed(String),
    /// No connection within the negotiation window after the offer.
    NegotiationTimeout,
    /// The transport stayed disconnected past the grace period.
    DisconnectTimeout,
}

impl fmt::Display for LossReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Left => write!(f, "peer left"),
            Self::TransportFailed => write!(f, "transport failed"),
            Self::TransportClosed => write!(f, "transport closed"),
            Self::NegotiationFailed(e) => write!(f, "negotiation failed: {e}"),
            Self::NegotiationTimeout => write!(f, "negotiation timed out"),
            Self::DisconnectTimeout => write!(f, "disconnected for too long"),
        }
    }
}
