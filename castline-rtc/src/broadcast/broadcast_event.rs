use crate::link::LossReason;
use castline_core::PeerId;

/// What a broadcaster reports to its host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BroadcastEvent {
    /// Number of live viewer links, sent whenever it changes.
    ViewerCountChanged(usize),

    /// The transport to a viewer is up for the first time.
    ViewerConnected { peer_id: PeerId },

    ViewerLost { peer_id: PeerId, reason: LossReason },
}
