use crate::media::RemoteTrack;
use castline_core::{IceCandidate, PeerId};
use std::fmt;
use std::sync::Arc;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;

/// Connection-level state reported by a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl From<RTCPeerConnectionState> for TransportState {
    fn from(state: RTCPeerConnectionState) -> Self {
        match state {
            RTCPeerConnectionState::Unspecified | RTCPeerConnectionState::New => Self::New,
            RTCPeerConnectionState::Connecting => Self::Connecting,
            RTCPeerConnectionState::Connected => Self::Connected,
            RTCPeerConnectionState::Disconnected => Self::Disconnected,
            RTCPeerConnectionState::Failed => Self::Failed,
            RTCPeerConnectionState::Closed => Self::Closed,
        }
    }
}

/// Events a transport pushes to the actor that owns its link.
pub enum TransportEvent {
    /// A local candidate was discovered and must be trickled to the remote side.
    CandidateGenerated(PeerId, IceCandidate),

    StateChanged(PeerId, TransportState),

    /// Remote media arrived on the link.
    TrackReceived(PeerId, Arc<dyn RemoteTrack>),
}

impl TransportEvent {
    pub fn peer_id(&self) -> &PeerId {
        match self {
            Self::CandidateGenerated(peer_id, _)
            | Self::StateChanged(peer_id, _)
            | Self::TrackReceived(peer_id, _) => peer_id,
        }
    }
}

impl fmt::Debug for TransportEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CandidateGenerated(peer_id, candidate) => f
                .debug_tuple("CandidateGenerated")
                .field(peer_id)
                .field(&candidate.candidate)
                .finish(),
            Self::StateChanged(peer_id, state) => f
                .debug_tuple("StateChanged")
                .field(peer_id)
                .field(state)
                .finish(),
            Self::TrackReceived(peer_id, track) => f
                .debug_tuple("TrackReceived")
                .field(peer_id)
                .field(&track.id())
                .finish(),
        }
    }
}
