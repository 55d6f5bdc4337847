use crate::error::CoreError;
use crate::model::ice::IceCandidate;
use crate::model::peer::PeerId;
use serde::{Deserialize, Serialize};

/// Kind-specific body of a [`SignalMessage`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "kebab-case")]
pub enum SignalPayload {
    /// Viewer asks the broadcaster for a peer connection.
    Join,
    Offer {
        sdp: String,
    },
    Answer {
        sdp: String,
    },
    Candidate(IceCandidate),
    /// Broadcaster announces that it is live.
    StreamActive,
    /// Broadcaster announces that it stopped; every viewer tears down.
    StreamEnded,
    /// Viewer tells the broadcaster it is going away.
    Leave,
}

impl SignalPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Join => "join",
            Self::Offer { .. } => "offer",
            Self::Answer { .. } => "answer",
            Self::Candidate(_) => "candidate",
            Self::StreamActive => "stream-active",
            Self::StreamEnded => "stream-ended",
            Self::Leave => "leave",
        }
    }
}

/// The unit published on a stream topic.
///
/// A message without `to` is meant for every participant of the topic.
/// Publishers receive their own messages back, so handlers are expected to
/// drop anything whose `from` is themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalMessage {
    pub from: PeerId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<PeerId>,
    pub signal: SignalPayload,
}

impl SignalMessage {
    pub fn broadcast(from: PeerId, signal: SignalPayload) -> Self {
        Self {
            from,
            to: None,
            signal,
        }
    }

    pub fn addressed(from: PeerId, to: PeerId, signal: SignalPayload) -> Self {
        Self {
            from,
            to: Some(to),
            signal,
        }
    }

    pub fn is_addressed_to(&self, peer_id: &PeerId) -> bool {
        self.to.as_ref() == Some(peer_id)
    }

    pub fn encode(&self) -> Result<String, CoreError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(text: &str) -> Result<Self, CoreError> {
        Ok(serde_json::from_str(text)?)
    }
}
