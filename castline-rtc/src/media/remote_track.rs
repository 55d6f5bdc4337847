use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;
use std::sync::Arc;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::track::track_remote::TrackRemote;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Audio,
    Video,
    Unknown,
}

impl From<RTPCodecType> for TrackKind {
    fn from(kind: RTPCodecType) -> Self {
        match kind {
            RTPCodecType::Audio => Self::Audio,
            RTPCodecType::Video => Self::Video,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Audio => write!(f, "audio"),
            Self::Video => write!(f, "video"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// One track of inbound media on a viewer link.
#[async_trait]
pub trait RemoteTrack: Send + Sync {
    fn id(&self) -> String;

    fn kind(&self) -> TrackKind;

    fn stream_id(&self) -> String;

    /// Waits for the next RTP packet and returns its payload.
    async fn read_payload(&self) -> Result<Bytes>;
}

#[async_trait]
impl RemoteTrack for TrackRemote {
    fn id(&self) -> String {
        TrackRemote::id(self)
    }

    fn kind(&self) -> TrackKind {
        TrackRemote::kind(self).into()
    }

    fn stream_id(&self) -> String {
        TrackRemote::stream_id(self)
    }

    async fn read_payload(&self) -> Result<Bytes> {
        let (packet, _) = self.read_rtp().await?;
        Ok(packet.payload)
    }
}

/// The media a viewer receives while connected.
#[derive(Clone, Default)]
pub struct InboundStream {
    tracks: Vec<Arc<dyn RemoteTrack>>,
}

impl InboundStream {
    pub fn new(first: Arc<dyn RemoteTrack>) -> Self {
        Self {
            tracks: vec![first],
        }
    }

    pub fn push(&mut self, track: Arc<dyn RemoteTrack>) {
        self.tracks.push(track);
    }

    pub fn tracks(&self) -> &[Arc<dyn RemoteTrack>] {
        &self.tracks
    }

    pub fn track(&self, kind: TrackKind) -> Option<&Arc<dyn RemoteTrack>> {
        self.tracks.iter().find(|t| t.kind() == kind)
    }
}

impl fmt::Debug for InboundStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.tracks.iter().map(|t| format!("{}:{}", t.kind(), t.id())))
            .finish()
    }
}
