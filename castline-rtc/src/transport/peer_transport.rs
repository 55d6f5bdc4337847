use crate::transport::TransportEvent;
use anyhow::Result;
use async_trait::async_trait;
use castline_core::{IceCandidate, PeerId};
use std::sync::Arc;
use tokio::sync::mpsc;
use webrtc::track::track_local::TrackLocal;

/// One negotiated peer connection, seen from the side that owns it.
///
/// `create_offer` and `create_answer` also install the result as the local
/// description. Callers are responsible for ordering: candidates must only
/// reach `add_ice_candidate` after a remote description was applied.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    async fn add_track(&self, track: Arc<dyn TrackLocal + Send + Sync>) -> Result<()>;

    async fn create_offer(&self) -> Result<String>;

    async fn create_answer(&self) -> Result<String>;

    async fn set_remote_offer(&self, sdp: String) -> Result<()>;

    async fn set_remote_answer(&self, sdp: String) -> Result<()>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

/// Creates transports that report into a given event channel.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    async fn create(
        &self,
        peer_id: PeerId,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Box<dyn PeerTransport>>;
}
