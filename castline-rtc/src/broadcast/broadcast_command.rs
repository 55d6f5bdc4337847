use crate::link::LinkSnapshot;
use castline_core::{PeerId, SignalMessage};
use tokio::sync::oneshot;

/// Inputs of a broadcast actor other than transport events.
#[derive(Debug)]
pub(crate) enum BroadcastCommand {
    /// A message delivered on the stream topic.
    Signal(SignalMessage),

    NegotiationTimeout { peer_id: PeerId },

    DisconnectGrace { peer_id: PeerId },

    Snapshot { reply: oneshot::Sender<Vec<LinkSnapshot>> },

    /// Tear everything down and exit. `done` fires once the media source
    /// has been stopped.
    Shutdown { done: Option<oneshot::Sender<()>> },
}
