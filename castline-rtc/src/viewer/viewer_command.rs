use crate::link::LinkSnapshot;
use castline_core::SignalMessage;
use tokio::sync::oneshot;

#[derive(Debug)]
pub(crate) enum ViewerCommand {
    Signal(SignalMessage),

    ConnectTimeout,

    DisconnectGrace,

    Snapshot {
        reply: oneshot::Sender<Option<LinkSnapshot>>,
    },

    /// Leave the stream, close the link and exit.
    Disconnect { done: Option<oneshot::Sender<()>> },
}
