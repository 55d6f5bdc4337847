use crate::config::CastConfig;
use crate::error::CastError;
use crate::link::{LinkSnapshot, PeerLink, spawn_timer};
use crate::media::InboundStream;
use crate::signaling::{SignalBus, SignalHandler};
use crate::transport::TransportFactory;
use crate::viewer::viewer_actor::{ViewerActor, ViewerContext};
use crate::viewer::viewer_command::ViewerCommand;
use crate::viewer::viewer_event::{ViewerEvent, ViewerStatus};
use castline_core::{LinkInput, PeerId, Role, SignalMessage, SignalPayload, StreamId};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::info;

/// Watches one stream.
///
/// Each [`connect`](Self::connect) is a fresh attempt with a new peer id;
/// its outcome arrives as [`ViewerEvent`]s and through
/// [`watch_status`](Self::watch_status).
pub struct Viewer {
    stream_id: StreamId,
    bus: Arc<dyn SignalBus>,
    transports: Arc<dyn TransportFactory>,
    config: CastConfig,
    events: mpsc::UnboundedSender<ViewerEvent>,
    status: Arc<watch::Sender<ViewerStatus>>,
    inbound: Arc<watch::Sender<Option<InboundStream>>>,
    peer_id: Option<PeerId>,
    command_tx: Option<mpsc::UnboundedSender<ViewerCommand>>,
}

impl Viewer {
    pub fn new(
        stream_id: StreamId,
        bus: Arc<dyn SignalBus>,
        transports: Arc<dyn TransportFactory>,
        config: CastConfig,
    ) -> (Self, mpsc::UnboundedReceiver<ViewerEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let (status, _) = watch::channel(ViewerStatus::Idle);
        let (inbound, _) = watch::channel(None);

        let viewer = Self {
            stream_id,
            bus,
            transports,
            config,
            events,
            status: Arc::new(status),
            inbound: Arc::new(inbound),
            peer_id: None,
            command_tx: None,
        };
        (viewer, events_rx)
    }

    pub fn stream_id(&self) -> &StreamId {
        &self.stream_id
    }

    /// Id of the current attempt, if any.
    pub fn peer_id(&self) -> Option<&PeerId> {
        self.peer_id.as_ref()
    }

    pub fn status(&self) -> ViewerStatus {
        *self.status.borrow()
    }

    pub fn watch_status(&self) -> watch::Receiver<ViewerStatus> {
        self.status.subscribe()
    }

    /// The inbound media; `Some` only while connected.
    pub fn inbound(&self) -> Option<InboundStream> {
        self.inbound.borrow().clone()
    }

    pub fn watch_inbound(&self) -> watch::Receiver<Option<InboundStream>> {
        self.inbound.subscribe()
    }

    /// State of the link of the current attempt, if one is still open.
    pub async fn link_state(&self) -> Option<LinkSnapshot> {
        let tx = self.command_tx.as_ref()?;
        let (reply, rx) = oneshot::channel();
        tx.send(ViewerCommand::Snapshot { reply }).ok()?;
        rx.await.ok().flatten()
    }

    /// Starts a new attempt: subscribes, publishes `join` and arms the
    /// connect timeout. Any previous attempt is torn down first.
    pub async fn connect(&mut self) -> Result<PeerId, CastError> {
        self.disconnect().await;

        let peer_id = PeerId::new();
        let topic = self.stream_id.topic().to_owned();

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let handler_tx = command_tx.clone();
        let handler: SignalHandler = Arc::new(move |msg| {
            let _ = handler_tx.send(ViewerCommand::Signal(msg));
        });
        let subscription = self.bus.subscribe(&topic, handler).await?;

        let (transport_tx, transport_rx) = mpsc::channel(self.config.event_buffer.max(1));
        let transport = match self.transports.create(peer_id.clone(), transport_tx).await {
            Ok(t) => t,
            Err(e) => {
                self.bus.unsubscribe(&subscription).await;
                return Err(e.into());
            }
        };
        let mut link = PeerLink::new(peer_id.clone(), Role::Viewer, transport);

        let join = SignalMessage::broadcast(peer_id.clone(), SignalPayload::Join);
        if let Err(e) = self.bus.publish(&topic, join).await {
            link.close(LinkInput::Close).await;
            self.bus.unsubscribe(&subscription).await;
            return Err(e.into());
        }
        link.advance(LinkInput::Join);

        let connect_timer = spawn_timer(
            self.config.connect_timeout,
            command_tx.clone(),
            ViewerCommand::ConnectTimeout,
        );
        self.status.send_replace(ViewerStatus::Connecting);

        let ctx = ViewerContext {
            peer_id: peer_id.clone(),
            stream_id: self.stream_id.clone(),
            bus: self.bus.clone(),
            config: self.config.clone(),
            events: self.events.clone(),
            status: self.status.clone(),
            inbound: self.inbound.clone(),
        };
        let actor = ViewerActor::new(
            ctx,
            link,
            subscription,
            connect_timer,
            command_rx,
            command_tx.clone(),
            transport_rx,
        );
        tokio::spawn(actor.run());

        info!("Joining '{}' as {}", self.stream_id, peer_id);
        self.peer_id = Some(peer_id.clone());
        self.command_tx = Some(command_tx);
        Ok(peer_id)
    }

    /// Leaves the stream and clears local state. Safe to call at any time,
    /// any number of times.
    pub async fn disconnect(&mut self) {
        if let Some(tx) = self.command_tx.take() {
            let (done, rx) = oneshot::channel();
            if tx.send(ViewerCommand::Disconnect { done: Some(done) }).is_ok() {
                let _ = rx.await;
            }
        }
        self.peer_id = None;
        self.inbound.send_replace(None);
        self.status.send_replace(ViewerStatus::Idle);
    }
}

impl Drop for Viewer {
    fn drop(&mut self) {
        if let Some(tx) = self.command_tx.take() {
            let _ = tx.send(ViewerCommand::Disconnect { done: None });
        }
    }
}
