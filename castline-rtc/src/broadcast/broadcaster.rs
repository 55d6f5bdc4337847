use crate::broadcast::broadcast_actor::{BroadcastActor, BroadcastContext};
use crate::broadcast::broadcast_command::BroadcastCommand;
use crate::broadcast::broadcast_event::BroadcastEvent;
use crate::config::CastConfig;
use crate::error::CastError;
use crate::link::LinkSnapshot;
use crate::media::MediaSource;
use crate::signaling::{SignalBus, SignalHandler};
use crate::transport::TransportFactory;
use castline_core::{PeerId, SignalMessage, SignalPayload, StreamId};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{info, warn};

/// Publishes one stream to every viewer that joins it.
///
/// The handle is cheap to hold; the links themselves live on a background
/// task created by [`start`](Self::start) and torn down by
/// [`stop`](Self::stop) or when the handle is dropped.
pub struct Broadcaster {
    id: PeerId,
    stream_id: StreamId,
    bus: Arc<dyn SignalBus>,
    transports: Arc<dyn TransportFactory>,
    config: CastConfig,
    events: mpsc::UnboundedSender<BroadcastEvent>,
    viewer_count: Arc<watch::Sender<usize>>,
    command_tx: Option<mpsc::UnboundedSender<BroadcastCommand>>,
}

impl Broadcaster {
    pub fn new(
        stream_id: StreamId,
        bus: Arc<dyn SignalBus>,
        transports: Arc<dyn TransportFactory>,
        config: CastConfig,
    ) -> (Self, mpsc::UnboundedReceiver<BroadcastEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let (viewer_count, _) = watch::channel(0);

        let broadcaster = Self {
            id: PeerId::new(),
            stream_id,
            bus,
            transports,
            config,
            events,
            viewer_count: Arc::new(viewer_count),
            command_tx: None,
        };
        (broadcaster, events_rx)
    }

    pub fn id(&self) -> &PeerId {
        &self.id
    }

    pub fn stream_id(&self) -> &StreamId {
        &self.stream_id
    }

    pub fn is_active(&self) -> bool {
        self.command_tx.as_ref().is_some_and(|tx| !tx.is_closed())
    }

    /// Live viewer links right now.
    pub fn viewer_count(&self) -> usize {
        *self.viewer_count.borrow()
    }

    pub fn watch_viewer_count(&self) -> watch::Receiver<usize> {
        self.viewer_count.subscribe()
    }

    /// Current links and their states. Empty while inactive.
    pub async fn links(&self) -> Vec<LinkSnapshot> {
        let Some(tx) = &self.command_tx else {
            return Vec::new();
        };
        let (reply, rx) = oneshot::channel();
        if tx.send(BroadcastCommand::Snapshot { reply }).is_err() {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }

    /// Goes live with `source`: subscribes to the stream topic and
    /// announces `stream-active`.
    ///
    /// Fails without touching anything if this handle is already live.
    pub async fn start(&mut self, source: Arc<dyn MediaSource>) -> Result<(), CastError> {
        if self.is_active() {
            return Err(CastError::AlreadyBroadcasting(self.stream_id.clone()));
        }

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let handler_tx = command_tx.clone();
        let handler: SignalHandler = Arc::new(move |msg| {
            let _ = handler_tx.send(BroadcastCommand::Signal(msg));
        });
        let subscription = self.bus.subscribe(self.stream_id.topic(), handler).await?;

        let ctx = BroadcastContext {
            id: self.id.clone(),
            stream_id: self.stream_id.clone(),
            bus: self.bus.clone(),
            transports: self.transports.clone(),
            config: self.config.clone(),
            events: self.events.clone(),
            viewer_count: self.viewer_count.clone(),
        };
        let actor = BroadcastActor::new(ctx, source, subscription, command_rx, command_tx.clone());
        tokio::spawn(actor.run());
        self.command_tx = Some(command_tx);

        let announce = SignalMessage::broadcast(self.id.clone(), SignalPayload::StreamActive);
        if let Err(e) = self.bus.publish(self.stream_id.topic(), announce).await {
            warn!("Could not announce '{}': {}", self.stream_id, e);
            self.stop().await;
            return Err(e.into());
        }

        info!("Broadcasting '{}' as {}", self.stream_id, self.id);
        Ok(())
    }

    /// Closes every link, leaves the topic and stops the media source.
    /// Does nothing when not live.
    pub async fn stop(&mut self) {
        let Some(tx) = self.command_tx.take() else {
            return;
        };
        let (done, rx) = oneshot::channel();
        if tx.send(BroadcastCommand::Shutdown { done: Some(done) }).is_ok() {
            let _ = rx.await;
        }
    }
}

impl Drop for Broadcaster {
    fn drop(&mut self) {
        if let Some(tx) = self.command_tx.take() {
            let _ = tx.send(BroadcastCommand::Shutdown { done: None });
        }
    }
}
