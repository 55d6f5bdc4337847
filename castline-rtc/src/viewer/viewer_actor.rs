use crate::config::CastConfig;
use crate::link::{LossReason, PeerLink, spawn_timer};
use crate::media::{InboundStream, RemoteTrack};
use crate::signaling::{SignalBus, SubscriptionHandle};
use crate::transport::{TransportEvent, TransportState};
use crate::viewer::viewer_command::ViewerCommand;
use crate::viewer::viewer_event::{ViewerEvent, ViewerStatus};
use castline_core::{
    IceCandidate, LinkInput, LinkState, PeerId, SignalMessage, SignalPayload, StreamId,
};
use std::ops::ControlFlow;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

pub(crate) struct ViewerContext {
    pub peer_id: PeerId,
    pub stream_id: StreamId,
    pub bus: Arc<dyn SignalBus>,
    pub config: CastConfig,
    pub events: mpsc::UnboundedSender<ViewerEvent>,
    pub status: Arc<watch::Sender<ViewerStatus>>,
    pub inbound: Arc<watch::Sender<Option<InboundStream>>>,
}

/// Runs one connect attempt against the broadcaster of a stream.
pub(crate) struct ViewerActor {
    ctx: ViewerContext,
    link: Option<PeerLink>,
    broadcaster: Option<PeerId>,
    subscription: SubscriptionHandle,
    connect_timer: Option<JoinHandle<()>>,
    connected_once: bool,
    command_rx: mpsc::UnboundedReceiver<ViewerCommand>,
    command_tx: mpsc::UnboundedSender<ViewerCommand>,
    transport_rx: mpsc::Receiver<TransportEvent>,
}

impl ViewerActor {
    pub fn new(
        ctx: ViewerContext,
        link: PeerLink,
        subscription: SubscriptionHandle,
        connect_timer: JoinHandle<()>,
        command_rx: mpsc::UnboundedReceiver<ViewerCommand>,
        command_tx: mpsc::UnboundedSender<ViewerCommand>,
        transport_rx: mpsc::Receiver<TransportEvent>,
    ) -> Self {
        Self {
            ctx,
            link: Some(link),
            broadcaster: None,
            subscription,
            connect_timer: Some(connect_timer),
            connected_once: false,
            command_rx,
            command_tx,
            transport_rx,
        }
    }

    pub async fn run(mut self) {
        debug!("Viewer {} session started", self.ctx.peer_id);

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(ViewerCommand::Disconnect { done }) => {
                            self.leave().await;
                            if let Some(done) = done {
                                let _ = done.send(());
                            }
                            break;
                        }
                        Some(c) => {
                            if self.handle_command(c).await.is_break() {
                                break;
                            }
                        }
                        None => {
                            self.leave().await;
                            break;
                        }
                    }
                }

                Some(evt) = self.transport_rx.recv() => {
                    self.handle_transport_event(evt).await;
                }
            }
        }

        debug!("Viewer {} session finished", self.ctx.peer_id);
    }

    async fn handle_command(&mut self, cmd: ViewerCommand) -> ControlFlow<()> {
        match cmd {
            ViewerCommand::Signal(msg) => return self.handle_signal(msg).await,

            ViewerCommand::ConnectTimeout => self.on_connect_timeout().await,

            ViewerCommand::DisconnectGrace => {
                let still_down = self
                    .link
                    .as_ref()
                    .is_some_and(|link| link.state() == LinkState::Disconnected);
                if still_down {
                    self.lose(LossReason::DisconnectTimeout).await;
                }
            }

            ViewerCommand::Snapshot { reply } => {
                let _ = reply.send(self.link.as_ref().map(PeerLink::snapshot));
            }

            ViewerCommand::Disconnect { .. } => {}
        }
        ControlFlow::Continue(())
    }

    async fn handle_signal(&mut self, msg: SignalMessage) -> ControlFlow<()> {
        let SignalMessage { from, to, signal } = msg;

        if from == self.ctx.peer_id {
            return ControlFlow::Continue(());
        }
        let for_me = to.as_ref() == Some(&self.ctx.peer_id);
        if to.is_some() && !for_me {
            return ControlFlow::Continue(());
        }

        match signal {
            SignalPayload::StreamEnded if to.is_none() => {
                if self.is_from_other_broadcaster(&from) {
                    debug!("Ignoring stream-ended from {}", from);
                } else {
                    self.on_stream_ended().await;
                    return ControlFlow::Break(());
                }
            }
            SignalPayload::StreamActive if to.is_none() => {
                let _ = self
                    .ctx
                    .events
                    .send(ViewerEvent::StreamAvailable { broadcaster: from });
            }
            SignalPayload::Offer { sdp } if for_me => self.on_offer(from, sdp).await,
            SignalPayload::Candidate(candidate) if for_me => {
                self.on_candidate(from, candidate).await
            }
            other => debug!("Ignoring {} from {}", other.kind(), from),
        }
        ControlFlow::Continue(())
    }

    fn is_from_other_broadcaster(&self, from: &PeerId) -> bool {
        self.broadcaster.as_ref().is_some_and(|b| b != from)
    }

    async fn on_offer(&mut self, from: PeerId, sdp: String) {
        if self.is_from_other_broadcaster(&from) {
            debug!("Offer from unexpected peer {}", from);
            return;
        }
        if self.link.is_none() {
            debug!("Offer from {} after the attempt ended", from);
            self.send_leave(from).await;
            return;
        }
        let Some(link) = self.link.as_mut() else {
            return;
        };
        if !link.advance(LinkInput::OfferReceived) {
            return;
        }
        self.broadcaster = Some(from.clone());

        let answer = match link.apply_remote_offer(sdp).await {
            Ok(()) => link.transport().create_answer().await,
            Err(e) => Err(e),
        };

        match answer {
            Ok(sdp) => {
                link.advance(LinkInput::AnswerSent);
                self.publish(SignalMessage::addressed(
                    self.ctx.peer_id.clone(),
                    from,
                    SignalPayload::Answer { sdp },
                ))
                .await;
            }
            Err(e) => {
                error!("Failed to answer {}: {:#}", from, e);
                self.abandon_link(LinkInput::TransportFailed).await;
            }
        }
    }

    async fn on_candidate(&mut self, from: PeerId, candidate: IceCandidate) {
        if self.is_from_other_broadcaster(&from) {
            return;
        }
        if let Some(link) = self.link.as_mut() {
            link.add_candidate(candidate).await;
        }
    }

    async fn on_stream_ended(&mut self) {
        info!("Stream '{}' ended", self.ctx.stream_id);
        self.disarm_connect_timer();
        if let Some(mut link) = self.link.take() {
            link.close(LinkInput::Close).await;
        }
        self.ctx.inbound.send_replace(None);
        self.ctx.status.send_replace(ViewerStatus::Ended);
        let _ = self.ctx.events.send(ViewerEvent::StreamEnded);
        self.ctx.bus.unsubscribe(&self.subscription).await;
    }

    async fn on_connect_timeout(&mut self) {
        self.connect_timer = None;
        if self.connected_once {
            return;
        }
        warn!(
            "No media from '{}' within {:?}",
            self.ctx.stream_id, self.ctx.config.connect_timeout
        );
        self.abandon_link(LinkInput::Close).await;
        self.ctx.status.send_replace(ViewerStatus::TimedOut);
        let _ = self.ctx.events.send(ViewerEvent::ConnectTimeout);
    }

    async fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::CandidateGenerated(_, candidate) => {
                let Some(broadcaster) = self.broadcaster.clone() else {
                    debug!("Dropping local candidate, broadcaster unknown");
                    return;
                };
                if self.link.is_some() {
                    self.publish(SignalMessage::addressed(
                        self.ctx.peer_id.clone(),
                        broadcaster,
                        SignalPayload::Candidate(candidate),
                    ))
                    .await;
                }
            }

            TransportEvent::StateChanged(_, state) => self.on_transport_state(state).await,

            TransportEvent::TrackReceived(_, track) => self.on_track(track),
        }
    }

    async fn on_transport_state(&mut self, state: TransportState) {
        let Some(link) = self.link.as_mut() else {
            return;
        };

        match state {
            TransportState::New => {}

            TransportState::Connecting => {
                link.advance(LinkInput::TransportConnecting);
            }

            TransportState::Connected => {
                // Media arrival marks the first connection; this only recovers.
                if link.state() == LinkState::Disconnected && link.advance(LinkInput::MediaReady) {
                    link.disarm_timer();
                    info!("Connection to '{}' recovered", self.ctx.stream_id);
                    self.ctx.status.send_replace(ViewerStatus::Connected);
                }
            }

            TransportState::Disconnected => {
                if link.advance(LinkInput::TransportDisconnected) {
                    warn!("Connection to '{}' interrupted", self.ctx.stream_id);
                    link.arm_timer(spawn_timer(
                        self.ctx.config.disconnect_grace,
                        self.command_tx.clone(),
                        ViewerCommand::DisconnectGrace,
                    ));
                }
            }

            TransportState::Failed => self.lose(LossReason::TransportFailed).await,

            TransportState::Closed => self.lose(LossReason::TransportClosed).await,
        }
    }

    fn on_track(&mut self, track: Arc<dyn RemoteTrack>) {
        let Some(link) = self.link.as_mut() else {
            return;
        };
        if !link.advance(LinkInput::MediaReady) {
            return;
        }

        if self.connected_once {
            debug!("Additional {} track '{}'", track.kind(), track.id());
            self.ctx.inbound.send_modify(|inbound| {
                if let Some(stream) = inbound {
                    stream.push(track);
                }
            });
            return;
        }

        self.connected_once = true;
        self.disarm_connect_timer();
        info!("Receiving '{}' ({} track)", self.ctx.stream_id, track.kind());
        self.ctx.inbound.send_replace(Some(InboundStream::new(track)));
        self.ctx.status.send_replace(ViewerStatus::Connected);
        let _ = self.ctx.events.send(ViewerEvent::Connected);
    }

    /// Tears the link down. Before the first connection the failure is
    /// left for the connect timeout to report.
    async fn lose(&mut self, reason: LossReason) {
        if !self.connected_once {
            debug!("Link failed before connecting: {}", reason);
            self.abandon_link(LinkInput::TransportFailed).await;
            return;
        }
        if self.link.is_none() {
            return;
        }

        warn!("Lost '{}': {}", self.ctx.stream_id, reason);
        self.abandon_link(LinkInput::TransportFailed).await;
        self.ctx.status.send_replace(ViewerStatus::Lost);
        let _ = self.ctx.events.send(ViewerEvent::ConnectionLost { reason });
    }

    /// Closes the link, telling the broadcaster first so it does not keep
    /// its side counted until its own transport gives up.
    async fn abandon_link(&mut self, input: LinkInput) {
        if let Some(mut link) = self.link.take() {
            if let Some(broadcaster) = self.broadcaster.clone() {
                self.send_leave(broadcaster).await;
            }
            link.close(input).await;
        }
        self.ctx.inbound.send_replace(None);
    }

    async fn leave(&mut self) {
        self.disarm_connect_timer();
        self.abandon_link(LinkInput::Close).await;
        self.ctx.bus.unsubscribe(&self.subscription).await;
    }

    async fn send_leave(&self, to: PeerId) {
        self.publish(SignalMessage::addressed(
            self.ctx.peer_id.clone(),
            to,
            SignalPayload::Leave,
        ))
        .await;
    }

    fn disarm_connect_timer(&mut self) {
        if let Some(timer) = self.connect_timer.take() {
            timer.abort();
        }
    }

    async fn publish(&self, msg: SignalMessage) {
        let kind = msg.signal.kind();
        if let Err(e) = self.ctx.bus.publish(self.ctx.stream_id.topic(), msg).await {
            warn!("Failed to publish {} on '{}': {}", kind, self.ctx.stream_id, e);
        }
    }
}
