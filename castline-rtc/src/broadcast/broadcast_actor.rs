use crate::broadcast::broadcast_command::BroadcastCommand;
use crate::broadcast::broadcast_event::BroadcastEvent;
use crate::broadcast::retired_peers::RetiredPeers;
use crate::config::CastConfig;
use crate::link::{LossReason, PeerLink, spawn_timer};
use crate::media::MediaSource;
use crate::signaling::{SignalBus, SubscriptionHandle};
use crate::transport::{TransportEvent, TransportFactory, TransportState};
use castline_core::{
    IceCandidate, LinkInput, LinkState, PeerId, Role, SignalMessage, SignalPayload, StreamId,
};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

/// Collaborators a broadcast actor is started with.
pub(crate) struct BroadcastContext {
    pub id: PeerId,
    pub stream_id: StreamId,
    pub bus: Arc<dyn SignalBus>,
    pub transports: Arc<dyn TransportFactory>,
    pub config: CastConfig,
    pub events: mpsc::UnboundedSender<BroadcastEvent>,
    pub viewer_count: Arc<watch::Sender<usize>>,
}

/// Owns every viewer link of one broadcast. All mutation happens on the
/// task running [`BroadcastActor::run`].
pub(crate) struct BroadcastActor {
    ctx: BroadcastContext,
    source: Arc<dyn MediaSource>,
    subscription: SubscriptionHandle,
    links: HashMap<PeerId, PeerLink>,
    /// Recently removed viewers; later messages from them are ignored.
    retired: RetiredPeers,
    command_rx: mpsc::UnboundedReceiver<BroadcastCommand>,
    command_tx: mpsc::UnboundedSender<BroadcastCommand>,
    transport_rx: mpsc::Receiver<TransportEvent>,
    transport_tx: mpsc::Sender<TransportEvent>,
}

impl BroadcastActor {
    pub fn new(
        ctx: BroadcastContext,
        source: Arc<dyn MediaSource>,
        subscription: SubscriptionHandle,
        command_rx: mpsc::UnboundedReceiver<BroadcastCommand>,
        command_tx: mpsc::UnboundedSender<BroadcastCommand>,
    ) -> Self {
        let (transport_tx, transport_rx) = mpsc::channel(ctx.config.event_buffer.max(1));

        Self {
            ctx,
            source,
            subscription,
            links: HashMap::new(),
            retired: RetiredPeers::default(),
            command_rx,
            command_tx,
            transport_rx,
            transport_tx,
        }
    }

    pub async fn run(mut self) {
        info!("Broadcast of '{}' started", self.ctx.stream_id);

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(BroadcastCommand::Shutdown { done }) => {
                            self.shutdown().await;
                            if let Some(done) = done {
                                let _ = done.send(());
                            }
                            break;
                        }
                        Some(c) => self.handle_command(c).await,
                        None => {
                            self.shutdown().await;
                            break;
                        }
                    }
                }

                Some(evt) = self.transport_rx.recv() => {
                    self.handle_transport_event(evt).await;
                }
            }
        }

        info!("Broadcast of '{}' finished", self.ctx.stream_id);
    }

    async fn handle_command(&mut self, cmd: BroadcastCommand) {
        match cmd {
            BroadcastCommand::Signal(msg) => self.handle_signal(msg).await,

            BroadcastCommand::NegotiationTimeout { peer_id } => {
                let Some(link) = self.links.get(&peer_id) else {
                    return;
                };
                if link.state().is_established() {
                    return;
                }
                warn!(
                    "Viewer {} did not connect within {:?} ({})",
                    peer_id,
                    self.ctx.config.negotiation_timeout,
                    link.state()
                );
                self.remove_link(
                    &peer_id,
                    LossReason::NegotiationTimeout,
                    LinkInput::TransportFailed,
                )
                .await;
            }

            BroadcastCommand::DisconnectGrace { peer_id } => {
                let still_down = self
                    .links
                    .get(&peer_id)
                    .is_some_and(|link| link.state() == LinkState::Disconnected);
                if still_down {
                    warn!("Viewer {} stayed disconnected, dropping it", peer_id);
                    self.remove_link(
                        &peer_id,
                        LossReason::DisconnectTimeout,
                        LinkInput::TransportFailed,
                    )
                    .await;
                }
            }

            BroadcastCommand::Snapshot { reply } => {
                let _ = reply.send(self.links.values().map(PeerLink::snapshot).collect());
            }

            // Handled by the run loop.
            BroadcastCommand::Shutdown { .. } => {}
        }
    }

    async fn handle_signal(&mut self, msg: SignalMessage) {
        let SignalMessage { from, to, signal } = msg;

        if from == self.ctx.id {
            return;
        }
        let for_me = to.as_ref() == Some(&self.ctx.id);
        if to.is_some() && !for_me {
            return;
        }
        if self.retired.contains(&from) {
            debug!("Ignoring {} from retired viewer {}", signal.kind(), from);
            return;
        }

        match signal {
            SignalPayload::Join => self.on_join(from).await,
            SignalPayload::Answer { sdp } if for_me => self.on_answer(from, sdp).await,
            SignalPayload::Candidate(candidate) if for_me => {
                self.on_candidate(from, candidate).await
            }
            SignalPayload::Leave if for_me => {
                info!("Viewer {} left", from);
                self.remove_link(&from, LossReason::Left, LinkInput::Close)
                    .await;
            }
            other => debug!("Ignoring {} from {}", other.kind(), from),
        }
    }

    async fn on_join(&mut self, peer_id: PeerId) {
        if self.links.contains_key(&peer_id) {
            debug!("Duplicate join from {}", peer_id);
            return;
        }

        let transport = match self
            .ctx
            .transports
            .create(peer_id.clone(), self.transport_tx.clone())
            .await
        {
            Ok(t) => t,
            Err(e) => {
                error!("Failed to create transport for {}: {:#}", peer_id, e);
                return;
            }
        };

        let mut link = PeerLink::new(peer_id.clone(), Role::Broadcaster, transport);
        link.advance(LinkInput::Join);
        self.links.insert(peer_id.clone(), link);
        self.publish_count();
        info!("Viewer {} joined '{}'", peer_id, self.ctx.stream_id);

        if let Err(e) = self.send_offer(&peer_id).await {
            error!("Failed to offer to {}: {:#}", peer_id, e);
            self.remove_link(
                &peer_id,
                LossReason::NegotiationFailed(format!("{e:#}")),
                LinkInput::TransportFailed,
            )
            .await;
        }
    }

    async fn send_offer(&mut self, peer_id: &PeerId) -> anyhow::Result<()> {
        let Some(link) = self.links.get_mut(peer_id) else {
            return Ok(());
        };

        for track in self.source.tracks() {
            link.transport().add_track(track).await?;
        }
        let sdp = link.transport().create_offer().await?;
        link.advance(LinkInput::OfferSent);
        link.arm_timer(spawn_timer(
            self.ctx.config.negotiation_timeout,
            self.command_tx.clone(),
            BroadcastCommand::NegotiationTimeout {
                peer_id: peer_id.clone(),
            },
        ));

        self.publish_to(peer_id, SignalPayload::Offer { sdp }).await;
        Ok(())
    }

    async fn on_answer(&mut self, peer_id: PeerId, sdp: String) {
        let Some(link) = self.links.get_mut(&peer_id) else {
            debug!("Answer from unknown viewer {}", peer_id);
            return;
        };
        if !link.advance(LinkInput::AnswerApplied) {
            return;
        }

        if let Err(e) = link.apply_remote_answer(sdp).await {
            error!("Failed to apply answer from {}: {:#}", peer_id, e);
            self.remove_link(
                &peer_id,
                LossReason::NegotiationFailed(format!("{e:#}")),
                LinkInput::TransportFailed,
            )
            .await;
        }
    }

    async fn on_candidate(&mut self, peer_id: PeerId, candidate: IceCandidate) {
        match self.links.get_mut(&peer_id) {
            Some(link) => link.add_candidate(candidate).await,
            None => debug!("Candidate from unknown viewer {}", peer_id),
        }
    }

    async fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::CandidateGenerated(peer_id, candidate) => {
                if self.links.contains_key(&peer_id) {
                    self.publish_to(&peer_id, SignalPayload::Candidate(candidate))
                        .await;
                }
            }

            TransportEvent::StateChanged(peer_id, state) => {
                self.on_transport_state(peer_id, state).await;
            }

            TransportEvent::TrackReceived(peer_id, track) => {
                debug!("Ignoring inbound {} track from viewer {}", track.kind(), peer_id);
            }
        }
    }

    async fn on_transport_state(&mut self, peer_id: PeerId, state: TransportState) {
        let Some(link) = self.links.get_mut(&peer_id) else {
            return;
        };

        match state {
            TransportState::New => {}

            TransportState::Connecting => {
                link.advance(LinkInput::TransportConnecting);
            }

            TransportState::Connected => {
                let first_time = !link.state().is_established();
                if link.advance(LinkInput::MediaReady) {
                    link.disarm_timer();
                    if first_time {
                        info!("Viewer {} connected", peer_id);
                        let _ = self
                            .ctx
                            .events
                            .send(BroadcastEvent::ViewerConnected { peer_id });
                    } else {
                        info!("Viewer {} recovered", peer_id);
                    }
                }
            }

            TransportState::Disconnected => {
                if link.advance(LinkInput::TransportDisconnected) {
                    warn!("Viewer {} disconnected", peer_id);
                    link.arm_timer(spawn_timer(
                        self.ctx.config.disconnect_grace,
                        self.command_tx.clone(),
                        BroadcastCommand::DisconnectGrace {
                            peer_id: peer_id.clone(),
                        },
                    ));
                }
            }

            TransportState::Failed => {
                self.remove_link(
                    &peer_id,
                    LossReason::TransportFailed,
                    LinkInput::TransportFailed,
                )
                .await;
            }

            TransportState::Closed => {
                self.remove_link(&peer_id, LossReason::TransportClosed, LinkInput::Close)
                    .await;
            }
        }
    }

    async fn remove_link(&mut self, peer_id: &PeerId, reason: LossReason, input: LinkInput) {
        let Some(mut link) = self.links.remove(peer_id) else {
            return;
        };
        self.retired.insert(peer_id.clone());
        self.publish_count();

        link.close(input).await;
        info!("Viewer {} removed ({}): {}", peer_id, link.state(), reason);

        let _ = self.ctx.events.send(BroadcastEvent::ViewerLost {
            peer_id: peer_id.clone(),
            reason,
        });
    }

    async fn shutdown(&mut self) {
        info!(
            "Stopping broadcast of '{}' with {} viewer(s), {} retired",
            self.ctx.stream_id,
            self.links.len(),
            self.retired.len()
        );

        // Viewers must hear about the end before their transports drop.
        self.publish(SignalMessage::broadcast(
            self.ctx.id.clone(),
            SignalPayload::StreamEnded,
        ))
        .await;

        // Nothing reads transport events from here on.
        self.transport_rx.close();
        let mut links: Vec<PeerLink> = self.links.drain().map(|(_, link)| link).collect();
        join_all(links.iter_mut().map(|link| link.close(LinkInput::Close))).await;
        drop(links);
        self.publish_count();

        self.ctx.bus.unsubscribe(&self.subscription).await;
        self.source.stop().await;
    }

    fn publish_count(&self) {
        let count = self.links.len();
        let previous = self.ctx.viewer_count.send_replace(count);
        if previous != count {
            let _ = self
                .ctx
                .events
                .send(BroadcastEvent::ViewerCountChanged(count));
        }
    }

    async fn publish_to(&self, peer_id: &PeerId, signal: SignalPayload) {
        self.publish(SignalMessage::addressed(
            self.ctx.id.clone(),
            peer_id.clone(),
            signal,
        ))
        .await;
    }

    async fn publish(&self, msg: SignalMessage) {
        let kind = msg.signal.kind();
        if let Err(e) = self.ctx.bus.publish(self.ctx.stream_id.topic(), msg).await {
            warn!("Failed to publish {} on '{}': {}", kind, self.ctx.stream_id, e);
        }
    }
}
