use crate::transport::PeerTransport;
use anyhow::Result;
use castline_core::{CandidateBuffer, IceCandidate, LinkInput, LinkState, PeerId, Role};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// Point-in-time view of one link, as reported to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSnapshot {
    pub peer_id: PeerId,
    pub state: LinkState,
}

/// One broadcaster/viewer relationship: state machine, candidate buffer,
/// the transport carrying it and at most one pending timer.
///
/// Owned by exactly one actor; never shared.
pub(crate) struct PeerLink {
    peer_id: PeerId,
    role: Role,
    state: LinkState,
    candidates: CandidateBuffer<IceCandidate>,
    transport: Box<dyn PeerTransport>,
    timer: Option<JoinHandle<()>>,
}

impl PeerLink {
    pub fn new(peer_id: PeerId, role: Role, transport: Box<dyn PeerTransport>) -> Self {
        Self {
            peer_id,
            role,
            state: LinkState::Idle,
            candidates: CandidateBuffer::new(),
            transport,
            timer: None,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn transport(&self) -> &dyn PeerTransport {
        self.transport.as_ref()
    }

    pub fn snapshot(&self) -> LinkSnapshot {
        LinkSnapshot {
            peer_id: self.peer_id.clone(),
            state: self.state,
        }
    }

    /// Applies `input` to the state machine. Returns `false` when the input
    /// was refused, in which case the state is unchanged.
    pub fn advance(&mut self, input: LinkInput) -> bool {
        match self.state.next(self.role, input) {
            Ok(next) => {
                if next != self.state {
                    debug!(
                        "{} link {}: {} -> {}",
                        self.role, self.peer_id, self.state, next
                    );
                }
                self.state = next;
                true
            }
            Err(e) => {
                debug!("{} link {} ignored {:?}: {}", self.role, self.peer_id, input, e);
                false
            }
        }
    }

    /// Applies the candidate now if the remote description is known,
    /// otherwise queues it.
    pub async fn add_candidate(&mut self, candidate: IceCandidate) {
        if self.state.is_terminal() {
            return;
        }
        match self.candidates.add(candidate) {
            Some(candidate) => self.apply_candidate(candidate).await,
            None => trace!(
                "Buffered candidate for {} ({} pending)",
                self.peer_id,
                self.candidates.pending_len()
            ),
        }
    }

    pub async fn apply_remote_offer(&mut self, sdp: String) -> Result<()> {
        self.transport.set_remote_offer(sdp).await?;
        self.flush_candidates().await;
        Ok(())
    }

    pub async fn apply_remote_answer(&mut self, sdp: String) -> Result<()> {
        self.transport.set_remote_answer(sdp).await?;
        self.flush_candidates().await;
        Ok(())
    }

    pub fn arm_timer(&mut self, handle: JoinHandle<()>) {
        self.disarm_timer();
        self.timer = Some(handle);
    }

    pub fn disarm_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }

    /// Moves the link to a terminal state and closes its transport.
    pub async fn close(&mut self, input: LinkInput) {
        self.disarm_timer();
        self.advance(input);
        if let Err(e) = self.transport.close().await {
            warn!("Failed to close transport for {}: {:#}", self.peer_id, e);
        }
    }

    async fn flush_candidates(&mut self) {
        let pending = self.candidates.flush();
        if !pending.is_empty() {
            debug!("Applying {} buffered candidate(s) for {}", pending.len(), self.peer_id);
        }
        for candidate in pending {
            self.apply_candidate(candidate).await;
        }
    }

    async fn apply_candidate(&self, candidate: IceCandidate) {
        if let Err(e) = self.transport.add_ice_candidate(candidate).await {
            warn!("Failed to add ICE candidate for {}: {:#}", self.peer_id, e);
        }
    }
}

impl Drop for PeerLink {
    fn drop(&mut self) {
        self.disarm_timer();
    }
}

/// Sends `command` to an actor after `after`, unless the handle is aborted first.
pub(crate) fn spawn_timer<C: Send + 'static>(
    after: Duration,
    tx: mpsc::UnboundedSender<C>,
    command: C,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(after).await;
        let _ = tx.send(command);
    })
}
