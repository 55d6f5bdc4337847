use async_trait::async_trait;
use castline_core::SignalMessage;
use std::sync::Arc;

/// Invoked once per message delivered on a subscribed topic.
pub type SignalHandler = Arc<dyn Fn(SignalMessage) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BusError {
    #[error("signaling bus is closed")]
    Closed,
}

/// Identifies one subscription so it can be cancelled later.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    topic: String,
    id: u64,
}

impl SubscriptionHandle {
    pub fn new(topic: impl Into<String>, id: u64) -> Self {
        Self {
            topic: topic.into(),
            id,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

/// The relay that carries handshake messages between participants.
///
/// Implementations must deliver a publisher's own messages back to it and
/// keep per-publisher order; nothing more is assumed. None of the methods
/// may wait on remote delivery.
#[async_trait]
pub trait SignalBus: Send + Sync {
    /// Hands `message` to the transport. Returns once it is queued locally.
    async fn publish(&self, topic: &str, message: SignalMessage) -> Result<(), BusError>;

    async fn subscribe(
        &self,
        topic: &str,
        handler: SignalHandler,
    ) -> Result<SubscriptionHandle, BusError>;

    /// Stops future deliveries. Unknown or already cancelled handles are a no-op.
    async fn unsubscribe(&self, handle: &SubscriptionHandle);
}
