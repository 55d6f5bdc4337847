use crate::signaling::{BusError, SignalBus, SignalHandler, SubscriptionHandle};
use async_trait::async_trait;
use castline_core::SignalMessage;
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, trace};

struct Subscriber {
    id: u64,
    tx: mpsc::UnboundedSender<SignalMessage>,
}

struct LocalBusInner {
    topics: DashMap<String, Vec<Subscriber>>,
    next_id: AtomicU64,
    closed: AtomicBool,
}

/// In-process [`SignalBus`] for participants sharing one runtime.
///
/// Every subscription gets its own dispatch task, so handlers never run
/// under the topic map lock and messages from one publisher reach each
/// subscriber in publish order.
#[derive(Clone)]
pub struct LocalBus {
    inner: Arc<LocalBusInner>,
}

impl LocalBus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(LocalBusInner {
                topics: DashMap::new(),
                next_id: AtomicU64::new(1),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.inner
            .topics
            .get(topic)
            .map(|subs| subs.len())
            .unwrap_or(0)
    }

    /// Drops every subscription and refuses further traffic.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.topics.clear();
    }

    fn ensure_open(&self) -> Result<(), BusError> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(BusError::Closed);
        }
        Ok(())
    }
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SignalBus for LocalBus {
    async fn publish(&self, topic: &str, message: SignalMessage) -> Result<(), BusError> {
        self.ensure_open()?;

        // Collect senders first so the map guard is released before sending.
        let senders: Vec<_> = match self.inner.topics.get(topic) {
            Some(subs) => subs.iter().map(|s| s.tx.clone()).collect(),
            None => Vec::new(),
        };

        trace!(
            "Publishing {} from {} on '{}' to {} subscriber(s)",
            message.signal.kind(),
            message.from,
            topic,
            senders.len()
        );

        for tx in senders {
            let _ = tx.send(message.clone());
        }
        Ok(())
    }

    async fn subscribe(
        &self,
        topic: &str,
        handler: SignalHandler,
    ) -> Result<SubscriptionHandle, BusError> {
        self.ensure_open()?;

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, mut rx) = mpsc::unbounded_channel::<SignalMessage>();

        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                handler(message);
            }
        });

        self.inner
            .topics
            .entry(topic.to_owned())
            .or_default()
            .push(Subscriber { id, tx });

        debug!("Subscription {} opened on '{}'", id, topic);
        Ok(SubscriptionHandle::new(topic, id))
    }

    async fn unsubscribe(&self, handle: &SubscriptionHandle) {
        if let Some(mut subs) = self.inner.topics.get_mut(handle.topic()) {
            subs.retain(|s| s.id != handle.id());
        }
        self.inner
            .topics
            .remove_if(handle.topic(), |_, subs| subs.is_empty());
        debug!("Subscription {} closed on '{}'", handle.id(), handle.topic());
    }
}
