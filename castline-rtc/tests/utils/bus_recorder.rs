use castline_rtc::{LocalBus, PeerId, SignalBus, SignalHandler, SignalMessage, SignalPayload};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

/// Subscribes to a topic and keeps every message seen on it.
///
/// # Example
///
/// ```ignore
/// let recorder = BusRecorder::attach(&bus, "live").await;
/// // ... broadcaster publishes ...
/// let offer = recorder.wait_for(|m| m.signal.kind() == "offer").await;
/// ```
#[derive(Clone)]
pub struct BusRecorder {
    messages: Arc<Mutex<Vec<SignalMessage>>>,
    notify: Arc<Notify>,
}

impl BusRecorder {
    pub async fn attach(bus: &LocalBus, topic: &str) -> Self {
        let messages = Arc::new(Mutex::new(Vec::new()));
        let notify = Arc::new(Notify::new());

        let sink = messages.clone();
        let wake = notify.clone();
        let handler: SignalHandler = Arc::new(move |msg| {
            if let Ok(mut messages) = sink.lock() {
                messages.push(msg);
            }
            wake.notify_waiters();
        });
        bus.subscribe(topic, handler)
            .await
            .expect("recorder subscription");

        Self { messages, notify }
    }

    pub fn messages(&self) -> Vec<SignalMessage> {
        self.messages.lock().map(|m| m.clone()).unwrap_or_default()
    }

    pub fn count(&self, predicate: impl Fn(&SignalMessage) -> bool) -> usize {
        self.messages().iter().filter(|m| predicate(m)).count()
    }

    /// Waits up to 60 s (virtual time in paused tests) for a matching message.
    pub async fn wait_for(
        &self,
        predicate: impl Fn(&SignalMessage) -> bool,
    ) -> Option<SignalMessage> {
        let search = async {
            loop {
                let notified = self.notify.notified();
                if let Some(found) = self.messages().into_iter().find(|m| predicate(m)) {
                    return found;
                }
                notified.await;
            }
        };
        tokio::time::timeout(Duration::from_secs(60), search).await.ok()
    }

    pub async fn wait_for_kind(&self, kind: &str, to: Option<&PeerId>) -> Option<SignalMessage> {
        self.wait_for(|m| m.signal.kind() == kind && m.to.as_ref() == to)
            .await
    }

    pub async fn wait_for_offer_to(&self, viewer: &PeerId) -> Option<(PeerId, String)> {
        let msg = self.wait_for_kind("offer", Some(viewer)).await?;
        match msg.signal {
            SignalPayload::Offer { sdp } => Some((msg.from, sdp)),
            _ => None,
        }
    }
}
