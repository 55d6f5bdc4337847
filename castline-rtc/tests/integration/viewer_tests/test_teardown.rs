use castline_rtc::{
    LinkState, LossReason, SignalPayload, TransportState, ViewerEvent, ViewerStatus,
};
use std::time::Duration;

use super::test_connect_and_answer::setup;
use crate::integration::{TOPIC, ViewerFixture, init_tracing};
use crate::utils::{
    BusRecorder, MockBehavior, ScriptedPeer, TransportCall, drain, next_viewer_event, settle,
};
use castline_rtc::PeerId;

async fn connect(fx: &mut ViewerFixture, broadcaster: &ScriptedPeer) -> PeerId {
    let peer_id = fx.viewer.connect().await.expect("connect");
    broadcaster.offer(&peer_id).await;
    next_viewer_event(&mut fx.events, |e| *e == ViewerEvent::Connected)
        .await
        .expect("connected");
    peer_id
}

fn leaves(recorder: &BusRecorder) -> usize {
    recorder.count(|m| m.signal == SignalPayload::Leave)
}

#[tokio::test]
async fn test_stream_ended_tears_down() {
    init_tracing();

    let (bus, _recorder, broadcaster, mut fx) = setup(MockBehavior::connecting()).await;
    let peer_id = connect(&mut fx, &broadcaster).await;

    broadcaster.broadcast(SignalPayload::StreamEnded).await;

    assert_eq!(
        next_viewer_event(&mut fx.events, |_| true).await,
        Some(ViewerEvent::StreamEnded)
    );
    assert_eq!(fx.viewer.status(), ViewerStatus::Ended);
    assert!(fx.viewer.inbound().is_none());
    assert!(fx.viewer.link_state().await.is_none());
    assert_eq!(bus.subscriber_count(TOPIC), 1);

    let handle = fx.transports.handle(&peer_id).expect("transport");
    assert!(handle.calls().await.contains(&TransportCall::Close));
}

#[tokio::test]
async fn test_stream_ended_from_another_broadcaster_is_ignored() {
    init_tracing();

    let (bus, _recorder, broadcaster, mut fx) = setup(MockBehavior::connecting()).await;
    connect(&mut fx, &broadcaster).await;

    ScriptedPeer::new(&bus, TOPIC)
        .broadcast(SignalPayload::StreamEnded)
        .await;
    settle().await;

    assert_eq!(fx.viewer.status(), ViewerStatus::Connected);
    assert!(fx.viewer.inbound().is_some());
}

#[tokio::test]
async fn test_disconnect_is_idempotent() {
    init_tracing();

    let (bus, recorder, broadcaster, mut fx) = setup(MockBehavior::connecting()).await;
    let peer_id = connect(&mut fx, &broadcaster).await;

    fx.viewer.disconnect().await;

    let leave = recorder
        .wait_for_kind("leave", Some(&broadcaster.id))
        .await
        .expect("leave");
    assert_eq!(leave.from, peer_id);
    assert_eq!(fx.viewer.status(), ViewerStatus::Idle);
    assert_eq!(fx.viewer.peer_id(), None);
    assert!(fx.viewer.inbound().is_none());
    assert_eq!(bus.subscriber_count(TOPIC), 1);

    fx.viewer.disconnect().await;
    settle().await;

    assert_eq!(leaves(&recorder), 1);
    assert_eq!(fx.viewer.status(), ViewerStatus::Idle);
    let handle = fx.transports.handle(&peer_id).expect("transport");
    assert_eq!(handle.count(|c| *c == TransportCall::Close).await, 1);
}

#[tokio::test]
async fn test_disconnect_before_offer_sends_no_leave() {
    init_tracing();

    let (bus, recorder, _broadcaster, mut fx) = setup(MockBehavior::default()).await;
    fx.viewer.connect().await.expect("connect");

    fx.viewer.disconnect().await;
    settle().await;

    assert_eq!(leaves(&recorder), 0);
    assert_eq!(bus.subscriber_count(TOPIC), 1);
}

#[tokio::test]
async fn test_reconnect_starts_a_fresh_attempt() {
    init_tracing();

    let (bus, recorder, _broadcaster, mut fx) = setup(MockBehavior::default()).await;
    let first = fx.viewer.connect().await.expect("connect");
    let second = fx.viewer.connect().await.expect("reconnect");

    assert_ne!(first, second);
    assert_eq!(bus.subscriber_count(TOPIC), 2);
    assert!(recorder.wait_for(|m| m.from == second && m.signal == SignalPayload::Join).await.is_some());

    let old = fx.transports.handle(&first).expect("transport");
    assert!(old.calls().await.contains(&TransportCall::Close));
}

#[tokio::test]
async fn test_transport_failure_after_connect_is_a_loss() {
    init_tracing();

    let (_bus, _recorder, broadcaster, mut fx) = setup(MockBehavior::connecting()).await;
    let peer_id = connect(&mut fx, &broadcaster).await;

    fx.transports
        .handle(&peer_id)
        .expect("transport")
        .emit_state(TransportState::Failed)
        .await;

    assert_eq!(
        next_viewer_event(&mut fx.events, |_| true).await,
        Some(ViewerEvent::ConnectionLost {
            reason: LossReason::TransportFailed
        })
    );
    assert_eq!(fx.viewer.status(), ViewerStatus::Lost);
    assert!(fx.viewer.inbound().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_grace_expiry_is_a_loss() {
    init_tracing();

    let (_bus, recorder, broadcaster, mut fx) = setup(MockBehavior::connecting()).await;
    let peer_id = connect(&mut fx, &broadcaster).await;
    let handle = fx.transports.handle(&peer_id).expect("transport");

    let started = tokio::time::Instant::now();
    handle.emit_state(TransportState::Disconnected).await;
    settle().await;
    assert_eq!(
        fx.viewer.link_state().await.map(|l| l.state),
        Some(LinkState::Disconnected)
    );
    assert_eq!(fx.viewer.status(), ViewerStatus::Connected);

    assert_eq!(
        next_viewer_event(&mut fx.events, |_| true).await,
        Some(ViewerEvent::ConnectionLost {
            reason: LossReason::DisconnectTimeout
        })
    );
    assert!(started.elapsed() >= Duration::from_secs(10));
    assert_eq!(fx.viewer.status(), ViewerStatus::Lost);
    assert!(fx.viewer.inbound().is_none());
    assert!(fx.viewer.link_state().await.is_none());
    assert!(handle.calls().await.contains(&TransportCall::Close));

    let leave = recorder
        .wait_for_kind("leave", Some(&broadcaster.id))
        .await
        .expect("leave");
    assert_eq!(leave.from, peer_id);
}

#[tokio::test(start_paused = true)]
async fn test_disconnected_link_can_recover() {
    init_tracing();

    let (_bus, _recorder, broadcaster, mut fx) = setup(MockBehavior::connecting()).await;
    let peer_id = connect(&mut fx, &broadcaster).await;
    let handle = fx.transports.handle(&peer_id).expect("transport");

    handle.emit_state(TransportState::Disconnected).await;
    handle.emit_state(TransportState::Connected).await;
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert!(drain(&mut fx.events).is_empty());
    assert_eq!(fx.viewer.status(), ViewerStatus::Connected);
    assert!(fx.viewer.inbound().is_some());
    assert_eq!(
        fx.viewer.link_state().await.map(|l| l.state),
        Some(LinkState::Connected)
    );
}
