use castline_rtc::{
    BroadcastEvent, LossReason, SignalPayload, TransportState, ViewerEvent, ViewerStatus,
};
use std::time::Duration;

use super::test_connect_and_answer::setup;
use crate::integration::{TOPIC, init_tracing, new_viewer, start_broadcaster};
use crate::utils::{
    MockBehavior, TransportCall, drain, next_broadcast_event, next_viewer_event, settle,
    wait_for_count,
};

#[tokio::test(start_paused = true)]
async fn test_silent_broadcaster_times_out() {
    init_tracing();

    let (bus, recorder, broadcaster, mut fx) = setup(MockBehavior::connecting()).await;
    let started = tokio::time::Instant::now();
    let peer_id = fx.viewer.connect().await.expect("connect");

    assert_eq!(
        next_viewer_event(&mut fx.events, |_| true).await,
        Some(ViewerEvent::ConnectTimeout)
    );
    assert!(started.elapsed() >= Duration::from_secs(15));
    assert_eq!(fx.viewer.status(), ViewerStatus::TimedOut);
    assert!(fx.viewer.link_state().await.is_none());

    let handle = fx.transports.handle(&peer_id).expect("transport");
    assert!(handle.calls().await.contains(&TransportCall::Close));
    // The timeout cancels the attempt, not the subscription.
    assert_eq!(bus.subscriber_count(TOPIC), 2);

    // A late offer must not revive the attempt.
    broadcaster.offer(&peer_id).await;
    settle().await;
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert_eq!(recorder.count(|m| m.signal.kind() == "answer"), 0);
    assert_eq!(fx.viewer.status(), ViewerStatus::TimedOut);
    assert!(drain(&mut fx.events).is_empty());

    // The sender of the late offer is told to drop its side.
    let leave = recorder
        .wait_for_kind("leave", Some(&broadcaster.id))
        .await
        .expect("leave");
    assert_eq!(leave.from, peer_id);
}

#[tokio::test(start_paused = true)]
async fn test_timed_out_viewer_releases_the_broadcaster_link() {
    init_tracing();

    // The broadcaster side reports connected, but no media reaches the viewer.
    let mut bx = start_broadcaster(MockBehavior::connecting()).await;
    let mut fx = new_viewer(&bx.bus, MockBehavior::default());
    let peer_id = fx.viewer.connect().await.expect("connect");

    let id = peer_id.clone();
    next_broadcast_event(&mut bx.events, |e| {
        matches!(e, BroadcastEvent::ViewerConnected { peer_id } if *peer_id == id)
    })
    .await
    .expect("broadcaster side connected");
    assert_eq!(bx.broadcaster.viewer_count(), 1);

    assert_eq!(
        next_viewer_event(&mut fx.events, |_| true).await,
        Some(ViewerEvent::ConnectTimeout)
    );

    let id = peer_id.clone();
    let lost = next_broadcast_event(&mut bx.events, |e| {
        matches!(e, BroadcastEvent::ViewerLost { peer_id, .. } if *peer_id == id)
    })
    .await;
    assert_eq!(
        lost,
        Some(BroadcastEvent::ViewerLost {
            peer_id: peer_id.clone(),
            reason: LossReason::Left
        })
    );
    let mut count = bx.broadcaster.watch_viewer_count();
    assert!(wait_for_count(&mut count, 0).await);
    assert!(bx.broadcaster.links().await.is_empty());

    fx.viewer.disconnect().await;
    tokio::time::sleep(Duration::from_secs(120)).await;

    let leaves = bx.recorder.count(|m| m.signal == SignalPayload::Leave);
    assert_eq!(leaves, 1);
    assert_eq!(bx.broadcaster.viewer_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_failure_before_connect_is_reported_as_timeout() {
    init_tracing();

    let (_bus, recorder, broadcaster, mut fx) = setup(MockBehavior::default()).await;
    let peer_id = fx.viewer.connect().await.expect("connect");

    broadcaster.offer(&peer_id).await;
    recorder
        .wait_for_kind("answer", Some(&broadcaster.id))
        .await
        .expect("answer");
    fx.transports
        .handle(&peer_id)
        .expect("transport")
        .emit_state(TransportState::Failed)
        .await;

    assert_eq!(
        next_viewer_event(&mut fx.events, |_| true).await,
        Some(ViewerEvent::ConnectTimeout)
    );
    assert_eq!(fx.viewer.status(), ViewerStatus::TimedOut);
}

#[tokio::test(start_paused = true)]
async fn test_connected_viewer_does_not_time_out() {
    init_tracing();

    let (_bus, _recorder, broadcaster, mut fx) = setup(MockBehavior::connecting()).await;
    let peer_id = fx.viewer.connect().await.expect("connect");
    broadcaster.offer(&peer_id).await;

    assert_eq!(
        next_viewer_event(&mut fx.events, |_| true).await,
        Some(ViewerEvent::Connected)
    );
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert_eq!(fx.viewer.status(), ViewerStatus::Connected);
    assert!(drain(&mut fx.events).is_empty());
}
