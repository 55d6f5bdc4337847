use castline_rtc::{BroadcastEvent, LinkState, LossReason, PeerId, TransportState};
use std::time::Duration;

use crate::integration::{BroadcastFixture, TOPIC, init_tracing, start_broadcaster};
use crate::utils::{
    MockBehavior, ScriptedPeer, TransportCall, next_broadcast_event, settle,
};

/// Joins, answers and waits until the broadcaster reports the viewer connected.
async fn connect_viewer(fx: &mut BroadcastFixture) -> ScriptedPeer {
    let viewer = ScriptedPeer::new(&fx.bus, TOPIC);
    let broadcaster_id = fx.broadcaster.id().clone();

    viewer.join().await;
    fx.recorder
        .wait_for_offer_to(&viewer.id)
        .await
        .expect("offer");
    viewer.answer(&broadcaster_id).await;

    let id = viewer.id.clone();
    next_broadcast_event(&mut fx.events, |e| {
        matches!(e, BroadcastEvent::ViewerConnected { peer_id } if *peer_id == id)
    })
    .await
    .expect("viewer connected");
    viewer
}

async fn wait_for_loss(fx: &mut BroadcastFixture, peer: &PeerId) -> Option<LossReason> {
    match next_broadcast_event(&mut fx.events, |e| {
        matches!(e, BroadcastEvent::ViewerLost { peer_id, .. } if peer_id == peer)
    })
    .await
    {
        Some(BroadcastEvent::ViewerLost { reason, .. }) => Some(reason),
        _ => None,
    }
}

#[tokio::test]
async fn test_failed_viewer_does_not_affect_others() {
    init_tracing();

    let mut fx = start_broadcaster(MockBehavior::connecting()).await;
    let failing = connect_viewer(&mut fx).await;
    let healthy = connect_viewer(&mut fx).await;
    assert_eq!(fx.broadcaster.viewer_count(), 2);

    fx.transports
        .handle(&failing.id)
        .expect("transport")
        .emit_state(TransportState::Failed)
        .await;

    assert_eq!(
        wait_for_loss(&mut fx, &failing.id).await,
        Some(LossReason::TransportFailed)
    );
    assert_eq!(fx.broadcaster.viewer_count(), 1);

    let links = fx.broadcaster.links().await;
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].peer_id, healthy.id);
    assert_eq!(links[0].state, LinkState::Connected);
    assert!(!fx.source.is_stopped());

    let healthy_calls = fx.transports.handle(&healthy.id).expect("transport").calls().await;
    assert!(!healthy_calls.contains(&TransportCall::Close));
}

#[tokio::test]
async fn test_leave_removes_the_link_at_once() {
    init_tracing();

    let mut fx = start_broadcaster(MockBehavior::connecting()).await;
    let viewer = connect_viewer(&mut fx).await;

    viewer
        .send_to(fx.broadcaster.id(), castline_rtc::SignalPayload::Leave)
        .await;

    assert_eq!(
        wait_for_loss(&mut fx, &viewer.id).await,
        Some(LossReason::Left)
    );
    assert_eq!(fx.broadcaster.viewer_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_stalled_viewer_hits_negotiation_timeout() {
    init_tracing();

    let mut fx = start_broadcaster(MockBehavior::default()).await;
    let viewer = ScriptedPeer::new(&fx.bus, TOPIC);
    viewer.join().await;
    fx.recorder
        .wait_for_offer_to(&viewer.id)
        .await
        .expect("offer");

    // Candidates do not keep a stalled link alive.
    viewer.candidate(fx.broadcaster.id(), "v-1").await;

    let started = tokio::time::Instant::now();
    assert_eq!(
        wait_for_loss(&mut fx, &viewer.id).await,
        Some(LossReason::NegotiationTimeout)
    );
    assert!(started.elapsed() >= Duration::from_secs(14));
    assert_eq!(fx.broadcaster.viewer_count(), 0);

    // A redelivered join from the same viewer does not bring it back.
    viewer.join().await;
    settle().await;
    assert_eq!(fx.transports.created(), 1);
    assert_eq!(fx.broadcaster.viewer_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_connected_viewer_is_not_timed_out() {
    init_tracing();

    let mut fx = start_broadcaster(MockBehavior::connecting()).await;
    let viewer = connect_viewer(&mut fx).await;

    tokio::time::sleep(Duration::from_secs(30)).await;

    assert_eq!(fx.broadcaster.viewer_count(), 1);
    assert_eq!(fx.broadcaster.links().await[0].peer_id, viewer.id);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_grace_expires() {
    init_tracing();

    let mut fx = start_broadcaster(MockBehavior::connecting()).await;
    let viewer = connect_viewer(&mut fx).await;
    let handle = fx.transports.handle(&viewer.id).expect("transport");

    handle.emit_state(TransportState::Disconnected).await;
    settle().await;
    assert_eq!(fx.broadcaster.links().await[0].state, LinkState::Disconnected);
    assert_eq!(fx.broadcaster.viewer_count(), 1);

    assert_eq!(
        wait_for_loss(&mut fx, &viewer.id).await,
        Some(LossReason::DisconnectTimeout)
    );
    assert_eq!(fx.broadcaster.viewer_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_disconnected_viewer_can_recover() {
    init_tracing();

    let mut fx = start_broadcaster(MockBehavior::connecting()).await;
    let viewer = connect_viewer(&mut fx).await;
    let handle = fx.transports.handle(&viewer.id).expect("transport");

    handle.emit_state(TransportState::Disconnected).await;
    handle.emit_state(TransportState::Connected).await;
    tokio::time::sleep(Duration::from_secs(20)).await;

    assert_eq!(fx.broadcaster.viewer_count(), 1);
    assert_eq!(fx.broadcaster.links().await[0].state, LinkState::Connected);
    // Recovery is not a second connection.
    let id = viewer.id.clone();
    assert!(
        crate::utils::drain(&mut fx.events)
            .iter()
            .all(|e| !matches!(e, BroadcastEvent::ViewerConnected { peer_id } if *peer_id == id))
    );
}
