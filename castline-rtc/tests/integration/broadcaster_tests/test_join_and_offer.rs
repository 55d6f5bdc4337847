use castline_rtc::{BroadcastEvent, LinkSnapshot, LinkState, PeerId, SignalPayload};

use crate::integration::{TOPIC, init_tracing, start_broadcaster};
use crate::utils::{MockBehavior, ScriptedPeer, TransportCall, next_broadcast_event, settle};

#[tokio::test]
async fn test_start_announces_stream() {
    init_tracing();

    let fx = start_broadcaster(MockBehavior::default()).await;

    let active = fx
        .recorder
        .wait_for_kind("stream-active", None)
        .await
        .expect("stream-active");
    assert_eq!(&active.from, fx.broadcaster.id());
    assert!(fx.broadcaster.is_active());
    assert_eq!(fx.broadcaster.viewer_count(), 0);
}

#[tokio::test]
async fn test_join_produces_offer() {
    init_tracing();

    let mut fx = start_broadcaster(MockBehavior::default()).await;
    let viewer = ScriptedPeer::new(&fx.bus, TOPIC);

    viewer.join().await;

    let (from, sdp) = fx
        .recorder
        .wait_for_offer_to(&viewer.id)
        .await
        .expect("offer for the viewer");
    assert_eq!(&from, fx.broadcaster.id());
    assert_eq!(sdp, format!("mock-offer-{}", viewer.id));
    assert_eq!(fx.broadcaster.viewer_count(), 1);

    let handle = fx.transports.handle(&viewer.id).expect("transport");
    assert_eq!(
        handle.calls().await,
        vec![
            TransportCall::AddTrack("video".into()),
            TransportCall::AddTrack("audio".into()),
            TransportCall::CreateOffer,
        ]
    );

    assert_eq!(
        fx.broadcaster.links().await,
        vec![LinkSnapshot {
            peer_id: viewer.id.clone(),
            state: LinkState::OfferSent,
        }]
    );
    assert_eq!(
        next_broadcast_event(&mut fx.events, |_| true).await,
        Some(BroadcastEvent::ViewerCountChanged(1))
    );
}

#[tokio::test]
async fn test_duplicate_join_creates_one_link() {
    init_tracing();

    let fx = start_broadcaster(MockBehavior::default()).await;
    let viewer = ScriptedPeer::new(&fx.bus, TOPIC);

    viewer.join().await;
    viewer.join().await;
    fx.recorder
        .wait_for_offer_to(&viewer.id)
        .await
        .expect("offer");
    settle().await;

    assert_eq!(fx.transports.created(), 1);
    assert_eq!(fx.broadcaster.viewer_count(), 1);
    assert_eq!(fx.broadcaster.links().await.len(), 1);
    assert_eq!(
        fx.recorder
            .count(|m| matches!(m.signal, SignalPayload::Offer { .. })),
        1
    );
}

#[tokio::test]
async fn test_join_addressed_to_someone_else_is_ignored() {
    init_tracing();

    let fx = start_broadcaster(MockBehavior::default()).await;
    let viewer = ScriptedPeer::new(&fx.bus, TOPIC);

    viewer.send_to(&PeerId::new(), SignalPayload::Join).await;
    settle().await;

    assert_eq!(fx.transports.created(), 0);
    assert_eq!(fx.broadcaster.viewer_count(), 0);
}

#[tokio::test]
async fn test_local_candidates_are_trickled_to_the_viewer() {
    init_tracing();

    let fx = start_broadcaster(MockBehavior {
        local_candidates: vec!["b-1".into(), "b-2".into()],
        ..Default::default()
    })
    .await;
    let viewer = ScriptedPeer::new(&fx.bus, TOPIC);

    viewer.join().await;

    for expected in ["b-1", "b-2"] {
        let msg = fx
            .recorder
            .wait_for(|m| {
                m.to.as_ref() == Some(&viewer.id)
                    && matches!(&m.signal, SignalPayload::Candidate(c) if c.candidate == expected)
            })
            .await;
        assert!(msg.is_some(), "candidate {expected} was not forwarded");
    }
}
