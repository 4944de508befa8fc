use partycast_core::{PeerId, QualityLevel, SessionDescription, SignalData, SignalEnvelope};
use partycast_relay::RelayEvent;
use partycast_session::{
    ConnectionId, ConnectionKey, ConnectionState, DataChannel, TrackKind, TransportEvent,
    ViewerEvent,
};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::integration::{create_test_viewer, host_id, init_tracing};
use crate::utils::{FakeRemoteTrack, MockDataChannel};

#[tokio::test]
async fn test_stream_surfaces_once() {
    init_tracing();
    let mut viewer = create_test_viewer(0.0).await;
    let me = viewer.key();

    viewer
        .manager
        .handle_transport_event(TransportEvent::TrackReceived(
            me.clone(),
            FakeRemoteTrack::shared("video-1", TrackKind::Video),
        ))
        .await;
    viewer
        .manager
        .handle_transport_event(TransportEvent::TrackReceived(
            me.clone(),
            FakeRemoteTrack::shared("audio-1", TrackKind::Audio),
        ))
        .await;

    match viewer.events.try_recv() {
        Ok(ViewerEvent::StreamReady { stream_id, track }) => {
            assert_eq!(stream_id, "screen");
            assert_eq!(track.id(), "video-1");
        }
        other => panic!("expected StreamReady, got {:?}", other),
    }
    assert!(viewer.events.try_recv().is_err());
}

#[tokio::test]
async fn test_quality_request_needs_open_channel() {
    init_tracing();
    let mut viewer = create_test_viewer(0.0).await;

    assert!(!viewer.manager.request_quality(QualityLevel::Low).await);

    let channel = Arc::new(MockDataChannel::new("sync", true));
    let adopted: Arc<dyn DataChannel> = channel.clone();
    let key = viewer.key();
    viewer
        .manager
        .handle_transport_event(TransportEvent::DataChannelOpened(key, adopted))
        .await;
    assert!(matches!(
        viewer.events.try_recv(),
        Ok(ViewerEvent::ChannelOpen)
    ));

    assert!(viewer.manager.request_quality(QualityLevel::Low).await);
    assert_eq!(
        channel.sent(),
        vec![r#"{"action":"quality-request","quality":"low"}"#]
    );

    channel.set_open(false);
    assert!(!viewer.manager.request_quality(QualityLevel::High).await);
}

#[tokio::test]
async fn test_connection_state_is_surfaced() {
    init_tracing();
    let mut viewer = create_test_viewer(0.0).await;
    let key = viewer.key();

    viewer
        .manager
        .handle_transport_event(TransportEvent::StateChanged(
            key,
            ConnectionState::Failed,
        ))
        .await;

    assert!(matches!(
        viewer.events.try_recv(),
        Ok(ViewerEvent::ConnectionState(ConnectionState::Failed))
    ));
}

#[tokio::test]
async fn test_foreign_connection_events_are_ignored() {
    init_tracing();
    let mut viewer = create_test_viewer(0.0).await;
    let foreign = ConnectionKey::new(PeerId::from("viewer"), ConnectionId::next());

    viewer
        .manager
        .handle_transport_event(TransportEvent::StateChanged(
            foreign.clone(),
            ConnectionState::Closed,
        ))
        .await;
    viewer
        .manager
        .handle_transport_event(TransportEvent::TrackReceived(
            foreign,
            FakeRemoteTrack::shared("video-1", TrackKind::Video),
        ))
        .await;

    assert!(viewer.events.try_recv().is_err());
}

#[tokio::test]
async fn test_host_leave_is_reported() {
    init_tracing();
    let viewer = create_test_viewer(0.0).await;
    let mut events = viewer.events;
    let (relay_tx, relay_rx) = mpsc::channel(8);
    let handle = viewer.manager.spawn(relay_rx);
    let host = host_id();

    relay_tx
        .send(RelayEvent::PeerJoined(host.clone()))
        .await
        .unwrap();
    relay_tx
        .send(RelayEvent::Signal(SignalEnvelope::directed(
            host.clone(),
            PeerId::from("viewer"),
            SignalData::Offer(SessionDescription::offer("o1")),
        )))
        .await
        .unwrap();
    // Another viewer leaving is not news.
    relay_tx
        .send(RelayEvent::PeerLeft(PeerId::from("other")))
        .await
        .unwrap();
    relay_tx.send(RelayEvent::PeerLeft(host.clone())).await.unwrap();

    match events.recv().await {
        Some(ViewerEvent::HostLeft(peer)) => assert_eq!(peer, host),
        other => panic!("expected HostLeft, got {:?}", other),
    }

    handle.shutdown().await.unwrap();
    assert_eq!(viewer.signaling.answers_to(&host).await.len(), 1);
}

#[tokio::test]
async fn test_cleanup_closes_adopted_channel() {
    init_tracing();
    let mut viewer = create_test_viewer(0.0).await;
    let channel = Arc::new(MockDataChannel::new("sync", true));
    let adopted: Arc<dyn DataChannel> = channel.clone();
    let key = viewer.key();
    viewer
        .manager
        .handle_transport_event(TransportEvent::DataChannelOpened(key, adopted))
        .await;

    viewer.manager.cleanup().await;

    assert!(channel.is_closed());
    assert!(viewer.factory.connection(&PeerId::from("viewer")).unwrap().log().closed);
    assert!(!viewer.manager.request_quality(QualityLevel::Low).await);
}
