use partycast_core::{PeerId, RoomId};
use partycast_relay::RelayEvent;

use crate::integration::{client_on, init_tracing};
use crate::utils::{expect_silence, next_event};

#[tokio::test]
async fn test_late_joiner_sees_existing_members() {
    init_tracing();

    let hub = partycast_relay::RelayHub::new();
    let room = RoomId::from("room00001");
    let host = client_on(&hub, "host");
    let viewer = client_on(&hub, "viewer");

    let mut host_rx = host.subscribe(room.clone()).await.expect("host subscribe");
    // Alone in the room: the snapshot lists only the host, which is filtered out.
    expect_silence(&mut host_rx).await;

    let mut viewer_rx = viewer.subscribe(room.clone()).await.expect("viewer subscribe");

    assert_eq!(
        next_event(&mut host_rx).await,
        Some(RelayEvent::PeerJoined(PeerId::from("viewer")))
    );
    assert_eq!(
        next_event(&mut viewer_rx).await,
        Some(RelayEvent::PeerJoined(PeerId::from("host")))
    );
    assert_eq!(hub.members(&room).len(), 2);
    assert_eq!(host.room().await, Some(room));
}

#[tokio::test]
async fn test_rooms_are_isolated() {
    init_tracing();

    let hub = partycast_relay::RelayHub::new();
    let a = client_on(&hub, "a");
    let b = client_on(&hub, "b");

    let mut a_rx = a.subscribe(RoomId::from("room-a")).await.unwrap();
    let _b_rx = b.subscribe(RoomId::from("room-b")).await.unwrap();

    expect_silence(&mut a_rx).await;
    assert_eq!(hub.room_count(), 2);
}
