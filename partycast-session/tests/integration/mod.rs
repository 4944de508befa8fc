pub mod stats_tests;
pub mod viewer_tests;

use partycast_core::{PeerId, RoomId};
use partycast_session::{
    ConnectionKey, HostSessionManager, SessionConfig, ViewerEvent, ViewerSessionManager,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::Level;

use crate::utils::{MockConnectionFactory, MockPlayback, MockSignalingOutput};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub fn host_id() -> PeerId {
    PeerId::from("host")
}

pub fn create_test_host() -> (
    HostSessionManager,
    Arc<MockConnectionFactory>,
    MockSignalingOutput,
) {
    let factory = MockConnectionFactory::new();
    let signaling = MockSignalingOutput::new_stored_only();

    let host = HostSessionManager::new(
        host_id(),
        RoomId::from("room00001"),
        factory.clone(),
        Arc::new(signaling.clone()),
        SessionConfig::default(),
    );

    (host, factory, signaling)
}

pub struct TestViewer {
    pub manager: ViewerSessionManager,
    pub factory: Arc<MockConnectionFactory>,
    pub signaling: MockSignalingOutput,
    pub playback: Arc<MockPlayback>,
    pub events: mpsc::UnboundedReceiver<ViewerEvent>,
}

impl TestViewer {
    /// Tag of the viewer's own connection, for feeding it engine events.
    pub fn key(&self) -> ConnectionKey {
        self.factory
            .connection(&PeerId::from("viewer"))
            .expect("viewer connection")
            .connection_key()
    }
}

pub async fn create_test_viewer(position: f64) -> TestViewer {
    let factory = MockConnectionFactory::new();
    let signaling = MockSignalingOutput::new_stored_only();
    let playback = Arc::new(MockPlayback::at(position));
    let (events_tx, events) = mpsc::unbounded_channel();

    let manager = ViewerSessionManager::new(
        PeerId::from("viewer"),
        RoomId::from("room00001"),
        factory.clone(),
        Arc::new(signaling.clone()),
        playback.clone(),
        SessionConfig::default(),
        events_tx,
    )
    .await
    .expect("viewer manager");

    TestViewer {
        manager,
        factory,
        signaling,
        playback,
        events,
    }
}
