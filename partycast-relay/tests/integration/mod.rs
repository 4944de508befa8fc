
use partycast_core::PeerId;
use partycast_relay::{RelayClient, RelayHub};
use std::sync::Arc;
use tracing::Level;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub fn client_on(hub: &RelayHub, id: &str) -> RelayClient {
    RelayClient::new(PeerId::from(id), Arc::new(hub.clone()))
}
