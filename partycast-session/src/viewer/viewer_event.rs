use crate::transport::{ConnectionState, RemoteTrack};
use partycast_core::{PeerId, SyncEvent};
use std::sync::Arc;

/// What a viewer reports to its application.
#[derive(Debug, Clone)]
pub enum ViewerEvent {
    /// The host's stream arrived. Sent once per viewer session.
    StreamReady {
        stream_id: String,
        track: Arc<dyn RemoteTrack>,
    },
    /// The host's side-channel is open; quality requests can go out.
    ChannelOpen,
    /// A host sync event was applied to the local player.
    Synced(SyncEvent),
    HostLeft(PeerId),
    ConnectionState(ConnectionState),
}
