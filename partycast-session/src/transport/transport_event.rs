use crate::transport::media::RemoteTrack;
use crate::transport::peer_connection::{ConnectionId, ConnectionState, DataChannel};
use bytes::Bytes;
use partycast_core::{IceCandidate, PeerId};
use std::fmt;
use std::sync::Arc;

/// The connection an event came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionKey {
    pub peer_id: PeerId,
    pub connection_id: ConnectionId,
}

impl ConnectionKey {
    pub fn new(peer_id: PeerId, connection_id: ConnectionId) -> Self {
        Self {
            peer_id,
            connection_id,
        }
    }
}

impl fmt::Display for ConnectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.peer_id, self.connection_id)
    }
}

/// Engine callbacks, turned into messages for the owning manager's loop.
pub enum TransportEvent {
    /// Local trickle candidate to hand to the remote side.
    CandidateGenerated(ConnectionKey, IceCandidate),

    /// A side-channel reached the open state, ours or one the remote opened.
    DataChannelOpened(ConnectionKey, Arc<dyn DataChannel>),

    Message(ConnectionKey, Bytes),

    TrackReceived(ConnectionKey, Arc<dyn RemoteTrack>),

    StateChanged(ConnectionKey, ConnectionState),
}

impl TransportEvent {
    pub fn key(&self) -> &ConnectionKey {
        match self {
            TransportEvent::CandidateGenerated(key, _)
            | TransportEvent::DataChannelOpened(key, _)
            | TransportEvent::Message(key, _)
            | TransportEvent::TrackReceived(key, _)
            | TransportEvent::StateChanged(key, _) => key,
        }
    }
}
