use partycast_core::{PeerId, RoomId, SignalEnvelope};
use serde::{Deserialize, Serialize};

/// Frames a peer sends to the relay.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", content = "d", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Enter a room and announce presence.
    Join { room: RoomId, peer_id: PeerId },
    /// Deliver an envelope to every other member of the room.
    Broadcast { payload: SignalEnvelope },
    Leave,
}

/// Frames the relay sends to a peer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", content = "d", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Full membership snapshot, the receiver included.
    PresenceSync { peers: Vec<PeerId> },
    PresenceJoin { peer_id: PeerId },
    PresenceLeave { peer_id: PeerId },
    Broadcast { payload: SignalEnvelope },
}
