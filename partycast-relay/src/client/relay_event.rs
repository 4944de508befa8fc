use crate::protocol::ServerFrame;
use partycast_core::{PeerId, SignalEnvelope};

/// What a subscriber sees of its room, already filtered for the local peer.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayEvent {
    PeerJoined(PeerId),
    PeerLeft(PeerId),
    Signal(SignalEnvelope),
}

/// Turns one relay frame into the events `local` cares about.
///
/// A presence snapshot becomes one join per remote member; repeats are left for the
/// session directory to collapse. The local peer never hears about itself, and
/// envelopes addressed elsewhere are dropped.
pub fn route_frame(frame: ServerFrame, local: &PeerId) -> Vec<RelayEvent> {
    match frame {
        ServerFrame::PresenceSync { peers } => peers
            .into_iter()
            .filter(|p| p != local)
            .map(RelayEvent::PeerJoined)
            .collect(),
        ServerFrame::PresenceJoin { peer_id } if &peer_id != local => {
            vec![RelayEvent::PeerJoined(peer_id)]
        }
        ServerFrame::PresenceLeave { peer_id } if &peer_id != local => {
            vec![RelayEvent::PeerLeft(peer_id)]
        }
        ServerFrame::Broadcast { payload } if payload.is_deliverable_to(local) => {
            vec![RelayEvent::Signal(payload)]
        }
        _ => Vec::new(),
    }
}
