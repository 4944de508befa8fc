use crate::protocol::{ClientFrame, ServerFrame};
use dashmap::DashMap;
use partycast_core::{PeerId, RoomId, SignalEnvelope};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

type Members = DashMap<PeerId, mpsc::UnboundedSender<ServerFrame>>;

/// Presence and broadcast fan-out for every room the relay knows.
///
/// Rooms exist only while they have members: the first join creates one, the last
/// leave drops it.
#[derive(Clone, Default)]
pub struct RelayHub {
    rooms: Arc<DashMap<RoomId, Arc<Members>>>,
}

impl RelayHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `peer_id` to `room`. Existing members are told about the newcomer and the
    /// newcomer receives a snapshot of the whole room. A peer joining again from a new
    /// link replaces its old registration without a second announcement.
    pub fn join(&self, room: &RoomId, peer_id: PeerId, tx: mpsc::UnboundedSender<ServerFrame>) {
        // The room entry stays locked until the newcomer is in: an empty room is only
        // dropped under the same lock.
        let members = self.rooms.entry(room.clone()).or_default();

        // 1. Announce to everyone already there
        if !members.contains_key(&peer_id) {
            for member in members.iter() {
                let _ = member.value().send(ServerFrame::PresenceJoin {
                    peer_id: peer_id.clone(),
                });
            }
        }

        // 2. Register, then hand the newcomer the full room
        members.insert(peer_id.clone(), tx.clone());
        let peers = members.iter().map(|m| m.key().clone()).collect();
        let _ = tx.send(ServerFrame::PresenceSync { peers });

        info!("Peer {} joined room {} ({} members)", peer_id, room, members.len());
    }

    /// Removes `peer_id` from `room` if it is still registered with the link behind `tx`.
    /// A leave from a link the peer has already replaced changes nothing.
    pub fn leave(
        &self,
        room: &RoomId,
        peer_id: &PeerId,
        tx: &mpsc::UnboundedSender<ServerFrame>,
    ) {
        let emptied = {
            let Some(members) = self.rooms.get(room) else {
                return;
            };
            if members
                .remove_if(peer_id, |_, current| current.same_channel(tx))
                .is_none()
            {
                debug!("Stale leave of {} from room {} ignored", peer_id, room);
                return;
            }

            for member in members.iter() {
                let _ = member.value().send(ServerFrame::PresenceLeave {
                    peer_id: peer_id.clone(),
                });
            }
            members.is_empty()
        };
        info!("Peer {} left room {}", peer_id, room);

        if emptied && self.rooms.remove_if(room, |_, m| m.is_empty()).is_some() {
            info!("Room {} is empty, dropping it", room);
        }
    }

    /// Forwards `envelope` unmodified to every member except `from`.
    pub fn broadcast(&self, room: &RoomId, from: &PeerId, envelope: SignalEnvelope) {
        let Some(members) = self.rooms.get(room).map(|m| m.value().clone()) else {
            warn!("Broadcast to unknown room {}", room);
            return;
        };

        for member in members.iter() {
            if member.key() == from {
                continue;
            }
            let _ = member.value().send(ServerFrame::Broadcast {
                payload: envelope.clone(),
            });
        }
    }

    pub fn members(&self, room: &RoomId) -> Vec<PeerId> {
        self.rooms
            .get(room)
            .map(|m| m.iter().map(|e| e.key().clone()).collect())
            .unwrap_or_default()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Drives one peer's link until its frame stream ends, then removes it from
    /// whatever room it was in.
    pub async fn serve_peer(
        self,
        mut frames: mpsc::UnboundedReceiver<ClientFrame>,
        outbound: mpsc::UnboundedSender<ServerFrame>,
    ) {
        let mut joined: Option<(RoomId, PeerId)> = None;

        while let Some(frame) = frames.recv().await {
            match frame {
                ClientFrame::Join { room, peer_id } => {
                    if let Some((old_room, old_peer)) = joined.take() {
                        self.leave(&old_room, &old_peer, &outbound);
                    }
                    self.join(&room, peer_id.clone(), outbound.clone());
                    joined = Some((room, peer_id));
                }
                ClientFrame::Broadcast { payload } => match &joined {
                    Some((room, peer_id)) => self.broadcast(room, peer_id, payload),
                    None => debug!("Dropping broadcast from a peer that has not joined"),
                },
                ClientFrame::Leave => {
                    if let Some((room, peer_id)) = joined.take() {
                        self.leave(&room, &peer_id, &outbound);
                    }
                }
            }
        }

        if let Some((room, peer_id)) = joined {
            self.leave(&room, &peer_id, &outbound);
        }
    }
}
