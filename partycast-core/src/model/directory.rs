use crate::model::peer::PeerId;
use crate::model::room::RoomId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeerRole {
    Host,
    Viewer,
}

/// Per-room bookkeeping of the remote peers this process knows about.
///
/// Presence may report the same peer many times (every snapshot re-lists everyone), so
/// every observation is idempotent and returns whether membership actually changed.
#[derive(Debug, Clone)]
pub struct SessionDirectory {
    room: RoomId,
    local: PeerId,
    role: PeerRole,
    host: Option<PeerId>,
    members: BTreeMap<PeerId, PeerRole>,
}

impl SessionDirectory {
    /// Directory of a room created by `local`. Everyone else is a viewer.
    pub fn for_host(room: RoomId, local: PeerId) -> Self {
        Self {
            room,
            host: Some(local.clone()),
            local,
            role: PeerRole::Host,
            members: BTreeMap::new(),
        }
    }

    /// Directory of a joined room. The host is unknown until it makes contact.
    pub fn for_viewer(room: RoomId, local: PeerId) -> Self {
        Self {
            room,
            local,
            role: PeerRole::Viewer,
            host: None,
            members: BTreeMap::new(),
        }
    }

    pub fn room(&self) -> &RoomId {
        &self.room
    }

    pub fn local(&self) -> &PeerId {
        &self.local
    }

    pub fn role(&self) -> PeerRole {
        self.role
    }

    pub fn host(&self) -> Option<&PeerId> {
        self.host.as_ref()
    }

    /// Records a presence join. Returns `true` only for a peer not seen before.
    pub fn observe_join(&mut self, peer_id: &PeerId) -> bool {
        if peer_id == &self.local || self.members.contains_key(peer_id) {
            return false;
        }
        let role = match &self.host {
            Some(host) if host == peer_id => PeerRole::Host,
            _ => PeerRole::Viewer,
        };
        self.members.insert(peer_id.clone(), role);
        true
    }

    /// Records a presence leave. Returns `true` if the peer was a member.
    pub fn observe_leave(&mut self, peer_id: &PeerId) -> bool {
        self.members.remove(peer_id).is_some()
    }

    /// Records which peer hosts the room, learned from its first offer.
    pub fn set_host(&mut self, peer_id: &PeerId) {
        if self.host.as_ref() == Some(peer_id) {
            return;
        }
        if let Some(previous) = self.host.take() {
            if let Some(role) = self.members.get_mut(&previous) {
                *role = PeerRole::Viewer;
            }
        }
        self.members.insert(peer_id.clone(), PeerRole::Host);
        self.host = Some(peer_id.clone());
    }

    pub fn role_of(&self, peer_id: &PeerId) -> Option<PeerRole> {
        if peer_id == &self.local {
            return Some(self.role);
        }
        self.members.get(peer_id).copied()
    }

    pub fn contains(&self, peer_id: &PeerId) -> bool {
        self.members.contains_key(peer_id)
    }

    pub fn viewers(&self) -> Vec<PeerId> {
        self.members
            .iter()
            .filter(|(_, role)| **role == PeerRole::Viewer)
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// No remote member left: the room only lives on in this process.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
