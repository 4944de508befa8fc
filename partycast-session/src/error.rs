use partycast_core::{PeerId, ProtocolError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("negotiation with {peer} failed: {reason:#}")]
    Negotiation { peer: PeerId, reason: anyhow::Error },

    #[error("failed to signal {peer}: {reason:#}")]
    Signaling { peer: PeerId, reason: anyhow::Error },

    #[error("no session for peer {0}")]
    UnknownPeer(PeerId),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("side-channel is not open")]
    ChannelNotOpen,

    #[error("session manager has stopped")]
    Stopped,
}

impl SessionError {
    pub(crate) fn negotiation(peer: &PeerId, reason: anyhow::Error) -> Self {
        Self::Negotiation {
            peer: peer.clone(),
            reason,
        }
    }

    pub(crate) fn signaling(peer: &PeerId, reason: anyhow::Error) -> Self {
        Self::Signaling {
            peer: peer.clone(),
            reason,
        }
    }
}
