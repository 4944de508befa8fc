use crate::transport::{ConnectionKey, DataChannel, PeerConnection};
use partycast_core::{NegotiationState, PeerId, QualityLevel};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Everything the host keeps for one viewer.
pub struct PeerSession {
    pub peer_id: PeerId,
    /// The connection this session was opened with. Events from any other connection
    /// of the same viewer are stale.
    pub connection: Arc<dyn PeerConnection>,
    /// The side-channel the host opened; sync events go out here.
    pub channel: Arc<dyn DataChannel>,
    /// Where the offer/answer exchange with this viewer stands.
    pub negotiation: NegotiationState,
    /// When the outstanding offer went out.
    pub offer_sent_at: Option<Instant>,
    /// A renegotiation was asked for while an offer was outstanding.
    pub renegotiation_pending: bool,
    /// Last tier applied to the video sender.
    pub quality: Option<QualityLevel>,
}

impl PeerSession {
    pub fn new(
        peer_id: PeerId,
        connection: Arc<dyn PeerConnection>,
        channel: Arc<dyn DataChannel>,
    ) -> Self {
        Self {
            peer_id,
            connection,
            channel,
            negotiation: NegotiationState::Stable,
            offer_sent_at: None,
            renegotiation_pending: false,
            quality: None,
        }
    }

    /// Whether `key` names this session's current connection.
    pub fn owns(&self, key: &ConnectionKey) -> bool {
        key.peer_id == self.peer_id && key.connection_id == self.connection.id()
    }

    /// An offer is outstanding and not yet older than `timeout`.
    pub fn has_fresh_offer(&self, timeout: Duration) -> bool {
        self.negotiation == NegotiationState::LocalOfferPending
            && self
                .offer_sent_at
                .is_some_and(|sent| sent.elapsed() < timeout)
    }

    pub(crate) fn mark_offer_sent(&mut self) {
        self.negotiation = NegotiationState::LocalOfferPending;
        self.offer_sent_at = Some(Instant::now());
        self.renegotiation_pending = false;
    }

    pub(crate) fn mark_answered(&mut self) {
        self.negotiation = NegotiationState::Stable;
        self.offer_sent_at = None;
    }
}
