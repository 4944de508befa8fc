use serde::{Deserialize, Serialize};
use std::fmt;

/// Offer/answer progress of one connection, as tracked by the session managers.
///
/// Only the managers' own offer, answer and rollback steps move this value; the media
/// engine's internal signaling state is never read back into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NegotiationState {
    #[default]
    Stable,
    LocalOfferPending,
    RemoteOfferPending,
}

impl NegotiationState {
    pub fn is_stable(self) -> bool {
        self == NegotiationState::Stable
    }
}

impl fmt::Display for NegotiationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NegotiationState::Stable => write!(f, "stable"),
            NegotiationState::LocalOfferPending => write!(f, "local-offer-pending"),
            NegotiationState::RemoteOfferPending => write!(f, "remote-offer-pending"),
        }
    }
}
