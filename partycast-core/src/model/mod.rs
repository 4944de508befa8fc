mod directory;
mod negotiation;
mod peer;
mod room;
mod signaling;

pub use directory::{PeerRole, SessionDirectory};
pub use negotiation::NegotiationState;
pub use peer::PeerId;
pub use room::RoomId;
pub use signaling::{
    IceCandidate, IceServerConfig, SdpType, SessionDescription, SignalData, SignalEnvelope,
    SignalKind,
};
