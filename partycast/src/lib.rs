pub use partycast_core::{PeerId, RoomId};

pub mod model {
    pub use partycast_core::model::*;
}

pub mod protocol {
    pub use partycast_core::protocol::*;
    pub use partycast_core::ProtocolError;
}

#[cfg(feature = "relay")]
pub mod relay {
    pub use partycast_relay::*;
}

#[cfg(feature = "session")]
pub mod session {
    pub use partycast_session::*;
}
