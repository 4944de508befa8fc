//! Shared vocabulary of partycast: peer and room identifiers, the signal envelope
//! carried by the relay, and the side-channel protocol spoken between host and viewers.

pub mod error;
pub mod model;
pub mod protocol;

pub use error::ProtocolError;
pub use model::*;
pub use protocol::*;
