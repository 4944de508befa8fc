//! Room-scoped presence and signal delivery for partycast peers.
//!
//! The relay never sees media. It keeps a member table per room, fans presence changes
//! out to the members and forwards signal envelopes between them.

mod client;
mod error;
mod hub;
mod protocol;
mod server;
mod transport;

pub use client::*;
pub use error::RelayError;
pub use hub::*;
pub use protocol::{ClientFrame, ServerFrame};
pub use server::*;
pub use transport::*;
