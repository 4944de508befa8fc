//! Host and viewer sides of a partycast watch party.
//!
//! Each side is an actor: one task owns the manager and feeds it relay events,
//! commands and transport events one at a time.

mod config;
mod error;
mod host;
mod signaling;
mod stats;
mod transport;
mod viewer;

pub use config::*;
pub use error::SessionError;
pub use host::*;
pub use signaling::*;
pub use stats::*;
pub use transport::*;
pub use viewer::*;
