mod host_command;
mod host_session_manager;
mod peer_session;

pub use host_command::*;
pub use host_session_manager::*;
pub use peer_session::*;
