mod viewer_command;
mod viewer_event;
mod viewer_session_manager;

pub use viewer_command::*;
pub use viewer_event::*;
pub use viewer_session_manager::*;
