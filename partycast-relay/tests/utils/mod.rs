pub mod event_helpers;

pub use event_helpers::*;
