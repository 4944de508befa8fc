mod relay_link;
mod ws_transport;

pub use relay_link::*;
pub use ws_transport::*;
