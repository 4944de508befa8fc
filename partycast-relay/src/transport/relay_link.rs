use crate::error::RelayError;
use crate::hub::RelayHub;
use crate::protocol::{ClientFrame, ServerFrame};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// One open connection to a relay: frames go out on `outbound`, come back on `inbound`.
pub struct RelayLink {
    pub outbound: mpsc::UnboundedSender<ClientFrame>,
    pub inbound: mpsc::UnboundedReceiver<ServerFrame>,
}

/// Something that can open a link to a relay.
#[async_trait]
pub trait RelayTransport: Send + Sync {
    async fn open(&self) -> Result<RelayLink, RelayError>;
}

/// In-process link straight into a hub. Used by tests and by embedders that run the
/// relay next to the session managers.
#[async_trait]
impl RelayTransport for RelayHub {
    async fn open(&self) -> Result<RelayLink, RelayError> {
        let (client_tx, client_rx) = mpsc::unbounded_channel();
        let (server_tx, server_rx) = mpsc::unbounded_channel();

        tokio::spawn(self.clone().serve_peer(client_rx, server_tx));

        Ok(RelayLink {
            outbound: client_tx,
            inbound: server_rx,
        })
    }
}
