use async_trait::async_trait;
use partycast_core::{PeerId, SignalData};
use partycast_relay::RelayClient;

/// Where a session manager sends its offers, answers and candidates.
#[async_trait]
pub trait SignalingOutput: Send + Sync {
    async fn send_signal(&self, to: &PeerId, data: SignalData) -> anyhow::Result<()>;
}

#[async_trait]
impl SignalingOutput for RelayClient {
    async fn send_signal(&self, to: &PeerId, data: SignalData) -> anyhow::Result<()> {
        RelayClient::send_signal(self, to, data).await?;
        Ok(())
    }
}
