use async_trait::async_trait;
use partycast_core::{IceCandidate, PeerId, SessionDescription, SignalData};
use partycast_session::SignalingOutput;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

#[derive(Debug, Clone)]
pub struct SentSignal {
    pub to: PeerId,
    pub data: SignalData,
}

/// Mock SignalingOutput that captures all outgoing signals.
#[derive(Clone)]
pub struct MockSignalingOutput {
    tx: mpsc::UnboundedSender<SentSignal>,
    signals: Arc<Mutex<Vec<SentSignal>>>,
}

impl MockSignalingOutput {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SentSignal>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let signaling = Self {
            tx,
            signals: Arc::new(Mutex::new(Vec::new())),
        };
        (signaling, rx)
    }

    pub fn new_stored_only() -> Self {
        Self::new().0
    }

    pub async fn offers_to(&self, peer_id: &PeerId) -> Vec<SessionDescription> {
        self.signals
            .lock()
            .await
            .iter()
            .filter_map(|s| match &s.data {
                SignalData::Offer(offer) if &s.to == peer_id => Some(offer.clone()),
                _ => None,
            })
            .collect()
    }

    pub async fn answers_to(&self, peer_id: &PeerId) -> Vec<SessionDescription> {
        self.signals
            .lock()
            .await
            .iter()
            .filter_map(|s| match &s.data {
                SignalData::Answer(answer) if &s.to == peer_id => Some(answer.clone()),
                _ => None,
            })
            .collect()
    }

    pub async fn candidates_to(&self, peer_id: &PeerId) -> Vec<IceCandidate> {
        self.signals
            .lock()
            .await
            .iter()
            .filter_map(|s| match &s.data {
                SignalData::Candidate(c) if &s.to == peer_id => Some(c.clone()),
                _ => None,
            })
            .collect()
    }

    pub async fn count(&self) -> usize {
        self.signals.lock().await.len()
    }
}

impl Default for MockSignalingOutput {
    fn default() -> Self {
        Self::new_stored_only()
    }
}

#[async_trait]
impl SignalingOutput for MockSignalingOutput {
    async fn send_signal(&self, to: &PeerId, data: SignalData) -> anyhow::Result<()> {
        tracing::debug!("[MockSignaling] {:?} to {}", data.kind(), to);

        let msg = SentSignal {
            to: to.clone(),
            data,
        };
        self.signals.lock().await.push(msg.clone());
        let _ = self.tx.send(msg);
        Ok(())
    }
}
