use crate::error::SessionError;
use partycast_core::QualityLevel;
use tokio::sync::{mpsc, oneshot};

pub enum ViewerCommand {
    RequestQuality {
        level: QualityLevel,
        reply: oneshot::Sender<bool>,
    },
    Shutdown,
}

#[derive(Clone)]
pub struct ViewerHandle {
    tx: mpsc::Sender<ViewerCommand>,
}

impl ViewerHandle {
    pub fn new(tx: mpsc::Sender<ViewerCommand>) -> Self {
        Self { tx }
    }

    /// Whether the request went out over the side-channel.
    pub async fn request_quality(&self, level: QualityLevel) -> Result<bool, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(ViewerCommand::RequestQuality { level, reply })
            .await
            .map_err(|_| SessionError::Stopped)?;
        rx.await.map_err(|_| SessionError::Stopped)
    }

    pub async fn shutdown(&self) -> Result<(), SessionError> {
        self.tx
            .send(ViewerCommand::Shutdown)
            .await
            .map_err(|_| SessionError::Stopped)
    }
}
