use crate::error::SessionError;
use crate::stats::StatsCallback;
use crate::transport::MediaStream;
use partycast_core::{PeerId, QualityLevel, SyncEvent};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Requests from the application to a running host.
pub enum HostCommand {
    SetStream(MediaStream),
    BroadcastSync {
        event: SyncEvent,
        reply: oneshot::Sender<usize>,
    },
    SetQuality {
        peer_id: PeerId,
        level: QualityLevel,
        reply: oneshot::Sender<bool>,
    },
    Resync,
    StartStats(StatsCallback),
    StopStats,
    Shutdown,
}

/// Cloneable front of a host actor.
#[derive(Clone)]
pub struct HostHandle {
    tx: mpsc::Sender<HostCommand>,
}

impl HostHandle {
    pub fn new(tx: mpsc::Sender<HostCommand>) -> Self {
        Self { tx }
    }

    async fn send(&self, cmd: HostCommand) -> Result<(), SessionError> {
        self.tx
            .send(cmd)
            .await
            .map_err(|_| SessionError::Stopped)
    }

    pub async fn set_stream(&self, stream: MediaStream) -> Result<(), SessionError> {
        self.send(HostCommand::SetStream(stream)).await
    }

    /// Number of viewers the event reached.
    pub async fn broadcast_sync(&self, event: SyncEvent) -> Result<usize, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(HostCommand::BroadcastSync { event, reply }).await?;
        rx.await.map_err(|_| SessionError::Stopped)
    }

    pub async fn set_quality(
        &self,
        peer_id: PeerId,
        level: QualityLevel,
    ) -> Result<bool, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(HostCommand::SetQuality {
            peer_id,
            level,
            reply,
        })
        .await?;
        rx.await.map_err(|_| SessionError::Stopped)
    }

    pub async fn resync(&self) -> Result<(), SessionError> {
        self.send(HostCommand::Resync).await
    }

    pub async fn start_stats(
        &self,
        callback: impl Fn(f64) + Send + Sync + 'static,
    ) -> Result<(), SessionError> {
        self.send(HostCommand::StartStats(Arc::new(callback))).await
    }

    pub async fn stop_stats(&self) -> Result<(), SessionError> {
        self.send(HostCommand::StopStats).await
    }

    pub async fn shutdown(&self) -> Result<(), SessionError> {
        self.send(HostCommand::Shutdown).await
    }
}
