use crate::transport::media::{MediaTrack, TrackKind};
use crate::transport::transport_event::TransportEvent;
use anyhow::Result;
use async_trait::async_trait;
use partycast_core::{EncodingParameters, IceCandidate, PeerId, SessionDescription};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;

/// Identity of one connection object. A viewer that leaves and comes back gets a new
/// one, so events from its old connection can be told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Next id from a process-wide counter.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

/// One candidate pair as reported by the engine's stats.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidatePairSample {
    pub succeeded: bool,
    pub round_trip_ms: Option<f64>,
}

/// A message side-channel between host and viewer.
#[async_trait]
pub trait DataChannel: Send + Sync {
    fn label(&self) -> &str;

    fn is_open(&self) -> bool;

    async fn send_text(&self, text: &str) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

/// The part of a peer connection the session managers drive.
#[async_trait]
pub trait PeerConnection: Send + Sync {
    /// Issued by the factory on `create`. Every event of this connection carries it.
    fn id(&self) -> ConnectionId;

    async fn create_offer(&self) -> Result<SessionDescription>;

    async fn create_answer(&self) -> Result<SessionDescription>;

    async fn set_local_description(&self, desc: SessionDescription) -> Result<()>;

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()>;

    /// Drops a half-finished exchange. Does nothing when already stable.
    async fn rollback(&self) -> Result<()>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()>;

    /// Kinds of the tracks currently attached to senders.
    async fn sender_kinds(&self) -> Vec<TrackKind>;

    async fn add_track(&self, track: MediaTrack) -> Result<()>;

    /// Swaps the track on the sender of the same kind.
    async fn replace_track(&self, track: MediaTrack) -> Result<()>;

    async fn create_data_channel(&self, label: &str) -> Result<Arc<dyn DataChannel>>;

    /// Returns `false` when there is no video sender to constrain.
    async fn set_video_encoding(&self, params: EncodingParameters) -> Result<bool>;

    async fn candidate_pair_stats(&self) -> Result<Vec<CandidatePairSample>>;

    async fn close(&self) -> Result<()>;
}

/// Builds connections whose engine callbacks land in `events`, tagged with `key` and
/// a fresh `ConnectionId`.
#[async_trait]
pub trait PeerConnectionFactory: Send + Sync {
    async fn create(
        &self,
        key: &PeerId,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Arc<dyn PeerConnection>>;
}
