use std::any::Any;
use std::fmt;
use std::sync::Arc;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::track::track_local::TrackLocal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Audio,
    Video,
}

impl TrackKind {
    pub(crate) fn from_codec_type(kind: RTPCodecType) -> Option<Self> {
        match kind {
            RTPCodecType::Audio => Some(TrackKind::Audio),
            RTPCodecType::Video => Some(TrackKind::Video),
            _ => None,
        }
    }
}

/// One local track the host sends to its viewers.
#[derive(Clone)]
pub struct MediaTrack {
    id: String,
    stream_id: String,
    kind: TrackKind,
    local: Arc<dyn TrackLocal + Send + Sync>,
}

impl MediaTrack {
    /// Wraps an engine track. Returns `None` when its codec is neither audio nor video.
    pub fn new(local: Arc<dyn TrackLocal + Send + Sync>) -> Option<Self> {
        let kind = TrackKind::from_codec_type(local.kind())?;
        Some(Self {
            id: local.id().to_string(),
            stream_id: local.stream_id().to_string(),
            kind,
            local,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    pub fn local(&self) -> Arc<dyn TrackLocal + Send + Sync> {
        self.local.clone()
    }
}

impl fmt::Debug for MediaTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaTrack")
            .field("id", &self.id)
            .field("stream_id", &self.stream_id)
            .field("kind", &self.kind)
            .finish()
    }
}

/// The stream a host is currently sharing.
#[derive(Debug, Clone)]
pub struct MediaStream {
    pub id: String,
    pub tracks: Vec<MediaTrack>,
}

impl MediaStream {
    pub fn new(id: impl Into<String>, tracks: Vec<MediaTrack>) -> Self {
        Self {
            id: id.into(),
            tracks,
        }
    }
}

/// A track received from the host.
pub trait RemoteTrack: Send + Sync + fmt::Debug {
    fn id(&self) -> &str;

    fn stream_id(&self) -> &str;

    fn kind(&self) -> TrackKind;

    /// Access to the engine track, e.g. `downcast_ref::<RtcRemoteTrack>()`.
    fn as_any(&self) -> &dyn Any;
}
