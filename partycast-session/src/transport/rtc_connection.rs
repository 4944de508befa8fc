use crate::config::TransportConfig;
use crate::transport::media::{MediaTrack, RemoteTrack, TrackKind};
use crate::transport::peer_connection::{
    CandidatePairSample, ConnectionId, ConnectionState, DataChannel, PeerConnection,
    PeerConnectionFactory,
};
use crate::transport::transport_event::{ConnectionKey, TransportEvent};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use partycast_core::{EncodingParameters, IceCandidate, PeerId, SdpType, SessionDescription};
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::data_channel::RTCDataChannel;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::data_channel::data_channel_state::RTCDataChannelState;
use webrtc::ice::candidate::CandidatePairState;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::signaling_state::RTCSignalingState;
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;
use webrtc::rtp_transceiver::RTCRtpTransceiver;
use webrtc::stats::StatsReportType;
use webrtc::track::track_remote::TrackRemote;

/// Current encoding constraints of a connection's video sender. `None` until a
/// quality tier is applied.
pub type EncodingUpdates = watch::Receiver<Option<EncodingParameters>>;

/// Live connections' encoding receivers, keyed by peer. Each entry is removed by the
/// connection that put it there when that connection closes.
type EncodingRegistry = Arc<DashMap<PeerId, (ConnectionId, EncodingUpdates)>>;

/// Builds `RtcConnection`s on the `webrtc` crate.
pub struct RtcConnectionFactory {
    config: TransportConfig,
    encodings: EncodingRegistry,
}

impl RtcConnectionFactory {
    pub fn new(config: TransportConfig) -> Self {
        Self {
            config,
            encodings: Arc::new(DashMap::new()),
        }
    }

    /// Encoding constraints for the open connection created under `key`. The media
    /// pipeline feeding that viewer's track should follow these.
    pub fn encoding_updates(&self, key: &PeerId) -> Option<EncodingUpdates> {
        self.encodings.get(key).map(|entry| entry.value().1.clone())
    }
}

impl Default for RtcConnectionFactory {
    fn default() -> Self {
        Self::new(TransportConfig::default())
    }
}

#[async_trait]
impl PeerConnectionFactory for RtcConnectionFactory {
    async fn create(
        &self,
        key: &PeerId,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Arc<dyn PeerConnection>> {
        let key = ConnectionKey::new(key.clone(), ConnectionId::next());
        let connection =
            RtcConnection::new(key, &self.config, events, self.encodings.clone()).await?;
        Ok(Arc::new(connection))
    }
}

/// One `RTCPeerConnection` plus the callbacks feeding its manager.
pub struct RtcConnection {
    /// Tag on every event this connection emits.
    key: ConnectionKey,
    peer_connection: Arc<RTCPeerConnection>,
    /// Where locally opened data channels report, same as the engine callbacks.
    events: mpsc::Sender<TransportEvent>,
    encoding_tx: watch::Sender<Option<EncodingParameters>>,
    encodings: EncodingRegistry,
}

impl RtcConnection {
    async fn new(
        key: ConnectionKey,
        config: &TransportConfig,
        events: mpsc::Sender<TransportEvent>,
        encodings: EncodingRegistry,
    ) -> Result<Self> {
        // 1. MediaEngine with the default codecs
        let mut m = MediaEngine::default();
        m.register_default_codecs()?;
        // 2. Default interceptors (NACK, RTCP reports)
        let registry = register_default_interceptors(Registry::new(), &mut m)?;

        // 3. API object
        let api = APIBuilder::new()
            .with_media_engine(m)
            .with_interceptor_registry(registry)
            .build();

        // 4. ICE servers from the transport config
        let rtc_config = RTCConfiguration {
            ice_servers: config
                .ice_servers
                .iter()
                .map(|server| RTCIceServer {
                    urls: server.urls.clone(),
                    username: server.username.clone().unwrap_or_default(),
                    credential: server.credential.clone().unwrap_or_default(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        };

        // 5. The peer connection itself
        let peer_connection = Arc::new(api.new_peer_connection(rtc_config).await?);

        // --- Callbacks ---
        // Each closure gets its own clone of the sender and the key.

        // A. Connection state, all of it: the managers decide what matters
        let state_tx = events.clone();
        let key_state = key.clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |s: RTCPeerConnectionState| {
                let tx = state_tx.clone();
                let key = key_state.clone();

                Box::pin(async move {
                    info!("Peer connection state for {}: {:?}", key, s);
                    let state = match s {
                        RTCPeerConnectionState::Connecting => ConnectionState::Connecting,
                        RTCPeerConnectionState::Connected => ConnectionState::Connected,
                        RTCPeerConnectionState::Disconnected => ConnectionState::Disconnected,
                        RTCPeerConnectionState::Failed => ConnectionState::Failed,
                        RTCPeerConnectionState::Closed => ConnectionState::Closed,
                        _ => ConnectionState::New,
                    };
                    let _ = tx.send(TransportEvent::StateChanged(key, state)).await;
                })
            },
        ));

        // B. Trickle ICE: local candidates go out through signaling
        let ice_tx = events.clone();
        let key_ice = key.clone();
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let tx = ice_tx.clone();
            let key = key_ice.clone();

            Box::pin(async move {
                let Some(candidate) = c else { return };
                let Ok(init) = candidate.to_json() else {
                    return;
                };
                let candidate = IceCandidate {
                    candidate: init.candidate,
                    sdp_mid: init.sdp_mid,
                    sdp_m_line_index: init.sdp_mline_index,
                    username_fragment: init.username_fragment,
                };
                let _ = tx
                    .send(TransportEvent::CandidateGenerated(key, candidate))
                    .await;
            })
        }));

        // C. Incoming data channel. The viewer never opens one itself: it adopts the host's
        let dc_tx = events.clone();
        let key_dc = key.clone();
        peer_connection.on_data_channel(Box::new(move |dc: Arc<RTCDataChannel>| {
            let tx = dc_tx.clone();
            let key = key_dc.clone();

            Box::pin(async move {
                debug!("Remote opened data channel '{}' on {}", dc.label(), key);
                wire_data_channel(&dc, key, tx);
            })
        }));

        // D. Remote media, surfaced per track
        let track_tx = events.clone();
        let key_track = key.clone();
        peer_connection.on_track(Box::new(
            move |track: Arc<TrackRemote>,
                  _receiver: Arc<RTCRtpReceiver>,
                  _transceiver: Arc<RTCRtpTransceiver>| {
                let tx = track_tx.clone();
                let key = key_track.clone();

                Box::pin(async move {
                    let Some(remote) = RtcRemoteTrack::new(track) else {
                        warn!("Ignoring track of unknown kind on {}", key);
                        return;
                    };
                    info!("Track {} ({:?}) received on {}", remote.id, remote.kind, key);
                    let _ = tx
                        .send(TransportEvent::TrackReceived(key, Arc::new(remote)))
                        .await;
                })
            },
        ));

        // 6. Encoding constraints, readable through the factory while the connection lives
        let (encoding_tx, encoding_rx) = watch::channel(None);
        encodings.insert(key.peer_id.clone(), (key.connection_id, encoding_rx));

        Ok(Self {
            key,
            peer_connection,
            events,
            encoding_tx,
            encodings,
        })
    }

    pub fn peer_connection(&self) -> &Arc<RTCPeerConnection> {
        &self.peer_connection
    }

    async fn sender_for(&self, kind: TrackKind) -> Option<Arc<RTCRtpSender>> {
        for sender in self.peer_connection.get_senders().await {
            let Some(track) = sender.track().await else {
                continue;
            };
            if TrackKind::from_codec_type(track.kind()) == Some(kind) {
                return Some(sender);
            }
        }
        None
    }
}

/// Reports `dc` once open and forwards its messages. Used for channels from both sides.
fn wire_data_channel(
    dc: &Arc<RTCDataChannel>,
    key: ConnectionKey,
    tx: mpsc::Sender<TransportEvent>,
) {
    // The channel is only handed out once it can be written to
    let dc_open = dc.clone();
    let tx_open = tx.clone();
    let key_open = key.clone();
    dc.on_open(Box::new(move || {
        let tx = tx_open.clone();
        let key = key_open.clone();
        let channel: Arc<dyn DataChannel> = Arc::new(RtcDataChannel::new(dc_open.clone()));

        Box::pin(async move {
            info!("Data channel '{}' open for {}", channel.label(), key);
            let _ = tx.send(TransportEvent::DataChannelOpened(key, channel)).await;
        })
    }));

    // Incoming messages
    dc.on_message(Box::new(move |msg: DataChannelMessage| {
        let tx = tx.clone();
        let key = key.clone();
        Box::pin(async move {
            let bytes = Bytes::from(msg.data.to_vec());
            let _ = tx.send(TransportEvent::Message(key, bytes)).await;
        })
    }));
}

fn to_rtc_description(desc: SessionDescription) -> Result<RTCSessionDescription> {
    let value = serde_json::to_value(&desc)?;
    serde_json::from_value(value).context("Failed to convert session description")
}

/// Rollback of `pending`. The engine parses every description, rollbacks included.
fn rollback_description(pending: Option<RTCSessionDescription>) -> Result<RTCSessionDescription> {
    let pending = pending.ok_or_else(|| anyhow!("nothing to roll back"))?;
    to_rtc_description(SessionDescription {
        sdp_type: SdpType::Rollback,
        sdp: pending.sdp,
    })
}

fn from_rtc_description(desc: &RTCSessionDescription) -> Result<SessionDescription> {
    let value = serde_json::to_value(desc)?;
    serde_json::from_value(value).context("Failed to convert session description")
}

#[async_trait]
impl PeerConnection for RtcConnection {
    fn id(&self) -> ConnectionId {
        self.key.connection_id
    }

    async fn create_offer(&self) -> Result<SessionDescription> {
        let offer = self.peer_connection.create_offer(None).await?;
        from_rtc_description(&offer)
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        let answer = self.peer_connection.create_answer(None).await?;
        from_rtc_description(&answer)
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<()> {
        self.peer_connection
            .set_local_description(to_rtc_description(desc)?)
            .await?;
        Ok(())
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()> {
        self.peer_connection
            .set_remote_description(to_rtc_description(desc)?)
            .await?;
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        match self.peer_connection.signaling_state() {
            RTCSignalingState::HaveRemoteOffer | RTCSignalingState::HaveRemotePranswer => {
                let pending = self.peer_connection.pending_remote_description().await;
                self.peer_connection
                    .set_remote_description(rollback_description(pending)?)
                    .await?;
            }
            RTCSignalingState::HaveLocalOffer | RTCSignalingState::HaveLocalPranswer => {
                let pending = self.peer_connection.pending_local_description().await;
                self.peer_connection
                    .set_local_description(rollback_description(pending)?)
                    .await?;
            }
            _ => {}
        }
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_m_line_index,
            username_fragment: candidate.username_fragment,
        };
        self.peer_connection.add_ice_candidate(init).await?;
        Ok(())
    }

    async fn sender_kinds(&self) -> Vec<TrackKind> {
        let mut kinds = Vec::new();
        for sender in self.peer_connection.get_senders().await {
            if let Some(track) = sender.track().await {
                kinds.extend(TrackKind::from_codec_type(track.kind()));
            }
        }
        kinds
    }

    async fn add_track(&self, track: MediaTrack) -> Result<()> {
        let sender = self.peer_connection.add_track(track.local()).await?;

        // Incoming RTCP has to be drained for the interceptors to work.
        tokio::spawn(async move {
            let mut rtcp_buf = vec![0u8; 1500];
            while let Ok((_, _)) = sender.read(&mut rtcp_buf).await {}
        });
        Ok(())
    }

    async fn replace_track(&self, track: MediaTrack) -> Result<()> {
        let sender = self
            .sender_for(track.kind())
            .await
            .ok_or_else(|| anyhow!("no {:?} sender on {}", track.kind(), self.key))?;
        sender.replace_track(Some(track.local())).await?;
        Ok(())
    }

    async fn create_data_channel(&self, label: &str) -> Result<Arc<dyn DataChannel>> {
        let dc = self.peer_connection.create_data_channel(label, None).await?;
        wire_data_channel(&dc, self.key.clone(), self.events.clone());
        Ok(Arc::new(RtcDataChannel::new(dc)))
    }

    async fn set_video_encoding(&self, params: EncodingParameters) -> Result<bool> {
        if self.sender_for(TrackKind::Video).await.is_none() {
            return Ok(false);
        }
        self.encoding_tx.send_replace(Some(params));
        Ok(true)
    }

    async fn candidate_pair_stats(&self) -> Result<Vec<CandidatePairSample>> {
        let stats = self.peer_connection.get_stats().await;
        let samples = stats
            .reports
            .values()
            .filter_map(|report| match report {
                StatsReportType::CandidatePair(pair) => Some(CandidatePairSample {
                    succeeded: pair.state == CandidatePairState::Succeeded,
                    round_trip_ms: Some(pair.current_round_trip_time * 1000.0),
                }),
                _ => None,
            })
            .collect();
        Ok(samples)
    }

    async fn close(&self) -> Result<()> {
        let id = self.key.connection_id;
        self.encodings
            .remove_if(&self.key.peer_id, |_, (owner, _)| *owner == id);
        self.peer_connection.close().await?;
        Ok(())
    }
}

pub struct RtcDataChannel {
    label: String,
    inner: Arc<RTCDataChannel>,
}

impl RtcDataChannel {
    pub fn new(inner: Arc<RTCDataChannel>) -> Self {
        Self {
            label: inner.label().to_string(),
            inner,
        }
    }
}

#[async_trait]
impl DataChannel for RtcDataChannel {
    fn label(&self) -> &str {
        &self.label
    }

    fn is_open(&self) -> bool {
        self.inner.ready_state() == RTCDataChannelState::Open
    }

    async fn send_text(&self, text: &str) -> Result<()> {
        self.inner.send_text(text.to_owned()).await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.inner.close().await?;
        Ok(())
    }
}

pub struct RtcRemoteTrack {
    id: String,
    stream_id: String,
    kind: TrackKind,
    track: Arc<TrackRemote>,
}

impl RtcRemoteTrack {
    fn new(track: Arc<TrackRemote>) -> Option<Self> {
        Some(Self {
            id: track.id().to_string(),
            stream_id: track.stream_id().to_string(),
            kind: TrackKind::from_codec_type(track.kind())?,
            track,
        })
    }

    pub fn track(&self) -> &Arc<TrackRemote> {
        &self.track
    }
}

impl fmt::Debug for RtcRemoteTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RtcRemoteTrack")
            .field("id", &self.id)
            .field("stream_id", &self.stream_id)
            .field("kind", &self.kind)
            .finish()
    }
}

impl RemoteTrack for RtcRemoteTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn stream_id(&self) -> &str {
        &self.stream_id
    }

    fn kind(&self) -> TrackKind {
        self.kind
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
