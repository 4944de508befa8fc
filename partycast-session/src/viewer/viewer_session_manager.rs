use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::signaling::SignalingOutput;
use crate::transport::{DataChannel, PeerConnection, PeerConnectionFactory, TransportEvent};
use crate::viewer::viewer_command::{ViewerCommand, ViewerHandle};
use crate::viewer::viewer_event::ViewerEvent;
use bytes::Bytes;
use partycast_core::{
    ChannelMessage, NegotiationState, PeerId, PlaybackTarget, QualityLevel, RoomId,
    SessionDescription, SessionDirectory, SignalData, reconcile,
};
use partycast_relay::RelayEvent;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

const COMMAND_BUFFER: usize = 16;
const TRANSPORT_BUFFER: usize = 256;

/// The single connection a viewer keeps to the room's host.
pub struct ViewerSessionManager {
    /// Room membership; the host is learned from its first offer.
    directory: SessionDirectory,
    /// Created up front and answered on for every offer the host sends.
    connection: Arc<dyn PeerConnection>,
    /// Answers and candidates go back to the host through here.
    signaling: Arc<dyn SignalingOutput>,
    /// The local player that sync events steer.
    playback: Arc<dyn PlaybackTarget>,
    config: SessionConfig,
    negotiation: NegotiationState,
    /// The host's side-channel, adopted once it opens.
    channel: Option<Arc<dyn DataChannel>>,
    /// The first received track has been reported as the stream.
    stream_surfaced: bool,
    /// What the application hears about.
    events: mpsc::UnboundedSender<ViewerEvent>,
    transport_rx: mpsc::Receiver<TransportEvent>,
}

impl ViewerSessionManager {
    pub async fn new(
        local_id: PeerId,
        room: RoomId,
        factory: Arc<dyn PeerConnectionFactory>,
        signaling: Arc<dyn SignalingOutput>,
        playback: Arc<dyn PlaybackTarget>,
        config: SessionConfig,
        events: mpsc::UnboundedSender<ViewerEvent>,
    ) -> Result<Self, SessionError> {
        let (transport_tx, transport_rx) = mpsc::channel(TRANSPORT_BUFFER);
        let connection = factory
            .create(&local_id, transport_tx)
            .await
            .map_err(|e| SessionError::negotiation(&local_id, e))?;

        Ok(Self {
            directory: SessionDirectory::for_viewer(room, local_id),
            connection,
            signaling,
            playback,
            config,
            negotiation: NegotiationState::Stable,
            channel: None,
            stream_surfaced: false,
            events,
            transport_rx,
        })
    }

    pub fn spawn(self, relay_rx: mpsc::Receiver<RelayEvent>) -> ViewerHandle {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        tokio::spawn(self.run(relay_rx, rx));
        ViewerHandle::new(tx)
    }

    pub fn host_id(&self) -> Option<&PeerId> {
        self.directory.host()
    }

    pub fn negotiation(&self) -> NegotiationState {
        self.negotiation
    }

    pub fn directory(&self) -> &SessionDirectory {
        &self.directory
    }

    pub async fn run(
        mut self,
        mut relay_rx: mpsc::Receiver<RelayEvent>,
        mut command_rx: mpsc::Receiver<ViewerCommand>,
    ) {
        info!("Viewer loop started for room {}", self.directory.room());

        loop {
            tokio::select! {
                // 1. Presence and signals (Relay -> Viewer)
                evt = relay_rx.recv() => {
                    match evt {
                        Some(e) => self.handle_relay_event(e).await,
                        None => {
                            info!("Relay subscription ended");
                            break;
                        }
                    }
                }

                // 2. Application commands
                cmd = command_rx.recv() => {
                    match cmd {
                        Some(ViewerCommand::RequestQuality { level, reply }) => {
                            let sent = self.request_quality(level).await;
                            let _ = reply.send(sent);
                        }
                        Some(ViewerCommand::Shutdown) | None => break,
                    }
                }

                // 3. Engine events (Host connection -> Viewer)
                Some(evt) = self.transport_rx.recv() => {
                    self.handle_transport_event(evt).await;
                }
            }
        }

        self.cleanup().await;
        info!("Viewer loop finished");
    }

    async fn handle_relay_event(&mut self, event: RelayEvent) {
        match event {
            RelayEvent::PeerJoined(peer_id) => {
                self.directory.observe_join(&peer_id);
            }
            RelayEvent::PeerLeft(peer_id) => {
                self.directory.observe_leave(&peer_id);
                if self.directory.host() == Some(&peer_id) {
                    info!("Host {} left the room", peer_id);
                    self.emit(ViewerEvent::HostLeft(peer_id));
                }
            }
            RelayEvent::Signal(envelope) => {
                if let Err(e) = self.handle_signal(&envelope.from, envelope.data).await {
                    error!("Signal from {} not applied: {}", envelope.from, e);
                }
            }
        }
    }

    pub async fn handle_signal(
        &mut self,
        from: &PeerId,
        data: SignalData,
    ) -> Result<(), SessionError> {
        match data {
            SignalData::Offer(offer) => self.answer_offer(from, offer).await,
            SignalData::Candidate(candidate) => {
                if self.directory.host().is_none() {
                    debug!("Discarding candidate from {} before any offer", from);
                    return Ok(());
                }
                if let Err(e) = self.connection.add_ice_candidate(candidate).await {
                    warn!("Failed to add ICE candidate from {}: {:?}", from, e);
                }
                Ok(())
            }
            SignalData::Answer(_) => {
                debug!("Viewer ignores answer from {}", from);
                Ok(())
            }
        }
    }

    /// Answers an offer from `from`, which from now on is the host.
    async fn answer_offer(
        &mut self,
        from: &PeerId,
        offer: SessionDescription,
    ) -> Result<(), SessionError> {
        self.directory.set_host(from);

        // 1. Drop any exchange still in flight
        if !self.negotiation.is_stable() {
            debug!("Rolling back unfinished exchange ({})", self.negotiation);
            if let Err(e) = self.connection.rollback().await {
                warn!("Rollback failed: {:?}", e);
            }
            self.negotiation = NegotiationState::Stable;
        }

        // 2. Apply the offer
        self.connection
            .set_remote_description(offer)
            .await
            .map_err(|e| SessionError::negotiation(from, e))?;
        self.negotiation = NegotiationState::RemoteOfferPending;

        // 3. Create the answer and set it locally
        let answer = self
            .connection
            .create_answer()
            .await
            .map_err(|e| SessionError::negotiation(from, e))?;
        self.connection
            .set_local_description(answer.clone())
            .await
            .map_err(|e| SessionError::negotiation(from, e))?;
        self.negotiation = NegotiationState::Stable;

        // 4. Send it back through the relay
        self.signaling
            .send_signal(from, SignalData::Answer(answer))
            .await
            .map_err(|e| SessionError::signaling(from, e))?;
        debug!("Answer sent to host {}", from);
        Ok(())
    }

    /// Asks the host for a quality tier. `false` when no side-channel is open yet.
    pub async fn request_quality(&self, level: QualityLevel) -> bool {
        let Some(channel) = self.channel.as_ref().filter(|c| c.is_open()) else {
            debug!("Quality request {} without open channel", level);
            return false;
        };

        let text = match ChannelMessage::QualityRequest(level).encode() {
            Ok(text) => text,
            Err(e) => {
                error!("Failed to encode quality request: {}", e);
                return false;
            }
        };
        match channel.send_text(&text).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to send quality request: {:?}", e);
                false
            }
        }
    }

    /// Applies one engine event of the connection to the host.
    pub async fn handle_transport_event(&mut self, event: TransportEvent) {
        if event.key().connection_id != self.connection.id() {
            debug!("Dropping event from foreign connection {}", event.key());
            return;
        }

        match event {
            TransportEvent::CandidateGenerated(_, candidate) => {
                let Some(host) = self.directory.host().cloned() else {
                    debug!("Host unknown, dropping local candidate");
                    return;
                };
                if let Err(e) = self
                    .signaling
                    .send_signal(&host, SignalData::Candidate(candidate))
                    .await
                {
                    warn!("Failed to send candidate to {}: {:?}", host, e);
                }
            }

            TransportEvent::DataChannelOpened(_, channel) => {
                info!("Adopted side-channel '{}'", channel.label());
                self.channel = Some(channel);
                self.emit(ViewerEvent::ChannelOpen);
            }

            TransportEvent::Message(_, data) => self.apply_sync(data),

            TransportEvent::TrackReceived(_, track) => {
                if self.stream_surfaced {
                    debug!("Additional track {} on surfaced stream", track.id());
                    return;
                }
                self.stream_surfaced = true;
                info!("Stream {} ready", track.stream_id());
                self.emit(ViewerEvent::StreamReady {
                    stream_id: track.stream_id().to_owned(),
                    track,
                });
            }

            TransportEvent::StateChanged(_, state) => {
                info!("Connection to host is {:?}", state);
                self.emit(ViewerEvent::ConnectionState(state));
            }
        }
    }

    /// Brings the local player in line with a sync event from the host.
    fn apply_sync(&self, data: Bytes) {
        let Ok(text) = std::str::from_utf8(&data) else {
            warn!("Non-text side-channel message");
            return;
        };

        let event = match ChannelMessage::decode(text) {
            Ok(ChannelMessage::Sync(event)) => event,
            Ok(other) => {
                debug!("Viewer ignores {:?}", other);
                return;
            }
            Err(e) => {
                warn!("Dropping side-channel message: {}", e);
                return;
            }
        };

        let correction = reconcile(
            &event,
            self.playback.position(),
            self.config.sync_tolerance_secs,
        );
        correction.apply(self.playback.as_ref());
        self.emit(ViewerEvent::Synced(event));
    }

    fn emit(&self, event: ViewerEvent) {
        let _ = self.events.send(event);
    }

    pub async fn cleanup(&mut self) {
        if let Some(channel) = self.channel.take()
            && let Err(e) = channel.close().await
        {
            debug!("Closing side-channel: {:?}", e);
        }
        if let Err(e) = self.connection.close().await {
            warn!("Closing connection: {:?}", e);
        }
    }
}
