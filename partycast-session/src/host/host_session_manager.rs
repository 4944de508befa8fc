use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::host::host_command::{HostCommand, HostHandle};
use crate::host::peer_session::PeerSession;
use crate::signaling::SignalingOutput;
use crate::stats::{StatsCallback, StatsMonitor};
use crate::transport::{
    ConnectionState, MediaStream, PeerConnection, PeerConnectionFactory, TransportEvent,
};
use bytes::Bytes;
use partycast_core::{
    ChannelMessage, NegotiationState, PeerId, QualityLevel, RoomId, SessionDescription,
    SessionDirectory, SignalData, SyncEvent,
};
use partycast_relay::RelayEvent;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Called with sync events a viewer sends back over its side-channel.
pub type SyncListener = Arc<dyn Fn(&PeerId, SyncEvent) + Send + Sync>;

const COMMAND_BUFFER: usize = 64;
const TRANSPORT_BUFFER: usize = 256;

/// Owns one connection per viewer of a hosted room.
pub struct HostSessionManager {
    /// Who is in the room, as presence reports it.
    directory: SessionDirectory,
    factory: Arc<dyn PeerConnectionFactory>,
    /// Offers and candidates go out through here.
    signaling: Arc<dyn SignalingOutput>,
    config: SessionConfig,
    /// One session per viewer with a live connection.
    sessions: HashMap<PeerId, PeerSession>,
    /// Attached to every new session before its first offer.
    active_stream: Option<MediaStream>,
    stats: StatsMonitor,
    sync_listener: Option<SyncListener>,
    /// Events from every connection, tagged with the connection they came from.
    transport_rx: mpsc::Receiver<TransportEvent>,
    /// Cloned into each connection the factory builds.
    transport_tx: mpsc::Sender<TransportEvent>,
}

impl HostSessionManager {
    pub fn new(
        local_id: PeerId,
        room: RoomId,
        factory: Arc<dyn PeerConnectionFactory>,
        signaling: Arc<dyn SignalingOutput>,
        config: SessionConfig,
    ) -> Self {
        let (transport_tx, transport_rx) = mpsc::channel(TRANSPORT_BUFFER);

        Self {
            directory: SessionDirectory::for_host(room, local_id),
            factory,
            signaling,
            config,
            sessions: HashMap::new(),
            active_stream: None,
            stats: StatsMonitor::new(),
            sync_listener: None,
            transport_rx,
            transport_tx,
        }
    }

    pub fn with_sync_listener(mut self, listener: SyncListener) -> Self {
        self.sync_listener = Some(listener);
        self
    }

    /// Runs the manager on its own task.
    pub fn spawn(self, relay_rx: mpsc::Receiver<RelayEvent>) -> HostHandle {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        tokio::spawn(self.run(relay_rx, rx));
        HostHandle::new(tx)
    }

    pub fn directory(&self) -> &SessionDirectory {
        &self.directory
    }

    pub fn session(&self, peer_id: &PeerId) -> Option<&PeerSession> {
        self.sessions.get(peer_id)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn active_stream(&self) -> Option<&MediaStream> {
        self.active_stream.as_ref()
    }

    pub fn stats(&self) -> &StatsMonitor {
        &self.stats
    }

    pub async fn run(
        mut self,
        mut relay_rx: mpsc::Receiver<RelayEvent>,
        mut command_rx: mpsc::Receiver<HostCommand>,
    ) {
        info!("Host loop started for room {}", self.directory.room());

        loop {
            tokio::select! {
                // 1. Presence and signals (Relay -> Host)
                evt = relay_rx.recv() => {
                    match evt {
                        Some(e) => self.handle_relay_event(e).await,
                        None => {
                            info!("Relay subscription ended. Closing room.");
                            break;
                        }
                    }
                }

                // 2. Application commands
                cmd = command_rx.recv() => {
                    match cmd {
                        Some(HostCommand::Shutdown) | None => {
                            info!("Host shutdown requested");
                            break;
                        }
                        Some(c) => self.handle_command(c).await,
                    }
                }

                // 3. Engine events (Viewer connection -> Host)
                Some(evt) = self.transport_rx.recv() => {
                    self.handle_transport_event(evt).await;
                }
            }
        }

        self.cleanup().await;
        info!("Host loop finished");
    }

    async fn handle_relay_event(&mut self, event: RelayEvent) {
        match event {
            RelayEvent::PeerJoined(peer_id) => {
                if self.directory.observe_join(&peer_id) {
                    debug!("Viewer {} is present", peer_id);
                }
                if let Err(e) = self.handle_viewer_join(&peer_id).await {
                    error!("Could not open session for {}: {}", peer_id, e);
                }
            }
            RelayEvent::PeerLeft(peer_id) => {
                self.directory.observe_leave(&peer_id);
                self.handle_viewer_leave(&peer_id).await;
            }
            RelayEvent::Signal(envelope) => {
                if let Err(e) = self.handle_signal(&envelope.from, envelope.data).await {
                    warn!("Signal from {} not applied: {}", envelope.from, e);
                }
            }
        }
    }

    async fn handle_command(&mut self, cmd: HostCommand) {
        match cmd {
            HostCommand::SetStream(stream) => self.set_stream(stream).await,
            HostCommand::BroadcastSync { event, reply } => {
                let delivered = self.broadcast_sync_event(event).await;
                let _ = reply.send(delivered);
            }
            HostCommand::SetQuality {
                peer_id,
                level,
                reply,
            } => {
                let applied = self.set_quality_for_viewer(&peer_id, level).await;
                let _ = reply.send(applied);
            }
            HostCommand::Resync => self.resync().await,
            HostCommand::StartStats(callback) => self.start_stats(callback),
            HostCommand::StopStats => self.stop_stats_loop(),
            HostCommand::Shutdown => {}
        }
    }

    /// Opens a session for a newly present viewer. Repeated joins are ignored. On
    /// failure nothing of the half-built session is kept.
    pub async fn handle_viewer_join(&mut self, peer_id: &PeerId) -> Result<(), SessionError> {
        if self.sessions.contains_key(peer_id) {
            debug!("Session for {} already exists", peer_id);
            return Ok(());
        }

        info!("Opening session for viewer {}", peer_id);
        // 1. New transport, reporting into our loop
        let connection = self
            .factory
            .create(peer_id, self.transport_tx.clone())
            .await
            .map_err(|e| SessionError::negotiation(peer_id, e))?;

        // 2. Tracks, side-channel and first offer
        match self.open_session(peer_id, connection.clone()).await {
            Ok(session) => {
                // 3. Keep it, so the connection stays alive and gets sampled
                self.stats.register(peer_id.clone(), connection);
                self.sessions.insert(peer_id.clone(), session);
                Ok(())
            }
            Err(e) => {
                if let Err(close_err) = connection.close().await {
                    debug!("Closing failed session for {}: {:?}", peer_id, close_err);
                }
                Err(e)
            }
        }
    }

    /// Prepares a fresh connection and sends the first offer on it.
    async fn open_session(
        &self,
        peer_id: &PeerId,
        connection: Arc<dyn PeerConnection>,
    ) -> Result<PeerSession, SessionError> {
        if let Some(stream) = &self.active_stream {
            attach_tracks(connection.as_ref(), stream)
                .await
                .map_err(|e| SessionError::negotiation(peer_id, e))?;
        }

        let channel = connection
            .create_data_channel(&self.config.data_channel_label)
            .await
            .map_err(|e| SessionError::negotiation(peer_id, e))?;

        let mut session = PeerSession::new(peer_id.clone(), connection, channel);
        send_offer(self.signaling.as_ref(), &mut session).await?;
        Ok(session)
    }

    pub async fn handle_viewer_leave(&mut self, peer_id: &PeerId) {
        if self.remove_session(peer_id).await {
            info!("Viewer {} left", peer_id);
        }
    }

    /// Closes and forgets the session of `peer_id`. `false` if there was none.
    async fn remove_session(&mut self, peer_id: &PeerId) -> bool {
        let Some(session) = self.sessions.remove(peer_id) else {
            return false;
        };
        self.stats.unregister(peer_id);

        if let Err(e) = session.channel.close().await {
            debug!("Closing channel to {}: {:?}", peer_id, e);
        }
        if let Err(e) = session.connection.close().await {
            warn!("Closing connection to {}: {:?}", peer_id, e);
        }
        true
    }

    /// Applies one signal from a viewer. Stale, unknown and misdirected signals are
    /// dropped without error.
    pub async fn handle_signal(
        &mut self,
        from: &PeerId,
        data: SignalData,
    ) -> Result<(), SessionError> {
        match data {
            SignalData::Answer(answer) => self.apply_answer(from, answer).await,
            SignalData::Candidate(candidate) => {
                let Some(session) = self.sessions.get(from) else {
                    debug!("Discarding candidate from {} without session", from);
                    return Ok(());
                };
                if let Err(e) = session.connection.add_ice_candidate(candidate).await {
                    warn!("Failed to add ICE candidate from {}: {:?}", from, e);
                }
                Ok(())
            }
            SignalData::Offer(_) => {
                debug!("Host ignores offer from {}", from);
                Ok(())
            }
        }
    }

    async fn apply_answer(
        &mut self,
        from: &PeerId,
        answer: SessionDescription,
    ) -> Result<(), SessionError> {
        let Some(session) = self.sessions.get_mut(from) else {
            debug!("Discarding answer from {} without session", from);
            return Ok(());
        };
        if session.negotiation != NegotiationState::LocalOfferPending {
            debug!(
                "Discarding stale answer from {} (state {})",
                from, session.negotiation
            );
            return Ok(());
        }

        // 1. Apply the answer to the pending offer
        session
            .connection
            .set_remote_description(answer)
            .await
            .map_err(|e| SessionError::negotiation(from, e))?;
        session.mark_answered();
        debug!("Answer from {} applied", from);

        // 2. Send the offer that was held back while this one was in flight
        if session.renegotiation_pending {
            self.renegotiate(from).await?;
        }
        Ok(())
    }

    /// Sends a fresh offer to `peer_id`. While a recent offer is still unanswered the
    /// new one waits for that answer.
    pub async fn renegotiate(&mut self, peer_id: &PeerId) -> Result<(), SessionError> {
        self.offer_again(peer_id, false).await
    }

    async fn offer_again(&mut self, peer_id: &PeerId, force: bool) -> Result<(), SessionError> {
        let offer_timeout = self.config.offer_timeout;
        let Some(session) = self.sessions.get_mut(peer_id) else {
            return Err(SessionError::UnknownPeer(peer_id.clone()));
        };

        if !force && session.has_fresh_offer(offer_timeout) {
            debug!("Offer to {} outstanding, renegotiation deferred", peer_id);
            session.renegotiation_pending = true;
            return Ok(());
        }
        if session.negotiation == NegotiationState::LocalOfferPending {
            warn!("Replacing unanswered offer to {}", peer_id);
        }

        send_offer(self.signaling.as_ref(), session).await
    }

    /// Re-offers every session, replacing offers that are still outstanding.
    pub async fn resync(&mut self) {
        let peers: Vec<PeerId> = self.sessions.keys().cloned().collect();
        info!("Resyncing {} viewers", peers.len());

        for peer_id in peers {
            if let Err(e) = self.offer_again(&peer_id, true).await {
                warn!("Resync of {} failed: {}", peer_id, e);
            }
        }
    }

    /// Makes `stream` the shared one and pushes its tracks to every viewer.
    pub async fn set_stream(&mut self, stream: MediaStream) {
        info!(
            "Sharing stream {} ({} tracks) with {} viewers",
            stream.id,
            stream.tracks.len(),
            self.sessions.len()
        );

        let peers: Vec<PeerId> = self.sessions.keys().cloned().collect();
        for peer_id in peers {
            let Some(session) = self.sessions.get(&peer_id) else {
                continue;
            };
            if let Err(e) = attach_tracks(session.connection.as_ref(), &stream).await {
                warn!("Failed to attach tracks for {}: {:?}", peer_id, e);
                continue;
            }
            if let Err(e) = self.renegotiate(&peer_id).await {
                warn!("Renegotiation with {} failed: {}", peer_id, e);
            }
        }

        self.active_stream = Some(stream);
    }

    /// Sends `event` to every viewer whose side-channel is open. Returns how many got it.
    pub async fn broadcast_sync_event(&self, event: SyncEvent) -> usize {
        let text = match ChannelMessage::Sync(event).encode() {
            Ok(text) => text,
            Err(e) => {
                error!("Failed to encode sync event: {}", e);
                return 0;
            }
        };

        let mut delivered = 0;
        for session in self.sessions.values() {
            if !session.channel.is_open() {
                debug!("Channel to {} not open, event skipped", session.peer_id);
                continue;
            }
            match session.channel.send_text(&text).await {
                Ok(()) => delivered += 1,
                Err(e) => warn!("Failed to send sync to {}: {:?}", session.peer_id, e),
            }
        }
        delivered
    }

    /// Constrains the video sender of one viewer. Other viewers are not touched.
    pub async fn set_quality_for_viewer(&mut self, peer_id: &PeerId, level: QualityLevel) -> bool {
        let Some(session) = self.sessions.get_mut(peer_id) else {
            debug!("Quality {} for unknown viewer {}", level, peer_id);
            return false;
        };

        match session
            .connection
            .set_video_encoding(level.encoding_parameters())
            .await
        {
            Ok(true) => {
                info!("Quality for {} set to {}", peer_id, level);
                session.quality = Some(level);
                true
            }
            Ok(false) => {
                debug!("No video sender for {}, quality unchanged", peer_id);
                false
            }
            Err(e) => {
                warn!("Failed to set quality for {}: {:?}", peer_id, e);
                false
            }
        }
    }

    pub fn start_stats_loop(&mut self, callback: impl Fn(f64) + Send + Sync + 'static) {
        self.start_stats(Arc::new(callback));
    }

    fn start_stats(&mut self, callback: StatsCallback) {
        self.stats.start(self.config.stats_interval, callback);
    }

    pub fn stop_stats_loop(&mut self) {
        self.stats.stop();
    }

    /// Stops stats and closes every session.
    pub async fn cleanup(&mut self) {
        self.stats.stop();

        let peers: Vec<PeerId> = self.sessions.keys().cloned().collect();
        for peer_id in &peers {
            self.remove_session(peer_id).await;
        }
        self.stats.clear();
        info!("Closed {} sessions", peers.len());
    }

    /// Applies one engine event. Events from a connection that no longer backs a session
    /// (closed, or replaced after the viewer rejoined) are dropped.
    pub async fn handle_transport_event(&mut self, event: TransportEvent) {
        let key = event.key().clone();
        if !self.sessions.get(&key.peer_id).is_some_and(|s| s.owns(&key)) {
            debug!("Dropping event from stale connection {}", key);
            return;
        }
        let peer_id = key.peer_id;

        match event {
            TransportEvent::CandidateGenerated(_, candidate) => {
                if let Err(e) = self
                    .signaling
                    .send_signal(&peer_id, SignalData::Candidate(candidate))
                    .await
                {
                    warn!("Failed to send candidate to {}: {:?}", peer_id, e);
                }
            }

            TransportEvent::DataChannelOpened(_, channel) => {
                info!("Side-channel '{}' to {} open", channel.label(), peer_id);
            }

            TransportEvent::Message(_, data) => {
                self.handle_channel_message(peer_id, data).await;
            }

            TransportEvent::TrackReceived(_, track) => {
                debug!("Ignoring track {} from viewer {}", track.id(), peer_id);
            }

            TransportEvent::StateChanged(_, state) => match state {
                ConnectionState::Closed => {
                    if self.remove_session(&peer_id).await {
                        info!("Connection to {} closed, session removed", peer_id);
                    }
                }
                ConnectionState::Failed | ConnectionState::Disconnected => {
                    warn!("Connection to {} is {:?}", peer_id, state);
                }
                _ => debug!("Connection to {} is {:?}", peer_id, state),
            },
        }
    }

    /// Side-channel traffic from a viewer: quality requests and sync events.
    async fn handle_channel_message(&mut self, peer_id: PeerId, data: Bytes) {
        let Ok(text) = std::str::from_utf8(&data) else {
            warn!("Non-text side-channel message from {}", peer_id);
            return;
        };

        match ChannelMessage::decode(text) {
            Ok(ChannelMessage::QualityRequest(level)) => {
                self.set_quality_for_viewer(&peer_id, level).await;
            }
            Ok(ChannelMessage::Sync(event)) => match &self.sync_listener {
                Some(listener) => listener(&peer_id, event),
                None => debug!("Sync event from viewer {} ignored", peer_id),
            },
            Err(e) => warn!("Dropping side-channel message from {}: {}", peer_id, e),
        }
    }
}

/// Adds each track on a new sender, or swaps it onto the sender of the same kind.
async fn attach_tracks(connection: &dyn PeerConnection, stream: &MediaStream) -> anyhow::Result<()> {
    let mut kinds = connection.sender_kinds().await;

    for track in &stream.tracks {
        if kinds.contains(&track.kind()) {
            connection.replace_track(track.clone()).await?;
        } else {
            connection.add_track(track.clone()).await?;
            kinds.push(track.kind());
        }
    }
    Ok(())
}

/// Creates an offer, applies it locally and sends it to the session's viewer.
async fn send_offer(
    signaling: &dyn SignalingOutput,
    session: &mut PeerSession,
) -> Result<(), SessionError> {
    let peer_id = session.peer_id.clone();

    // 1. Local offer
    let offer = session
        .connection
        .create_offer()
        .await
        .map_err(|e| SessionError::negotiation(&peer_id, e))?;
    // 2. Set it as the local description
    session
        .connection
        .set_local_description(offer.clone())
        .await
        .map_err(|e| SessionError::negotiation(&peer_id, e))?;
    session.mark_offer_sent();

    // 3. Out through the relay
    signaling
        .send_signal(&peer_id, SignalData::Offer(offer))
        .await
        .map_err(|e| SessionError::signaling(&peer_id, e))?;
    debug!("Offer sent to {}", peer_id);
    Ok(())
}
