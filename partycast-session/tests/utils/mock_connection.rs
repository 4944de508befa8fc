use anyhow::{Result, bail};
use async_trait::async_trait;
use partycast_core::{EncodingParameters, IceCandidate, PeerId, SessionDescription};
use partycast_session::{
    CandidatePairSample, ConnectionId, ConnectionKey, DataChannel, MediaTrack, PeerConnection,
    PeerConnectionFactory, TrackKind, TransportEvent,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

pub struct MockDataChannel {
    label: String,
    open: AtomicBool,
    closed: AtomicBool,
    sent: Mutex<Vec<String>>,
}

impl MockDataChannel {
    pub fn new(label: &str, open: bool) -> Self {
        Self {
            label: label.to_owned(),
            open: AtomicBool::new(open),
            closed: AtomicBool::new(false),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn set_open(&self, open: bool) {
        self.open.store(open, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataChannel for MockDataChannel {
    fn label(&self) -> &str {
        &self.label
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn send_text(&self, text: &str) -> Result<()> {
        if !self.is_open() {
            bail!("channel not open");
        }
        self.sent.lock().unwrap().push(text.to_owned());
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        self.open.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// Everything a `MockPeerConnection` was asked to do.
#[derive(Default, Debug, Clone)]
pub struct ConnectionLog {
    pub offers_created: usize,
    pub local_descriptions: Vec<SessionDescription>,
    pub remote_descriptions: Vec<SessionDescription>,
    pub candidates: Vec<IceCandidate>,
    pub senders: Vec<TrackKind>,
    pub added_tracks: Vec<String>,
    pub replaced_tracks: Vec<String>,
    pub encoding: Option<EncodingParameters>,
    pub rollbacks: usize,
    pub closed: bool,
}

pub struct MockPeerConnection {
    pub key: PeerId,
    id: ConnectionId,
    log: Mutex<ConnectionLog>,
    channel: Mutex<Option<Arc<MockDataChannel>>>,
    pairs: Mutex<Vec<CandidatePairSample>>,
    channel_open: bool,
    pub fail_offer: AtomicBool,
    pub fail_answer: AtomicBool,
    pub fail_stats: AtomicBool,
}

impl MockPeerConnection {
    pub fn new(key: PeerId, channel_open: bool) -> Self {
        Self {
            key,
            id: ConnectionId::next(),
            log: Mutex::new(ConnectionLog::default()),
            channel: Mutex::new(None),
            pairs: Mutex::new(Vec::new()),
            channel_open,
            fail_offer: AtomicBool::new(false),
            fail_answer: AtomicBool::new(false),
            fail_stats: AtomicBool::new(false),
        }
    }

    /// The tag this connection's engine events would carry.
    pub fn connection_key(&self) -> ConnectionKey {
        ConnectionKey::new(self.key.clone(), self.id)
    }

    pub fn log(&self) -> ConnectionLog {
        self.log.lock().unwrap().clone()
    }

    pub fn channel(&self) -> Option<Arc<MockDataChannel>> {
        self.channel.lock().unwrap().clone()
    }

    pub fn set_pairs(&self, pairs: Vec<CandidatePairSample>) {
        *self.pairs.lock().unwrap() = pairs;
    }
}

#[async_trait]
impl PeerConnection for MockPeerConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    async fn create_offer(&self) -> Result<SessionDescription> {
        if self.fail_offer.load(Ordering::SeqCst) {
            bail!("offer failed");
        }
        let mut log = self.log.lock().unwrap();
        log.offers_created += 1;
        Ok(SessionDescription::offer(format!(
            "offer-{}-{}",
            self.key, log.offers_created
        )))
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        if self.fail_answer.load(Ordering::SeqCst) {
            bail!("answer failed");
        }
        Ok(SessionDescription::answer(format!("answer-{}", self.key)))
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<()> {
        self.log.lock().unwrap().local_descriptions.push(desc);
        Ok(())
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()> {
        self.log.lock().unwrap().remote_descriptions.push(desc);
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        self.log.lock().unwrap().rollbacks += 1;
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        self.log.lock().unwrap().candidates.push(candidate);
        Ok(())
    }

    async fn sender_kinds(&self) -> Vec<TrackKind> {
        self.log.lock().unwrap().senders.clone()
    }

    async fn add_track(&self, track: MediaTrack) -> Result<()> {
        let mut log = self.log.lock().unwrap();
        log.senders.push(track.kind());
        log.added_tracks.push(track.id().to_owned());
        Ok(())
    }

    async fn replace_track(&self, track: MediaTrack) -> Result<()> {
        let mut log = self.log.lock().unwrap();
        if !log.senders.contains(&track.kind()) {
            bail!("no sender for {:?}", track.kind());
        }
        log.replaced_tracks.push(track.id().to_owned());
        Ok(())
    }

    async fn create_data_channel(&self, label: &str) -> Result<Arc<dyn DataChannel>> {
        let channel = Arc::new(MockDataChannel::new(label, self.channel_open));
        *self.channel.lock().unwrap() = Some(channel.clone());
        Ok(channel)
    }

    async fn set_video_encoding(&self, params: EncodingParameters) -> Result<bool> {
        let mut log = self.log.lock().unwrap();
        if !log.senders.contains(&TrackKind::Video) {
            return Ok(false);
        }
        log.encoding = Some(params);
        Ok(true)
    }

    async fn candidate_pair_stats(&self) -> Result<Vec<CandidatePairSample>> {
        if self.fail_stats.load(Ordering::SeqCst) {
            bail!("stats failed");
        }
        Ok(self.pairs.lock().unwrap().clone())
    }

    async fn close(&self) -> Result<()> {
        self.log.lock().unwrap().closed = true;
        Ok(())
    }
}

/// Hands out `MockPeerConnection`s and keeps them, with their event senders, for
/// inspection.
#[derive(Default)]
pub struct MockConnectionFactory {
    connections: Mutex<Vec<Arc<MockPeerConnection>>>,
    events: Mutex<Vec<(PeerId, mpsc::Sender<TransportEvent>)>>,
    closed_channels: AtomicBool,
    fail_offers: AtomicBool,
}

impl MockConnectionFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// New connections open side-channels that never reach the open state.
    pub fn with_closed_channels(&self) {
        self.closed_channels.store(true, Ordering::SeqCst);
    }

    /// New connections fail to create offers.
    pub fn fail_offers(&self, fail: bool) {
        self.fail_offers.store(fail, Ordering::SeqCst);
    }

    pub fn created(&self) -> usize {
        self.connections.lock().unwrap().len()
    }

    /// Most recent connection created for `key`.
    pub fn connection(&self, key: &PeerId) -> Option<Arc<MockPeerConnection>> {
        self.connections
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|c| &c.key == key)
            .cloned()
    }

    pub fn events_for(&self, key: &PeerId) -> Option<mpsc::Sender<TransportEvent>> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, tx)| tx.clone())
    }
}

#[async_trait]
impl PeerConnectionFactory for MockConnectionFactory {
    async fn create(
        &self,
        key: &PeerId,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Arc<dyn PeerConnection>> {
        let connection = Arc::new(MockPeerConnection::new(
            key.clone(),
            !self.closed_channels.load(Ordering::SeqCst),
        ));
        connection
            .fail_offer
            .store(self.fail_offers.load(Ordering::SeqCst), Ordering::SeqCst);

        self.connections.lock().unwrap().push(connection.clone());
        self.events.lock().unwrap().push((key.clone(), events));
        Ok(connection)
    }
}
