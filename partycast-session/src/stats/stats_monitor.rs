use crate::transport::{CandidatePairSample, PeerConnection};
use dashmap::DashMap;
use partycast_core::PeerId;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};
use tracing::{debug, warn};

pub type StatsCallback = Arc<dyn Fn(f64) + Send + Sync>;

type Registry = Arc<DashMap<PeerId, Arc<dyn PeerConnection>>>;

/// Periodic round-trip sampling over the host's live connections.
///
/// The registry mirrors the host's sessions; only the host manager writes to it.
#[derive(Default)]
pub struct StatsMonitor {
    registry: Registry,
    task: Option<JoinHandle<()>>,
}

impl StatsMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register(&self, peer_id: PeerId, connection: Arc<dyn PeerConnection>) {
        self.registry.insert(peer_id, connection);
    }

    pub(crate) fn unregister(&self, peer_id: &PeerId) {
        self.registry.remove(peer_id);
    }

    pub(crate) fn clear(&self) {
        self.registry.clear();
    }

    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Starts sampling every `period`, replacing any running loop. The first sample
    /// is taken one period after the start.
    pub fn start(&mut self, period: Duration, callback: StatsCallback) {
        self.stop();

        let registry = self.registry.clone();
        self.task = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                let samples = collect_samples(&registry).await;
                let mean = mean_round_trip(&samples);
                debug!("Mean round trip {:.1} ms over {} pairs", mean, samples.len());
                callback(mean);
            }
        }));
    }

    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for StatsMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Candidate pairs of every registered connection. A connection whose stats
/// query fails contributes nothing to this round.
pub async fn collect_samples(
    registry: &DashMap<PeerId, Arc<dyn PeerConnection>>,
) -> Vec<CandidatePairSample> {
    let connections: Vec<_> = registry
        .iter()
        .map(|e| (e.key().clone(), e.value().clone()))
        .collect();

    let mut samples = Vec::new();
    for (peer_id, connection) in connections {
        match connection.candidate_pair_stats().await {
            Ok(pairs) => samples.extend(pairs),
            Err(e) => warn!("Stats unavailable for {}: {:?}", peer_id, e),
        }
    }
    samples
}

/// Mean round trip (ms) over succeeded pairs that report one; 0 when there are none.
pub fn mean_round_trip(samples: &[CandidatePairSample]) -> f64 {
    let rtts: Vec<f64> = samples
        .iter()
        .filter(|s| s.succeeded)
        .filter_map(|s| s.round_trip_ms)
        .collect();

    if rtts.is_empty() {
        return 0.0;
    }
    rtts.iter().sum::<f64>() / rtts.len() as f64
}
