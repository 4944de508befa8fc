use dashmap::DashMap;
use partycast_core::PeerId;
use partycast_session::{CandidatePairSample, PeerConnection, collect_samples, mean_round_trip};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::integration::{create_test_host, init_tracing};
use crate::utils::MockPeerConnection;

fn succeeded(rtt: f64) -> CandidatePairSample {
    CandidatePairSample {
        succeeded: true,
        round_trip_ms: Some(rtt),
    }
}

#[tokio::test(start_paused = true)]
async fn test_loop_reports_mean_round_trip() {
    init_tracing();
    let (mut host, factory, _signaling) = create_test_host();
    let v1 = PeerId::from("v1");
    let v2 = PeerId::from("v2");
    host.handle_viewer_join(&v1).await.unwrap();
    host.handle_viewer_join(&v2).await.unwrap();
    factory.connection(&v1).unwrap().set_pairs(vec![succeeded(40.0)]);
    factory.connection(&v2).unwrap().set_pairs(vec![
        succeeded(60.0),
        CandidatePairSample {
            succeeded: false,
            round_trip_ms: Some(900.0),
        },
    ]);

    let (tx, mut rx) = mpsc::unbounded_channel();
    host.start_stats_loop(move |rtt| {
        let _ = tx.send(rtt);
    });

    let first = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("sample within two periods")
        .unwrap();
    assert_eq!(first, 50.0);

    // A connection whose stats fail drops out of the next sample.
    factory
        .connection(&v2)
        .unwrap()
        .fail_stats
        .store(true, Ordering::SeqCst);
    let second = rx.recv().await.unwrap();
    assert_eq!(second, 40.0);

    host.stop_stats_loop();
    assert!(!host.stats().is_running());
}

#[tokio::test(start_paused = true)]
async fn test_no_connections_reports_zero() {
    init_tracing();
    let (mut host, _factory, _signaling) = create_test_host();

    let (tx, mut rx) = mpsc::unbounded_channel();
    host.start_stats_loop(move |rtt| {
        let _ = tx.send(rtt);
    });

    assert_eq!(rx.recv().await.unwrap(), 0.0);
}

#[tokio::test]
async fn test_collect_samples_skips_failing_connections() {
    init_tracing();
    let registry: DashMap<PeerId, Arc<dyn PeerConnection>> = DashMap::new();

    let healthy = Arc::new(MockPeerConnection::new(PeerId::from("a"), true));
    healthy.set_pairs(vec![succeeded(20.0), succeeded(30.0)]);
    let broken = Arc::new(MockPeerConnection::new(PeerId::from("b"), true));
    broken.set_pairs(vec![succeeded(1000.0)]);
    broken.fail_stats.store(true, Ordering::SeqCst);

    registry.insert(PeerId::from("a"), healthy);
    registry.insert(PeerId::from("b"), broken);

    let samples = collect_samples(&registry).await;
    assert_eq!(samples.len(), 2);
    assert_eq!(mean_round_trip(&samples), 25.0);
}
