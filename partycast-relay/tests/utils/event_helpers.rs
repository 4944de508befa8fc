use partycast_relay::RelayEvent;
use std::time::Duration;
use tokio::sync::mpsc;

/// Timeout for a single relay event (ms).
pub const EVENT_TIMEOUT_MS: u64 = 2000;

/// Next event, or `None` if nothing arrives in time.
pub async fn next_event(rx: &mut mpsc::Receiver<RelayEvent>) -> Option<RelayEvent> {
    tokio::time::timeout(Duration::from_millis(EVENT_TIMEOUT_MS), rx.recv())
        .await
        .ok()
        .flatten()
}

/// Asserts that nothing shows up within a short grace period.
pub async fn expect_silence(rx: &mut mpsc::Receiver<RelayEvent>) {
    let res = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await;
    assert!(res.is_err(), "unexpected event: {:?}", res);
}
