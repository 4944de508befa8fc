use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Drift a viewer tolerates on `play` before jumping to the host's position.
pub const DEFAULT_SYNC_TOLERANCE_SECS: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncAction {
    Play,
    Pause,
    Seek,
}

/// Host transport-state change, broadcast verbatim to every open side-channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SyncEvent {
    pub action: SyncAction,
    #[serde(rename = "time")]
    pub position_seconds: f64,
    #[serde(rename = "timestamp")]
    pub emitted_at_ms: u64,
}

impl SyncEvent {
    pub fn new(action: SyncAction, position_seconds: f64) -> Self {
        Self {
            action,
            position_seconds,
            emitted_at_ms: now_epoch_ms(),
        }
    }

    pub fn play(position_seconds: f64) -> Self {
        Self::new(SyncAction::Play, position_seconds)
    }

    pub fn pause(position_seconds: f64) -> Self {
        Self::new(SyncAction::Pause, position_seconds)
    }

    pub fn seek(position_seconds: f64) -> Self {
        Self::new(SyncAction::Seek, position_seconds)
    }
}

pub fn now_epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// The local player a viewer keeps in step with the host.
pub trait PlaybackTarget: Send + Sync {
    fn position(&self) -> f64;

    fn play(&self);

    fn pause(&self);

    fn seek(&self, position_seconds: f64);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Playing,
    Paused,
}

/// What a viewer has to do to its player after one sync event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correction {
    pub seek_to: Option<f64>,
    pub playback: Option<PlaybackState>,
}

impl Correction {
    /// Pauses before seeking and seeks before resuming, so the player lands on the
    /// host's frame in both directions.
    pub fn apply(&self, target: &dyn PlaybackTarget) {
        if self.playback == Some(PlaybackState::Paused) {
            target.pause();
        }
        if let Some(position) = self.seek_to {
            target.seek(position);
        }
        if self.playback == Some(PlaybackState::Playing) {
            target.play();
        }
    }
}

/// Viewer reconciliation rule. Only `play` is tolerant of drift; `pause` and `seek`
/// always snap to the event position.
pub fn reconcile(event: &SyncEvent, local_position: f64, tolerance: f64) -> Correction {
    let target = event.position_seconds;
    match event.action {
        SyncAction::Play => Correction {
            seek_to: ((local_position - target).abs() > tolerance).then_some(target),
            playback: Some(PlaybackState::Playing),
        },
        SyncAction::Pause => Correction {
            seek_to: Some(target),
            playback: Some(PlaybackState::Paused),
        },
        SyncAction::Seek => Correction {
            seek_to: Some(target),
            playback: None,
        },
    }
}
