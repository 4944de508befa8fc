mod channel;
mod quality;
mod sync;

pub use channel::ChannelMessage;
pub use quality::{DegradationPreference, EncodingParameters, QualityLevel};
pub use sync::{
    Correction, DEFAULT_SYNC_TOLERANCE_SECS, PlaybackState, PlaybackTarget, SyncAction, SyncEvent,
    now_epoch_ms, reconcile,
};
