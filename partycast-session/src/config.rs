use partycast_core::{DEFAULT_SYNC_TOLERANCE_SECS, IceServerConfig};
use std::time::Duration;

/// ICE setup for every connection a factory builds.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub ice_servers: Vec<IceServerConfig>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec![IceServerConfig {
                urls: vec!["stun:stun.l.google.com:19302".to_owned()],
                username: None,
                credential: None,
            }],
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Period of the host's round-trip sampling.
    pub stats_interval: Duration,
    /// Drift a viewer accepts on `play` before seeking.
    pub sync_tolerance_secs: f64,
    pub data_channel_label: String,
    /// Age after which an unanswered offer may be replaced by a new one.
    pub offer_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            stats_interval: Duration::from_secs(1),
            sync_tolerance_secs: DEFAULT_SYNC_TOLERANCE_SECS,
            data_channel_label: "sync".to_owned(),
            offer_timeout: Duration::from_secs(10),
        }
    }
}
