use serde::{Deserialize, Serialize};
use std::fmt;

/// Quality tier a viewer may ask the host for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityLevel {
    High,
    #[serde(rename = "sd", alias = "standard")]
    Standard,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DegradationPreference {
    MaintainResolution,
    Balanced,
    MaintainFramerate,
}

/// Constraints for one outgoing video sender.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EncodingParameters {
    pub max_bitrate_bps: u64,
    /// `None` keeps the source resolution.
    pub scale_resolution_down_by: Option<f64>,
    /// `None` leaves the frame rate unlimited.
    pub max_framerate: Option<u32>,
    pub degradation_preference: DegradationPreference,
}

impl QualityLevel {
    pub fn encoding_parameters(self) -> EncodingParameters {
        match self {
            QualityLevel::High => EncodingParameters {
                max_bitrate_bps: 10_000_000,
                scale_resolution_down_by: None,
                max_framerate: None,
                degradation_preference: DegradationPreference::MaintainResolution,
            },
            QualityLevel::Standard => EncodingParameters {
                max_bitrate_bps: 1_500_000,
                scale_resolution_down_by: Some(1.5),
                max_framerate: Some(30),
                degradation_preference: DegradationPreference::Balanced,
            },
            QualityLevel::Low => EncodingParameters {
                max_bitrate_bps: 500_000,
                scale_resolution_down_by: Some(2.0),
                max_framerate: Some(24),
                degradation_preference: DegradationPreference::MaintainFramerate,
            },
        }
    }

    pub fn as_wire_str(self) -> &'static str {
        match self {
            QualityLevel::High => "high",
            QualityLevel::Standard => "sd",
            QualityLevel::Low => "low",
        }
    }
}

impl fmt::Display for QualityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire_str())
    }
}
