use crate::error::ProtocolError;
use crate::protocol::quality::QualityLevel;
use crate::protocol::sync::SyncEvent;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const QUALITY_REQUEST_ACTION: &str = "quality-request";

#[derive(Serialize, Deserialize)]
struct QualityRequestFrame {
    action: String,
    quality: QualityLevel,
}

/// Everything that may travel over the host-opened side-channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChannelMessage {
    /// Host → viewer transport change. A viewer-originated one is accepted by the host
    /// but only handed to its sync listener.
    Sync(SyncEvent),
    /// Viewer → host request for a quality tier on that viewer's sender.
    QualityRequest(QualityLevel),
}

impl ChannelMessage {
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(text)?;
        let action = value
            .get("action")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();

        match action.as_str() {
            QUALITY_REQUEST_ACTION => {
                let frame: QualityRequestFrame = serde_json::from_value(value)?;
                Ok(ChannelMessage::QualityRequest(frame.quality))
            }
            "play" | "pause" | "seek" => Ok(ChannelMessage::Sync(serde_json::from_value(value)?)),
            _ => Err(ProtocolError::UnknownAction(action)),
        }
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        let text = match self {
            ChannelMessage::Sync(event) => serde_json::to_string(event)?,
            ChannelMessage::QualityRequest(quality) => serde_json::to_string(&QualityRequestFrame {
                action: QUALITY_REQUEST_ACTION.to_owned(),
                quality: *quality,
            })?,
        };
        Ok(text)
    }
}
