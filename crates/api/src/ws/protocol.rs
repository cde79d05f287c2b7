//! Real-time wire messages.
//!
//! Client → server: `{"type":"subscribe","topic":"device-id/<deviceId>/pin/<pin>"}`.
//! Server → client: `{"deviceId":"...","pin":"...","value":<number>,"time":"<ISO-8601>"}`.

use chrono::SecondsFormat;
use pinwatch_core::channels::MSG_TYPE_SUBSCRIBE;
use pinwatch_core::topic::RealtimeTopic;
use pinwatch_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};

/// A message sent by a viewer over the real-time socket.
#[derive(Debug, Deserialize)]
pub struct ClientMessage {
    #[serde(rename = "type")]
    pub msg_type: String,
    #[serde(default)]
    pub topic: Option<String>,
}

/// Why an inbound frame did not produce a subscription.
#[derive(Debug, thiserror::Error)]
pub enum ClientMessageError {
    #[error("Malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Unsupported message type '{0}'")]
    UnsupportedType(String),

    #[error("Subscribe message has no topic")]
    MissingTopic,

    #[error(transparent)]
    InvalidTopic(#[from] pinwatch_core::error::CoreError),
}

/// Parse a text frame into the topic it subscribes to.
pub fn parse_subscribe(text: &str) -> Result<RealtimeTopic, ClientMessageError> {
    let msg: ClientMessage = serde_json::from_str(text)?;
    if msg.msg_type != MSG_TYPE_SUBSCRIBE {
        return Err(ClientMessageError::UnsupportedType(msg.msg_type));
    }
    let topic = msg.topic.ok_or(ClientMessageError::MissingTopic)?;
    Ok(RealtimeTopic::parse(&topic)?)
}

/// Broadcast payload for one persisted pin sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PinUpdate {
    pub device_id: String,
    pub pin: String,
    pub value: f64,
    pub time: String,
}

impl PinUpdate {
    pub fn new(device_id: DbId, pin: &str, value: f64, time: Timestamp) -> Self {
        Self {
            device_id: device_id.to_string(),
            pin: pin.to_string(),
            value,
            time: time.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }

    /// The topic subscribers of this update listen on.
    pub fn topic(&self) -> RealtimeTopic {
        RealtimeTopic {
            device_id: self.device_id.clone(),
            pin: self.pin.clone(),
        }
    }
}
