//! Topic parsing for both transports.
//!
//! - Ingestion (MQTT): devices publish to `device/<secret>/...`.
//! - Real-time (WebSocket): viewers subscribe to `device-id/<deviceId>/pin/<pin>`.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::CoreError;
use crate::types::DbId;

/// Leading segment of every device ingestion topic.
pub const INGEST_TOPIC_PREFIX: &str = "device";

/// URL-safe token characters allowed in real-time topic segments.
const TOKEN: &str = r"[A-Za-z0-9._~-]+";

static REALTIME_TOPIC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^device-id/({TOKEN})/pin/({TOKEN})$")).expect("valid regex")
});

/// Extract the device secret from an ingestion topic.
///
/// The topic must be `device/<secret>` optionally followed by further
/// segments, which are ignored. The secret is returned byte-for-byte.
///
/// ```
/// use pinwatch_core::topic::parse_ingest_topic;
///
/// assert_eq!(parse_ingest_topic("device/s3cr3t/telemetry").unwrap(), "s3cr3t");
/// ```
pub fn parse_ingest_topic(topic: &str) -> Result<&str, CoreError> {
    let mut parts = topic.split('/');

    if parts.next() != Some(INGEST_TOPIC_PREFIX) {
        return Err(CoreError::Validation(format!(
            "Invalid ingest topic '{topic}': expected 'device/<secret>/...'"
        )));
    }

    match parts.next() {
        Some(secret) if !secret.is_empty() => Ok(secret),
        _ => Err(CoreError::Validation(format!(
            "Device secret cannot be empty in topic '{topic}'"
        ))),
    }
}

/// A real-time broadcast channel for one `(device, pin)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RealtimeTopic {
    pub device_id: String,
    pub pin: String,
}

impl RealtimeTopic {
    /// Topic for a persisted sample of `pin` on `device_id`.
    pub fn for_sample(device_id: DbId, pin: &str) -> Self {
        Self {
            device_id: device_id.to_string(),
            pin: pin.to_string(),
        }
    }

    /// Validate and split a subscription topic string.
    pub fn parse(topic: &str) -> Result<Self, CoreError> {
        let caps = REALTIME_TOPIC_RE.captures(topic).ok_or_else(|| {
            CoreError::Validation(format!(
                "Invalid topic '{topic}': expected 'device-id/<deviceId>/pin/<pin>'"
            ))
        })?;
        Ok(Self {
            device_id: caps[1].to_string(),
            pin: caps[2].to_string(),
        })
    }
}

impl fmt::Display for RealtimeTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "device-id/{}/pin/{}", self.device_id, self.pin)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
