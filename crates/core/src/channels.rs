//! Well-known notification type and real-time message constants.
//!
//! These must match the values stored in `inbox_notifications.type` and the
//! message discriminators of the real-time WebSocket protocol.

/// Inbox notification type written for threshold rule alerts.
pub const NOTIFICATION_TYPE_ALERT: &str = "alert";

/// Client-to-server real-time message type for topic subscriptions.
pub const MSG_TYPE_SUBSCRIBE: &str = "subscribe";
