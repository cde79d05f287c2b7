use std::collections::HashSet;

use axum::body::Bytes;
use axum::extract::ws::Message;
use dashmap::DashMap;
use pinwatch_core::topic::RealtimeTopic;
use tokio::sync::mpsc;

use crate::ws::protocol::PinUpdate;

/// Channel sender half for pushing messages to a WebSocket connection.
pub type WsSender = mpsc::UnboundedSender<Message>;

/// State for a single real-time connection.
pub struct WsConnection {
    /// Channel sender for outbound messages to this connection.
    pub sender: WsSender,
    /// Exact topic strings this connection subscribed to.
    pub topics: HashSet<String>,
}

/// Registry of live real-time connections and their topic subscriptions.
///
/// Backed by a sharded [`DashMap`], so connect/disconnect only lock one shard
/// and broadcasts iterate without a global lock. The WebSocket handler owns
/// connection lifecycle (`add`/`remove`); the ingestion pipeline only calls
/// [`publish`](Self::publish).
pub struct WsManager {
    connections: DashMap<String, WsConnection>,
}

impl WsManager {
    /// Create a new, empty connection manager.
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    /// Register a new connection with an empty topic set.
    ///
    /// Returns the receiver half of the message channel so the caller can
    /// forward messages to the WebSocket sink. Re-adding an existing ID
    /// replaces the previous connection.
    pub fn add(&self, conn_id: String) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = WsConnection {
            sender: tx,
            topics: HashSet::new(),
        };
        self.connections.insert(conn_id, conn);
        rx
    }

    /// Remove a connection and its subscriptions.
    pub fn remove(&self, conn_id: &str) {
        self.connections.remove(conn_id);
    }

    /// Add `topic` to a connection's subscriptions.
    ///
    /// Returns `false` if the connection is not registered.
    pub fn subscribe(&self, conn_id: &str, topic: &RealtimeTopic) -> bool {
        match self.connections.get_mut(conn_id) {
            Some(mut conn) => {
                conn.topics.insert(topic.to_string());
                true
            }
            None => false,
        }
    }

    /// Whether a connection holds an exact subscription to `topic`.
    pub fn is_subscribed(&self, conn_id: &str, topic: &str) -> bool {
        self.connections
            .get(conn_id)
            .is_some_and(|conn| conn.topics.contains(topic))
    }

    /// Send `message` to every connection subscribed to exactly `topic`.
    ///
    /// Connections whose send channels are closed are silently skipped.
    /// Returns the number of connections the message was handed to.
    pub fn publish(&self, topic: &str, message: Message) -> usize {
        let mut delivered = 0;
        for conn in self.connections.iter() {
            if conn.topics.contains(topic) && conn.sender.send(message.clone()).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    /// Broadcast a persisted pin sample to its topic's subscribers.
    pub fn broadcast_update(&self, update: &PinUpdate) -> usize {
        let topic = update.topic().to_string();
        let payload = match serde_json::to_string(update) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(error = %e, topic = %topic, "Failed to serialize pin update");
                return 0;
            }
        };
        self.publish(&topic, Message::Text(payload.into()))
    }

    /// Return the current number of active connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Total number of topic subscriptions across all connections.
    pub fn subscription_count(&self) -> usize {
        self.connections.iter().map(|conn| conn.topics.len()).sum()
    }

    /// Send a Close frame to every connection, then clear the registry.
    ///
    /// Used during graceful shutdown to notify all clients before the
    /// server stops.
    pub fn shutdown_all(&self) {
        let count = self.connections.len();
        for conn in self.connections.iter() {
            let _ = conn.sender.send(Message::Close(None));
        }
        self.connections.clear();
        tracing::info!(count, "Closed all WebSocket connections");
    }

    /// Send a Ping frame to every connected client.
    pub fn ping_all(&self) {
        for conn in self.connections.iter() {
            let _ = conn.sender.send(Message::Ping(Bytes::new()));
        }
    }
}

impl Default for WsManager {
    fn default() -> Self {
        Self::new()
    }
}
