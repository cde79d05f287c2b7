use std::sync::Arc;
use std::time::Duration;

use crate::ws::manager::WsManager;

/// Interval between heartbeat pings (in seconds).
const HEARTBEAT_INTERVAL_SECS: u64 = 30;

/// Spawn a background task that sends periodic Ping frames to all real-time
/// connections.
///
/// The task runs until aborted via the returned `JoinHandle` during shutdown.
pub fn start_heartbeat(ws_manager: Arc<WsManager>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(HEARTBEAT_INTERVAL_SECS));

        loop {
            interval.tick().await;
            tracing::debug!(
                connections = ws_manager.connection_count(),
                subscriptions = ws_manager.subscription_count(),
                "WebSocket heartbeat ping"
            );
            ws_manager.ping_all();
        }
    })
}
