use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};

use crate::ws::manager::WsManager;
use crate::ws::protocol::parse_subscribe;

/// HTTP handler that upgrades the connection to WebSocket.
///
/// After the upgrade the connection is registered with `WsManager` and
/// managed by two tasks (sender + receiver).
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(ws_manager): State<Arc<WsManager>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, ws_manager))
}

/// Manage a single real-time connection after upgrade.
///
/// Splits the socket into a sink (outbound) and stream (inbound), then:
///   1. Registers the connection with an empty topic set.
///   2. Spawns a sender task that forwards messages from the manager channel.
///   3. Applies subscribe requests on the current task.
///   4. Removes the connection and its topics on disconnect.
async fn handle_socket(socket: WebSocket, ws_manager: Arc<WsManager>) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(conn_id = %conn_id, "WebSocket connected");

    let mut rx = ws_manager.add(conn_id.clone());

    let (mut sink, mut stream) = socket.split();

    let sender_conn_id = conn_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if sink.send(msg).await.is_err() {
                tracing::debug!(conn_id = %sender_conn_id, "WebSocket sink closed");
                break;
            }
            if closing {
                break;
            }
        }
    });

    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Text(text)) => handle_text(&ws_manager, &conn_id, text.as_str()),
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                tracing::trace!(conn_id = %conn_id, "Pong received");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    ws_manager.remove(&conn_id);
    send_task.abort();
    tracing::info!(conn_id = %conn_id, "WebSocket disconnected");
}

/// Apply one inbound text frame. Invalid requests are logged and ignored;
/// the client never receives an acknowledgement or error frame.
fn handle_text(ws_manager: &WsManager, conn_id: &str, text: &str) {
    match parse_subscribe(text) {
        Ok(topic) => {
            if ws_manager.subscribe(conn_id, &topic) {
                tracing::debug!(conn_id = %conn_id, topic = %topic, "Subscribed");
            }
        }
        Err(e) => {
            tracing::warn!(conn_id = %conn_id, error = %e, "Ignoring invalid real-time message");
        }
    }
}
