//! Tests for `WsManager`.
//!
//! These exercise the connection registry directly, without HTTP upgrades:
//! add/remove, subscriptions, exact-topic fan-out and shutdown.

use axum::extract::ws::Message;
use pinwatch_api::ws::{PinUpdate, WsManager};
use pinwatch_core::topic::RealtimeTopic;

fn topic(s: &str) -> RealtimeTopic {
    RealtimeTopic::parse(s).unwrap()
}

fn update(device_id: i64, pin: &str, value: f64) -> PinUpdate {
    PinUpdate::new(device_id, pin, value, chrono::Utc::now())
}

// ---------------------------------------------------------------------------
// Test: add/remove adjust the connection count
// ---------------------------------------------------------------------------

#[test]
fn add_and_remove_track_connections() {
    let manager = WsManager::new();
    assert_eq!(manager.connection_count(), 0);

    let _a = manager.add("a".to_string());
    let _b = manager.add("b".to_string());
    assert_eq!(manager.connection_count(), 2);

    manager.remove("a");
    manager.remove("nonexistent");
    assert_eq!(manager.connection_count(), 1);
}

// ---------------------------------------------------------------------------
// Test: subscribe requires a registered connection
// ---------------------------------------------------------------------------

#[test]
fn subscribe_unknown_connection_is_rejected() {
    let manager = WsManager::new();
    assert!(!manager.subscribe("ghost", &topic("device-id/1/pin/V1")));
    assert_eq!(manager.subscription_count(), 0);
}

// ---------------------------------------------------------------------------
// Test: one connection may hold many topics; duplicates collapse
// ---------------------------------------------------------------------------

#[test]
fn connection_holds_multiple_topics() {
    let manager = WsManager::new();
    let _rx = manager.add("a".to_string());

    assert!(manager.subscribe("a", &topic("device-id/1/pin/V1")));
    assert!(manager.subscribe("a", &topic("device-id/1/pin/V2")));
    assert!(manager.subscribe("a", &topic("device-id/1/pin/V1")));

    assert_eq!(manager.subscription_count(), 2);
    assert!(manager.is_subscribed("a", "device-id/1/pin/V1"));
    assert!(manager.is_subscribed("a", "device-id/1/pin/V2"));
    assert!(!manager.is_subscribed("a", "device-id/1/pin/V3"));
}

// ---------------------------------------------------------------------------
// Test: fan-out delivers only on exact topic match
// ---------------------------------------------------------------------------

#[test]
fn fan_out_is_isolated_by_exact_topic() {
    let manager = WsManager::new();
    let mut rx = manager.add("a".to_string());
    manager.subscribe("a", &topic("device-id/1/pin/V1"));

    assert_eq!(manager.broadcast_update(&update(1, "V2", 1.0)), 0);
    assert_eq!(manager.broadcast_update(&update(2, "V1", 1.0)), 0);
    assert_eq!(manager.broadcast_update(&update(11, "V1", 1.0)), 0);
    assert!(rx.try_recv().is_err());

    assert_eq!(manager.broadcast_update(&update(1, "V1", 23.5)), 1);
    let Ok(Message::Text(text)) = rx.try_recv() else {
        panic!("expected a text frame");
    };
    let received: PinUpdate = serde_json::from_str(text.as_str()).unwrap();
    assert_eq!(received.device_id, "1");
    assert_eq!(received.value, 23.5);
}

// ---------------------------------------------------------------------------
// Test: a closed receiver is skipped without affecting others
// ---------------------------------------------------------------------------

#[test]
fn closed_connection_is_skipped() {
    let manager = WsManager::new();
    let dropped = manager.add("gone".to_string());
    let mut live = manager.add("live".to_string());
    manager.subscribe("gone", &topic("device-id/1/pin/V1"));
    manager.subscribe("live", &topic("device-id/1/pin/V1"));
    drop(dropped);

    assert_eq!(manager.broadcast_update(&update(1, "V1", 1.0)), 1);
    assert!(live.try_recv().is_ok());
}

// ---------------------------------------------------------------------------
// Test: remove discards the connection's subscriptions
// ---------------------------------------------------------------------------

#[test]
fn remove_discards_subscriptions() {
    let manager = WsManager::new();
    let _rx = manager.add("a".to_string());
    manager.subscribe("a", &topic("device-id/1/pin/V1"));

    manager.remove("a");

    assert_eq!(manager.subscription_count(), 0);
    assert_eq!(manager.broadcast_update(&update(1, "V1", 1.0)), 0);
}

// ---------------------------------------------------------------------------
// Test: shutdown_all sends Close and clears the registry
// ---------------------------------------------------------------------------

#[test]
fn shutdown_all_closes_every_connection() {
    let manager = WsManager::new();
    let mut a = manager.add("a".to_string());
    let mut b = manager.add("b".to_string());

    manager.shutdown_all();

    assert_eq!(manager.connection_count(), 0);
    assert!(matches!(a.try_recv(), Ok(Message::Close(None))));
    assert!(matches!(b.try_recv(), Ok(Message::Close(None))));
}

// ---------------------------------------------------------------------------
// Test: ping_all sends a Ping to every connection
// ---------------------------------------------------------------------------

#[test]
fn ping_all_pings_every_connection() {
    let manager = WsManager::new();
    let mut a = manager.add("a".to_string());

    manager.ping_all();

    assert!(matches!(a.try_recv(), Ok(Message::Ping(_))));
}
