//! Telemetry ingestion, real-time fan-out and threshold alerting service.
//!
//! Devices publish flat pin/value JSON over MQTT. Each message is resolved to
//! a device, persisted, broadcast to real-time WebSocket subscribers and
//! evaluated against the device's threshold rules; rising edges notify the
//! organization's members through their inbox and push.

pub mod alerts;
pub mod config;
pub mod error;
pub mod ingest;
pub mod notifications;
pub mod router;
pub mod routes;
pub mod state;
pub mod store;
pub mod ws;
