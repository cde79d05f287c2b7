//! Real-time fan-out over WebSocket.
//!
//! Viewers connect on the dedicated real-time port, subscribe to
//! `device-id/<deviceId>/pin/<pin>` topics and receive every persisted sample
//! for those pins.

mod handler;
mod heartbeat;
pub mod manager;
pub mod protocol;

pub use handler::ws_handler;
pub use heartbeat::start_heartbeat;
pub use manager::WsManager;
pub use protocol::PinUpdate;
