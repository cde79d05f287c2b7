//! External delivery channels for alert notifications.

pub mod credentials;
pub mod push;
