//! Outbound alert delivery.
//!
//! - [`PushSender`]: the seam the notification dispatcher calls.
//! - [`PushGatewayClient`]: HTTP push provider client authenticated with a
//!   cached, periodically exchanged bearer credential.
//! - [`TokenCache`]: the shared credential cache.

pub mod delivery;

pub use delivery::credentials::{
    BearerCredential, CredentialExchange, ServiceAccountExchange, TokenCache,
};
pub use delivery::push::{PushConfig, PushData, PushError, PushGatewayClient, PushSender};
