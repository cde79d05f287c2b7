//! Pinwatch domain logic.
//!
//! Everything in this crate is pure (no database or network access) so it
//! can be exercised in isolation by unit tests:
//!
//! - [`thresholds`]: comparator evaluation and edge detection for rules.
//! - [`payload`]: coercion of device payloads into pin samples.
//! - [`topic`]: ingestion and real-time topic parsing.
//! - [`channels`]: well-known notification and message type names.

pub mod channels;
pub mod error;
pub mod payload;
pub mod thresholds;
pub mod topic;
pub mod types;
