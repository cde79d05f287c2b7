//! Threshold rule models.

use pinwatch_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `threshold_rules` table.
///
/// `comparator` holds the ASCII symbol; parse it with
/// [`pinwatch_core::thresholds::Comparator`].
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct ThresholdRule {
    pub id: DbId,
    pub device_id: DbId,
    pub pin: String,
    pub subject: String,
    pub message: String,
    pub comparator: String,
    pub threshold: f64,
    pub is_active: bool,
    pub last_triggered: bool,
    pub last_triggered_at: Option<Timestamp>,
}

/// DTO for inserting a rule. Rules are normally managed by the CRUD service;
/// this exists for seeding and tests.
#[derive(Debug, Clone)]
pub struct CreateThresholdRule {
    pub device_id: DbId,
    pub pin: String,
    pub subject: String,
    pub message: String,
    pub comparator: String,
    pub threshold: f64,
}
