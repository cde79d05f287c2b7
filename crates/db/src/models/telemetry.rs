//! Telemetry sample models (append-only time-series).

use pinwatch_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `telemetry_samples` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TelemetrySample {
    pub id: DbId,
    pub device_id: DbId,
    pub pin: String,
    pub value: f64,
    pub recorded_at: Timestamp,
}

/// DTO for inserting one sample. All samples of a message share `recorded_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTelemetrySample {
    pub device_id: DbId,
    pub pin: String,
    pub value: f64,
    pub recorded_at: Timestamp,
}
