//! Device identity models.

use pinwatch_core::types::DbId;
use serde::Serialize;
use sqlx::FromRow;

/// The identity a device secret resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow, Serialize)]
pub struct DeviceIdentity {
    #[sqlx(rename = "id")]
    pub device_id: DbId,
    pub organization_id: DbId,
}
