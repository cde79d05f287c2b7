//! Repository for the `devices` table.

use pinwatch_core::types::DbId;
use sqlx::PgPool;

use crate::models::device::DeviceIdentity;

/// Resolves device secrets to identities.
pub struct DeviceRepo;

impl DeviceRepo {
    /// Look up the device addressed by an inbound message secret.
    pub async fn find_by_secret(
        pool: &PgPool,
        secret: &str,
    ) -> Result<Option<DeviceIdentity>, sqlx::Error> {
        sqlx::query_as::<_, DeviceIdentity>(
            "SELECT id, organization_id FROM devices WHERE secret = $1",
        )
        .bind(secret)
        .fetch_optional(pool)
        .await
    }

    /// Provision a device, returning its ID.
    ///
    /// Devices are provisioned by the registry service; this is used for
    /// seeding and tests.
    pub async fn create(
        pool: &PgPool,
        organization_id: DbId,
        secret: &str,
    ) -> Result<DbId, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO devices (organization_id, secret) VALUES ($1, $2) RETURNING id",
        )
        .bind(organization_id)
        .bind(secret)
        .fetch_one(pool)
        .await
    }
}
