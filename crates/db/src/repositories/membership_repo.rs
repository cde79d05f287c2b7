//! Repository for the `organization_memberships` table.

use pinwatch_core::types::DbId;
use sqlx::PgPool;

use crate::models::membership::MEMBERSHIP_ACCEPTED;

/// Resolves alert recipients from organization memberships.
pub struct MembershipRepo;

impl MembershipRepo {
    /// User IDs of every accepted member of an organization.
    pub async fn accepted_user_ids(
        pool: &PgPool,
        organization_id: DbId,
    ) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT user_id FROM organization_memberships \
             WHERE organization_id = $1 AND status = $2 \
             ORDER BY user_id",
        )
        .bind(organization_id)
        .bind(MEMBERSHIP_ACCEPTED)
        .fetch_all(pool)
        .await
    }

    /// Insert a membership row. Used for seeding and tests.
    pub async fn create(
        pool: &PgPool,
        user_id: DbId,
        organization_id: DbId,
        status: &str,
    ) -> Result<DbId, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO organization_memberships (user_id, organization_id, status) \
             VALUES ($1, $2, $3) \
             RETURNING id",
        )
        .bind(user_id)
        .bind(organization_id)
        .bind(status)
        .fetch_one(pool)
        .await
    }
}
