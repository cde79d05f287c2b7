//! Repository for the `threshold_rules` table.

use pinwatch_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::threshold_rule::{CreateThresholdRule, ThresholdRule};

/// Column list for `threshold_rules` SELECT queries.
const COLUMNS: &str = "\
    id, device_id, pin, subject, message, comparator, threshold, \
    is_active, last_triggered, last_triggered_at";

/// Provides rule lookup and edge-state updates.
pub struct ThresholdRuleRepo;

impl ThresholdRuleRepo {
    /// Load every active rule watching `pin` on `device_id`.
    pub async fn list_active_for(
        pool: &PgPool,
        device_id: DbId,
        pin: &str,
    ) -> Result<Vec<ThresholdRule>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM threshold_rules \
             WHERE device_id = $1 AND pin = $2 AND is_active = true \
             ORDER BY id"
        );
        sqlx::query_as::<_, ThresholdRule>(&query)
            .bind(device_id)
            .bind(pin)
            .fetch_all(pool)
            .await
    }

    /// Flip a rule's edge state to `last_triggered`.
    ///
    /// The update only applies when the stored flag differs, so of several
    /// concurrent writers observing the same edge exactly one gets `true`.
    /// Returns `false` when the rule is gone or already in that state.
    ///
    /// `last_triggered_at` is only overwritten when a value is given, so a
    /// falling edge keeps the timestamp of the last rising edge.
    pub async fn update_edge_state(
        pool: &PgPool,
        rule_id: DbId,
        last_triggered: bool,
        last_triggered_at: Option<Timestamp>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE threshold_rules \
             SET last_triggered = $2, \
                 last_triggered_at = COALESCE($3, last_triggered_at), \
                 updated_at = NOW() \
             WHERE id = $1 AND last_triggered <> $2",
        )
        .bind(rule_id)
        .bind(last_triggered)
        .bind(last_triggered_at)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Find a rule by ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<ThresholdRule>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM threshold_rules WHERE id = $1");
        sqlx::query_as::<_, ThresholdRule>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Insert a rule, returning the stored row.
    ///
    /// Rules are normally managed by the CRUD service; this is used for
    /// seeding and tests.
    pub async fn create(
        pool: &PgPool,
        input: &CreateThresholdRule,
    ) -> Result<ThresholdRule, sqlx::Error> {
        let query = format!(
            "INSERT INTO threshold_rules (device_id, pin, subject, message, comparator, threshold) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ThresholdRule>(&query)
            .bind(input.device_id)
            .bind(&input.pin)
            .bind(&input.subject)
            .bind(&input.message)
            .bind(&input.comparator)
            .bind(input.threshold)
            .fetch_one(pool)
            .await
    }

    /// Toggle whether a rule is evaluated.
    pub async fn set_active(pool: &PgPool, id: DbId, is_active: bool) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE threshold_rules SET is_active = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(is_active)
            .execute(pool)
            .await?;
        Ok(())
    }
}
