//! Storage seam used by the ingestion pipeline.
//!
//! [`TelemetryStore`] groups every collaborator read and write the pipeline
//! needs. [`PgTelemetryStore`] implements it over the PostgreSQL repositories;
//! tests substitute an in-memory implementation.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use pinwatch_core::types::{DbId, Timestamp};
use pinwatch_db::models::device::DeviceIdentity;
use pinwatch_db::models::notification::NewInboxNotification;
use pinwatch_db::models::telemetry::NewTelemetrySample;
use pinwatch_db::models::threshold_rule::ThresholdRule;
use pinwatch_db::repositories::{
    DeviceRepo, MembershipRepo, NotificationRepo, TelemetryRepo, ThresholdRuleRepo,
};
use pinwatch_db::DbPool;

/// Reads and writes performed while handling one device message.
#[async_trait]
pub trait TelemetryStore: Send + Sync {
    /// Map a device secret to its identity, `None` if unknown.
    async fn resolve_device_by_secret(
        &self,
        secret: &str,
    ) -> Result<Option<DeviceIdentity>, sqlx::Error>;

    /// Append one message's samples as a single batch.
    async fn append_telemetry(&self, samples: &[NewTelemetrySample]) -> Result<u64, sqlx::Error>;

    /// Active rules watching `pin` on `device_id`.
    async fn active_rules_for(
        &self,
        device_id: DbId,
        pin: &str,
    ) -> Result<Vec<ThresholdRule>, sqlx::Error>;

    /// Flip a rule's edge flag to `last_triggered` if it is not already set
    /// that way. Returns whether this call applied the transition.
    /// `last_triggered_at` is left untouched when `None`.
    async fn update_rule_edge_state(
        &self,
        rule_id: DbId,
        last_triggered: bool,
        last_triggered_at: Option<Timestamp>,
    ) -> Result<bool, sqlx::Error>;

    /// User IDs of accepted members of an organization.
    async fn accepted_members_of(&self, organization_id: DbId) -> Result<Vec<DbId>, sqlx::Error>;

    /// Insert inbox notifications as a single batch.
    async fn insert_inbox_notifications(
        &self,
        notifications: &[NewInboxNotification],
    ) -> Result<u64, sqlx::Error>;
}

/// [`TelemetryStore`] backed by PostgreSQL.
#[derive(Clone)]
pub struct PgTelemetryStore {
    pool: DbPool,
}

impl PgTelemetryStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TelemetryStore for PgTelemetryStore {
    async fn resolve_device_by_secret(
        &self,
        secret: &str,
    ) -> Result<Option<DeviceIdentity>, sqlx::Error> {
        DeviceRepo::find_by_secret(&self.pool, secret).await
    }

    async fn append_telemetry(&self, samples: &[NewTelemetrySample]) -> Result<u64, sqlx::Error> {
        TelemetryRepo::insert_batch(&self.pool, samples).await
    }

    async fn active_rules_for(
        &self,
        device_id: DbId,
        pin: &str,
    ) -> Result<Vec<ThresholdRule>, sqlx::Error> {
        ThresholdRuleRepo::list_active_for(&self.pool, device_id, pin).await
    }

    async fn update_rule_edge_state(
        &self,
        rule_id: DbId,
        last_triggered: bool,
        last_triggered_at: Option<Timestamp>,
    ) -> Result<bool, sqlx::Error> {
        ThresholdRuleRepo::update_edge_state(&self.pool, rule_id, last_triggered, last_triggered_at)
            .await
    }

    async fn accepted_members_of(&self, organization_id: DbId) -> Result<Vec<DbId>, sqlx::Error> {
        MembershipRepo::accepted_user_ids(&self.pool, organization_id).await
    }

    async fn insert_inbox_notifications(
        &self,
        notifications: &[NewInboxNotification],
    ) -> Result<u64, sqlx::Error> {
        NotificationRepo::insert_batch(&self.pool, notifications).await
    }
}

// ---------------------------------------------------------------------------
// RetryPolicy
// ---------------------------------------------------------------------------

/// Fixed-delay retry for storage writes.
///
/// `retries = 0` performs the write exactly once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first failure.
    pub retries: u32,
    /// Delay between attempts.
    pub delay: Duration,
}

impl RetryPolicy {
    /// Run `op` until it succeeds or the retries are exhausted.
    ///
    /// Returns the last error when every attempt fails.
    pub async fn run<T, F, Fut>(&self, operation: &'static str, mut op: F) -> Result<T, sqlx::Error>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, sqlx::Error>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.retries => {
                    attempt += 1;
                    tracing::warn!(
                        operation,
                        attempt,
                        max_retries = self.retries,
                        error = %e,
                        "Storage write failed, retrying"
                    );
                    tokio::time::sleep(self.delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
