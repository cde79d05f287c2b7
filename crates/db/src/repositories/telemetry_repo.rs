//! Repository for the `telemetry_samples` table (append-only time-series).

use pinwatch_core::types::DbId;
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::models::telemetry::{NewTelemetrySample, TelemetrySample};

/// Column list for `telemetry_samples` SELECT queries.
const COLUMNS: &str = "id, device_id, pin, value, recorded_at";

/// Provides append and read operations for telemetry samples.
pub struct TelemetryRepo;

impl TelemetryRepo {
    /// Batch-insert all samples of one device message.
    ///
    /// Uses a single multi-row INSERT so a message is persisted atomically.
    pub async fn insert_batch(
        pool: &PgPool,
        samples: &[NewTelemetrySample],
    ) -> Result<u64, sqlx::Error> {
        if samples.is_empty() {
            return Ok(0);
        }

        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO telemetry_samples (device_id, pin, value, recorded_at) ");
        builder.push_values(samples, |mut row, sample| {
            row.push_bind(sample.device_id)
                .push_bind(&sample.pin)
                .push_bind(sample.value)
                .push_bind(sample.recorded_at);
        });

        let result = builder.build().execute(pool).await?;
        Ok(result.rows_affected())
    }

    /// List the most recent samples for a device pin, newest first.
    pub async fn list_for_pin(
        pool: &PgPool,
        device_id: DbId,
        pin: &str,
        limit: i64,
    ) -> Result<Vec<TelemetrySample>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM telemetry_samples \
             WHERE device_id = $1 AND pin = $2 \
             ORDER BY recorded_at DESC, id DESC \
             LIMIT $3"
        );
        sqlx::query_as::<_, TelemetrySample>(&query)
            .bind(device_id)
            .bind(pin)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Count all samples recorded for a device.
    pub async fn count_for_device(pool: &PgPool, device_id: DbId) -> Result<i64, sqlx::Error> {
        let count: Option<i64> =
            sqlx::query_scalar("SELECT COUNT(*) FROM telemetry_samples WHERE device_id = $1")
                .bind(device_id)
                .fetch_one(pool)
                .await?;
        Ok(count.unwrap_or(0))
    }
}
