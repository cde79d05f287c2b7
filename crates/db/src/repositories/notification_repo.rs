//! Repository for the `inbox_notifications` table.

use pinwatch_core::types::DbId;
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::models::notification::{InboxNotification, NewInboxNotification};

/// Column list for `inbox_notifications` queries.
const COLUMNS: &str = "id, user_id, subject, message, type, created_at";

/// Provides insert and read operations for inbox notifications.
pub struct NotificationRepo;

impl NotificationRepo {
    /// Insert one notification per recipient in a single statement.
    pub async fn insert_batch(
        pool: &PgPool,
        notifications: &[NewInboxNotification],
    ) -> Result<u64, sqlx::Error> {
        if notifications.is_empty() {
            return Ok(0);
        }

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO inbox_notifications (user_id, subject, message, type, created_at) ",
        );
        builder.push_values(notifications, |mut row, n| {
            row.push_bind(n.user_id)
                .push_bind(&n.subject)
                .push_bind(&n.message)
                .push_bind(&n.notification_type)
                .push_bind(n.created_at);
        });

        let result = builder.build().execute(pool).await?;
        Ok(result.rows_affected())
    }

    /// List a user's notifications, newest first.
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: DbId,
        limit: i64,
    ) -> Result<Vec<InboxNotification>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM inbox_notifications \
             WHERE user_id = $1 \
             ORDER BY created_at DESC, id DESC \
             LIMIT $2"
        );
        sqlx::query_as::<_, InboxNotification>(&query)
            .bind(user_id)
            .bind(limit)
            .fetch_all(pool)
            .await
    }
}
