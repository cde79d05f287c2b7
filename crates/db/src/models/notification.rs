//! Inbox notification models.

use pinwatch_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `inbox_notifications` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct InboxNotification {
    pub id: DbId,
    pub user_id: DbId,
    pub subject: String,
    pub message: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub notification_type: String,
    pub created_at: Timestamp,
}

/// DTO for inserting an inbox notification.
#[derive(Debug, Clone, PartialEq)]
pub struct NewInboxNotification {
    pub user_id: DbId,
    pub subject: String,
    pub message: String,
    pub notification_type: String,
    pub created_at: Timestamp,
}
