use chrono::Utc;
use sqlx::types::Json;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::{CreateNotification, Notification};
use crate::error::{AppError, AppResult};

const NOTIFICATION_COLUMNS: &str = r#"
    id,
    recipient_id,
    recipient_type,
    notification_type,
    title,
    message,
    channel,
    data,
    status,
    created_at,
    sent_at,
    read_at
"#;

/// Repository for the notification store.
///
/// State transitions are expressed as conditional single-statement updates so
/// a worker marking SENT and a recipient deleting or reading concurrently can
/// never produce a lost update: whichever statement matches first wins, the
/// other matches zero rows.
pub struct NotificationRepository;

impl NotificationRepository {
    /// Persist a new notification with status PENDING.
    pub async fn create(pool: &SqlitePool, input: CreateNotification) -> AppResult<Notification> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        let row = sqlx::query_as::<_, Notification>(&format!(
            r#"
            INSERT INTO notifications (
                id,
                recipient_id,
                recipient_type,
                notification_type,
                title,
                message,
                channel,
                data,
                status,
                created_at,
                sent_at,
                read_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, 'PENDING', ?, NULL, NULL)
            RETURNING {NOTIFICATION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&input.recipient_id)
        .bind(input.recipient_type)
        .bind(input.data.notification_type())
        .bind(&input.title)
        .bind(&input.message)
        .bind(input.channel)
        .bind(Json(&input.data))
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Option<Notification>> {
        let row = sqlx::query_as::<_, Notification>(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    /// Page through a recipient's notifications, newest first. Ordering is
    /// stable across calls (id breaks creation-time ties).
    pub async fn list_for_recipient(
        pool: &SqlitePool,
        recipient_id: &str,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<Notification>> {
        let rows = sqlx::query_as::<_, Notification>(&format!(
            r#"
            SELECT {NOTIFICATION_COLUMNS}
            FROM notifications
            WHERE recipient_id = ?
            ORDER BY created_at DESC, id DESC
            LIMIT ? OFFSET ?
            "#
        ))
        .bind(recipient_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(rows)
    }

    /// Count of PENDING notifications for a recipient.
    pub async fn unread_count(pool: &SqlitePool, recipient_id: &str) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE recipient_id = ? AND status = 'PENDING'",
        )
        .bind(recipient_id)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(count)
    }

    /// Transition PENDING -> SENT and stamp `sent_at`. Returns None when the
    /// record is gone or no longer PENDING, which callers treat as "someone
    /// else already settled this notification".
    pub async fn mark_sent(pool: &SqlitePool, id: &str) -> AppResult<Option<Notification>> {
        let now = Utc::now().naive_utc();
        let row = sqlx::query_as::<_, Notification>(&format!(
            r#"
            UPDATE notifications
            SET status = 'SENT', sent_at = ?
            WHERE id = ? AND status = 'PENDING'
            RETURNING {NOTIFICATION_COLUMNS}
            "#
        ))
        .bind(now)
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    /// Transition PENDING -> FAILED after retries are exhausted. FAILED is
    /// terminal; a retried business action needs a fresh notification.
    pub async fn mark_failed(pool: &SqlitePool, id: &str) -> AppResult<Option<Notification>> {
        let row = sqlx::query_as::<_, Notification>(&format!(
            r#"
            UPDATE notifications
            SET status = 'FAILED'
            WHERE id = ? AND status = 'PENDING'
            RETURNING {NOTIFICATION_COLUMNS}
            "#
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    /// Mark one notification READ, scoped to its owning recipient. The
    /// recipient filter is the authorization check: a foreign id matches
    /// nothing. Returns None when no PENDING/SENT row matched.
    pub async fn mark_read(
        pool: &SqlitePool,
        id: &str,
        recipient_id: &str,
    ) -> AppResult<Option<Notification>> {
        let now = Utc::now().naive_utc();
        let row = sqlx::query_as::<_, Notification>(&format!(
            r#"
            UPDATE notifications
            SET status = 'READ', read_at = ?
            WHERE id = ? AND recipient_id = ? AND status IN ('PENDING', 'SENT')
            RETURNING {NOTIFICATION_COLUMNS}
            "#
        ))
        .bind(now)
        .bind(id)
        .bind(recipient_id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    /// Bulk transition of every PENDING/SENT notification owned by the
    /// recipient to READ. Returns the number of rows updated.
    pub async fn mark_all_read(pool: &SqlitePool, recipient_id: &str) -> AppResult<u64> {
        let now = Utc::now().naive_utc();
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET status = 'READ', read_at = ?
            WHERE recipient_id = ? AND status IN ('PENDING', 'SENT')
            "#,
        )
        .bind(now)
        .bind(recipient_id)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(result.rows_affected())
    }

    /// Delete a notification, scoped to its owning recipient. Returns the
    /// number of rows removed (0 when the id was foreign or unknown).
    pub async fn delete(pool: &SqlitePool, id: &str, recipient_id: &str) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = ? AND recipient_id = ?")
            .bind(id)
            .bind(recipient_id)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(result.rows_affected())
    }
}
