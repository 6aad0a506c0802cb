use chrono::{Duration, NaiveDateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::{Channel, DeliveryJob};
use crate::error::{AppError, AppResult};

const JOB_COLUMNS: &str = r#"
    id,
    notification_id,
    channel,
    attempts,
    max_attempts,
    run_at,
    leased_until,
    last_error,
    created_at,
    updated_at
"#;

/// Repository for the durable delayed delivery queue.
///
/// Claiming uses an atomic single-statement UPDATE with a subselect
/// (`UPDATE ... WHERE id = (SELECT id ... LIMIT 1) RETURNING ...`) that takes
/// a time-bounded lease. No long-lived transaction is held, and a worker that
/// crashes mid-attempt simply lets its lease expire, re-exposing the job.
pub struct DeliveryQueueRepository;

impl DeliveryQueueRepository {
    /// Append a job that becomes eligible `delay_ms` from now. Delay 0 means
    /// eligible immediately.
    pub async fn enqueue(
        pool: &SqlitePool,
        notification_id: &str,
        channel: Channel,
        delay_ms: u64,
        max_attempts: u32,
    ) -> AppResult<DeliveryJob> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();
        let run_at = now + Duration::milliseconds(delay_ms as i64);

        let row = sqlx::query_as::<_, DeliveryJob>(&format!(
            r#"
            INSERT INTO delivery_jobs (
                id,
                notification_id,
                channel,
                attempts,
                max_attempts,
                run_at,
                leased_until,
                last_error,
                created_at,
                updated_at
            ) VALUES (?, ?, ?, 0, ?, ?, NULL, NULL, ?, ?)
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(notification_id)
        .bind(channel)
        .bind(max_attempts as i32)
        .bind(run_at)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    /// Claim up to `limit` due jobs, taking a lease of `lease_ms` on each.
    ///
    /// A job is due when its eligibility time has passed and no live lease is
    /// held. Claims happen one statement per job so concurrent workers never
    /// hand the same job to two tasks.
    pub async fn claim_due(
        pool: &SqlitePool,
        limit: i64,
        lease_ms: u64,
    ) -> AppResult<Vec<DeliveryJob>> {
        let mut jobs: Vec<DeliveryJob> = Vec::new();

        for _ in 0..limit.max(0) {
            let now = Utc::now().naive_utc();
            let leased_until = now + Duration::milliseconds(lease_ms as i64);

            let claimed = sqlx::query_as::<_, DeliveryJob>(&format!(
                r#"
                UPDATE delivery_jobs
                SET leased_until = ?, updated_at = ?
                WHERE id = (
                    SELECT id FROM delivery_jobs
                    WHERE run_at <= ?
                      AND (leased_until IS NULL OR leased_until <= ?)
                    ORDER BY run_at ASC
                    LIMIT 1
                )
                RETURNING {JOB_COLUMNS}
                "#
            ))
            .bind(leased_until)
            .bind(now)
            .bind(now)
            .bind(now)
            .fetch_optional(pool)
            .await
            .map_err(AppError::Database)?;

            match claimed {
                Some(job) => jobs.push(job),
                None => break,
            }
        }

        Ok(jobs)
    }

    /// Record a failed attempt and release the job back to the queue with a
    /// new eligibility time. Returns the updated job row.
    pub async fn register_attempt(
        pool: &SqlitePool,
        id: &str,
        next_run_at: NaiveDateTime,
        last_error: Option<String>,
    ) -> AppResult<DeliveryJob> {
        let now = Utc::now().naive_utc();
        let row = sqlx::query_as::<_, DeliveryJob>(&format!(
            r#"
            UPDATE delivery_jobs
            SET
                attempts = attempts + 1,
                run_at = ?,
                leased_until = NULL,
                last_error = ?,
                updated_at = ?
            WHERE id = ?
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(next_run_at)
        .bind(last_error)
        .bind(now)
        .bind(id)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    /// Remove a job permanently (terminal success, exhausted retries, or a
    /// notification that vanished mid-delivery).
    pub async fn remove(pool: &SqlitePool, id: &str) -> AppResult<()> {
        sqlx::query("DELETE FROM delivery_jobs WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(())
    }

    /// Fetch a job by id.
    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Option<DeliveryJob>> {
        let row = sqlx::query_as::<_, DeliveryJob>(&format!(
            "SELECT {JOB_COLUMNS} FROM delivery_jobs WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    /// All outstanding jobs for one notification.
    pub async fn find_by_notification(
        pool: &SqlitePool,
        notification_id: &str,
    ) -> AppResult<Vec<DeliveryJob>> {
        let rows = sqlx::query_as::<_, DeliveryJob>(&format!(
            "SELECT {JOB_COLUMNS} FROM delivery_jobs WHERE notification_id = ? ORDER BY created_at"
        ))
        .bind(notification_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(rows)
    }
}
