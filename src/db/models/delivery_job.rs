use chrono::NaiveDateTime;
use sqlx::FromRow;

use super::notification::Channel;

/// A queued delivery attempt for one notification over one channel.
///
/// Jobs are ephemeral: the row exists only while delivery is outstanding and
/// is deleted on terminal success or once retries are exhausted. `run_at` is
/// the eligibility time ("no earlier than"); `leased_until` is the worker's
/// time-bounded claim preventing concurrent duplicate attempts.
#[derive(Debug, Clone, FromRow)]
pub struct DeliveryJob {
    /// Primary key (UUID)
    pub id: String,

    /// The notification this job delivers. The worker reloads it before each
    /// attempt; a missing or already-SENT record drops the job.
    pub notification_id: String,

    /// Channel to deliver over (SMS or EMAIL; IN_APP is delivered inline).
    pub channel: Channel,

    /// Attempts already made.
    pub attempts: i32,

    /// Total attempts permitted before the notification is marked FAILED.
    pub max_attempts: i32,

    /// Timestamp at or after which the job is eligible to run.
    pub run_at: NaiveDateTime,

    /// Lease expiry held by a claiming worker, if any.
    pub leased_until: Option<NaiveDateTime>,

    /// Last error observed when an attempt failed.
    pub last_error: Option<String>,

    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}
