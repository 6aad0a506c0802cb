use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

use crate::config::DeliveryConfig;
use crate::db::models::{
    Channel, CreateNotification, DeliveryJob, Notification, NotificationStatus, RecipientType,
};
use crate::db::{DeliveryQueueRepository, NotificationRepository};
use crate::error::{AppError, AppResult};
use crate::services::email::{EmailMessage, EmailTransport};
use crate::services::push::PushRegistry;
use crate::services::sms::{SmsMessage, SmsTransport};
use crate::AppState;

/// Options accompanying a creation request.
#[derive(Debug, Clone, Copy, Default)]
pub struct DispatchOptions {
    /// Persist the record but attempt no delivery; the caller schedules it
    /// later via `schedule_notification`.
    pub defer_send: bool,
    /// Delay in milliseconds before an enqueued job becomes eligible.
    pub delay_ms: u64,
}

/// The single seam domain collaborators depend on to emit notifications.
#[async_trait]
pub trait NotificationPort: Send + Sync {
    async fn create_notification(
        &self,
        request: CreateNotification,
        options: DispatchOptions,
    ) -> AppResult<Notification>;

    async fn schedule_notification(
        &self,
        notification_id: &str,
        channel: Channel,
        delay_ms: u64,
    ) -> AppResult<()>;
}

/// Wait before attempt number `attempt + 1`, growing exponentially from the
/// base and capped. `attempt` is the number of attempts already made (>= 1).
pub fn backoff_delay(config: &DeliveryConfig, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1);
    let mut delay = config.base_backoff_ms as u128;
    for _ in 0..exponent {
        delay = delay.saturating_mul(config.backoff_multiplier as u128);
        if delay >= config.max_backoff_ms as u128 {
            return Duration::from_millis(config.max_backoff_ms);
        }
    }
    Duration::from_millis(delay.min(config.max_backoff_ms as u128) as u64)
}

/// Dispatch decision engine and queue-worker logic.
///
/// Creation always persists first (PENDING), then either delivers in-app
/// synchronously, enqueues a delayed job, or returns immediately when the
/// caller defers. Delivery-time failures never propagate to the producing
/// request; the terminal FAILED status on the record is the observable signal.
pub struct NotificationService {
    pool: SqlitePool,
    delivery: DeliveryConfig,
    push: Arc<PushRegistry>,
    sms: Arc<dyn SmsTransport>,
    email: Arc<dyn EmailTransport>,
}

impl NotificationService {
    pub fn new(
        pool: SqlitePool,
        delivery: DeliveryConfig,
        push: Arc<PushRegistry>,
        sms: Arc<dyn SmsTransport>,
        email: Arc<dyn EmailTransport>,
    ) -> Self {
        Self {
            pool,
            delivery,
            push,
            sms,
            email,
        }
    }

    pub fn from_state(state: &Arc<AppState>) -> Self {
        Self::new(
            state.db.clone(),
            state.config.delivery.clone(),
            state.push.clone(),
            state.sms.clone(),
            state.email.clone(),
        )
    }

    fn validate(request: &CreateNotification) -> AppResult<()> {
        if request.recipient_id.trim().is_empty() {
            return Err(AppError::Validation("recipientId is required".to_string()));
        }
        match request.channel {
            Channel::Sms if request.data.phone().is_none() => Err(AppError::Validation(
                "SMS notification requires a phone number in data".to_string(),
            )),
            Channel::Email if request.data.email().is_none() => Err(AppError::Validation(
                "Email notification requires an email address in data".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// Deliver in-app: push to live connections when the recipient is an
    /// employee (patients hold no session), then mark SENT unconditionally.
    /// The durable record is the fallback read surface when nobody is online,
    /// so an attempted in-app delivery counts as sent.
    async fn send_in_app(&self, notification: Notification) -> AppResult<Notification> {
        if notification.recipient_type == RecipientType::Employee {
            self.push
                .emit_to_user(&notification.recipient_id, &notification)
                .await;
        }

        let updated = NotificationRepository::mark_sent(&self.pool, &notification.id).await?;
        Ok(updated.unwrap_or(notification))
    }

    /// Process one claimed delivery job to completion.
    ///
    /// Reloads the notification first: a record deleted by its recipient
    /// drops the job silently ("abort, do not send"), and one already settled
    /// (SENT/READ/FAILED) is a no-op so duplicate jobs can never double-send.
    pub async fn process_due_job(&self, job: DeliveryJob) -> AppResult<()> {
        let notification =
            match NotificationRepository::find_by_id(&self.pool, &job.notification_id).await? {
                Some(n) => n,
                None => {
                    tracing::debug!(
                        job_id = %job.id,
                        notification_id = %job.notification_id,
                        "Notification deleted before delivery, dropping job"
                    );
                    DeliveryQueueRepository::remove(&self.pool, &job.id).await?;
                    return Ok(());
                }
            };

        if notification.status != NotificationStatus::Pending {
            tracing::debug!(
                job_id = %job.id,
                notification_id = %notification.id,
                status = ?notification.status,
                "Notification already settled, dropping job"
            );
            DeliveryQueueRepository::remove(&self.pool, &job.id).await?;
            return Ok(());
        }

        let outcome = tokio::time::timeout(
            Duration::from_millis(self.delivery.send_timeout_ms),
            self.send_over_channel(job.channel, &notification),
        )
        .await
        .unwrap_or_else(|_| {
            Err(AppError::ServiceUnavailable(format!(
                "{} send timed out",
                job.channel.as_str()
            )))
        });

        match outcome {
            Ok(()) => {
                NotificationRepository::mark_sent(&self.pool, &notification.id).await?;
                DeliveryQueueRepository::remove(&self.pool, &job.id).await?;
                tracing::info!(
                    notification_id = %notification.id,
                    channel = job.channel.as_str(),
                    "Notification delivered"
                );
                Ok(())
            }
            Err(e) => self.handle_failed_attempt(&job, &notification, e).await,
        }
    }

    async fn send_over_channel(
        &self,
        channel: Channel,
        notification: &Notification,
    ) -> AppResult<()> {
        match channel {
            Channel::Sms => {
                let phone = notification.data.phone().ok_or_else(|| {
                    AppError::Sms("SMS recipient phone number not provided".to_string())
                })?;
                self.sms
                    .send_sms(&SmsMessage {
                        to: phone.to_string(),
                        message: notification.message.clone(),
                    })
                    .await
            }
            Channel::Email => {
                let email = notification.data.email().ok_or_else(|| {
                    AppError::Email("Email recipient address not provided".to_string())
                })?;
                self.email
                    .send_email(&EmailMessage {
                        to: email.to_string(),
                        subject: notification.title.clone(),
                        text: notification.message.clone(),
                        html: notification
                            .data
                            .contact()
                            .and_then(|c| c.html_body.clone()),
                    })
                    .await
            }
            // In-app delivery happens inline at creation; a queued in-app job
            // can only come from the deferred path.
            Channel::InApp => {
                if notification.recipient_type == RecipientType::Employee {
                    self.push
                        .emit_to_user(&notification.recipient_id, notification)
                        .await;
                }
                Ok(())
            }
        }
    }

    async fn handle_failed_attempt(
        &self,
        job: &DeliveryJob,
        notification: &Notification,
        error: AppError,
    ) -> AppResult<()> {
        let attempts_made = job.attempts + 1;

        if attempts_made >= job.max_attempts {
            NotificationRepository::mark_failed(&self.pool, &notification.id).await?;
            DeliveryQueueRepository::remove(&self.pool, &job.id).await?;
            tracing::warn!(
                notification_id = %notification.id,
                channel = job.channel.as_str(),
                attempts = attempts_made,
                "Delivery failed permanently: {}",
                error
            );
            return Ok(());
        }

        let wait = backoff_delay(&self.delivery, attempts_made as u32);
        let next_run_at = Utc::now().naive_utc() + chrono::Duration::from_std(wait)
            .unwrap_or_else(|_| chrono::Duration::milliseconds(self.delivery.max_backoff_ms as i64));

        DeliveryQueueRepository::register_attempt(
            &self.pool,
            &job.id,
            next_run_at,
            Some(error.to_string()),
        )
        .await?;
        tracing::info!(
            notification_id = %notification.id,
            channel = job.channel.as_str(),
            attempt = attempts_made,
            retry_in_ms = wait.as_millis() as u64,
            "Delivery attempt failed, rescheduled: {}",
            error
        );
        Ok(())
    }
}

#[async_trait]
impl NotificationPort for NotificationService {
    async fn create_notification(
        &self,
        request: CreateNotification,
        options: DispatchOptions,
    ) -> AppResult<Notification> {
        Self::validate(&request)?;

        let channel = request.channel;
        let notification = NotificationRepository::create(&self.pool, request).await?;

        if options.defer_send {
            return Ok(notification);
        }

        match channel {
            Channel::InApp => self.send_in_app(notification).await,
            Channel::Sms | Channel::Email => {
                DeliveryQueueRepository::enqueue(
                    &self.pool,
                    &notification.id,
                    channel,
                    options.delay_ms,
                    self.delivery.max_attempts,
                )
                .await?;
                Ok(notification)
            }
        }
    }

    async fn schedule_notification(
        &self,
        notification_id: &str,
        channel: Channel,
        delay_ms: u64,
    ) -> AppResult<()> {
        DeliveryQueueRepository::enqueue(
            &self.pool,
            notification_id,
            channel,
            delay_ms,
            self.delivery.max_attempts,
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{ContactInfo, NotificationData};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    #[derive(Default)]
    struct FakeSms {
        calls: AtomicUsize,
        fail: AtomicBool,
    }

    #[async_trait]
    impl SmsTransport for FakeSms {
        async fn send_sms(&self, _msg: &SmsMessage) -> AppResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                Err(AppError::Sms("gateway unreachable".to_string()))
            } else {
                Ok(())
            }
        }
    }

    /// Transport that hangs far past any test timeout before succeeding.
    #[derive(Default)]
    struct SlowSms {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SmsTransport for SlowSms {
        async fn send_sms(&self, _msg: &SmsMessage) -> AppResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeEmail {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmailTransport for FakeEmail {
        async fn send_email(&self, _msg: &EmailMessage) -> AppResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Harness {
        pool: SqlitePool,
        service: NotificationService,
        push: Arc<PushRegistry>,
        sms: Arc<FakeSms>,
        email: Arc<FakeEmail>,
    }

    async fn harness() -> Harness {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();

        let push = Arc::new(PushRegistry::new());
        let sms = Arc::new(FakeSms::default());
        let email = Arc::new(FakeEmail::default());
        let service = NotificationService::new(
            pool.clone(),
            crate::config::Config::default().delivery,
            push.clone(),
            sms.clone(),
            email.clone(),
        );
        Harness {
            pool,
            service,
            push,
            sms,
            email,
        }
    }

    fn in_app_request(recipient_id: &str) -> CreateNotification {
        CreateNotification {
            recipient_id: recipient_id.to_string(),
            recipient_type: RecipientType::Employee,
            title: "New appt".to_string(),
            message: "An appointment was booked".to_string(),
            channel: Channel::InApp,
            data: NotificationData::AppointmentCreated {
                appointment_id: "appt-1".to_string(),
                contact: ContactInfo::default(),
            },
        }
    }

    fn sms_request(recipient_id: &str) -> CreateNotification {
        CreateNotification {
            recipient_id: recipient_id.to_string(),
            recipient_type: RecipientType::Patient,
            title: "Payment received".to_string(),
            message: "Thank you for your payment".to_string(),
            channel: Channel::Sms,
            data: NotificationData::PaymentConfirmation {
                invoice_id: "inv-1".to_string(),
                contact: ContactInfo {
                    phone: Some("+254700000001".to_string()),
                    ..Default::default()
                },
            },
        }
    }

    #[tokio::test]
    async fn in_app_create_delivers_synchronously() {
        let h = harness().await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        h.push.register("doc1", "DOCTOR", tx).await;

        let n = h
            .service
            .create_notification(in_app_request("doc1"), DispatchOptions::default())
            .await
            .unwrap();

        assert_eq!(n.status, NotificationStatus::Sent);
        assert!(n.sent_at.is_some());

        let pushed = rx.recv().await.unwrap();
        assert_eq!(pushed.id, n.id);
        assert_eq!(pushed.title, "New appt");
    }

    #[tokio::test]
    async fn in_app_create_without_live_connection_is_still_sent() {
        let h = harness().await;
        let n = h
            .service
            .create_notification(in_app_request("doc1"), DispatchOptions::default())
            .await
            .unwrap();
        assert_eq!(n.status, NotificationStatus::Sent);
    }

    #[tokio::test]
    async fn sms_create_enqueues_exactly_one_immediate_job() {
        let h = harness().await;
        let n = h
            .service
            .create_notification(sms_request("pat1"), DispatchOptions::default())
            .await
            .unwrap();

        assert_eq!(n.status, NotificationStatus::Pending);
        let jobs = DeliveryQueueRepository::find_by_notification(&h.pool, &n.id)
            .await
            .unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].channel, Channel::Sms);
        assert!(jobs[0].run_at <= Utc::now().naive_utc());
        // Not delivered on the request path.
        assert_eq!(h.sms.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn defer_send_skips_the_queue_entirely() {
        let h = harness().await;
        let n = h
            .service
            .create_notification(
                sms_request("pat1"),
                DispatchOptions {
                    defer_send: true,
                    delay_ms: 0,
                },
            )
            .await
            .unwrap();

        assert_eq!(n.status, NotificationStatus::Pending);
        let jobs = DeliveryQueueRepository::find_by_notification(&h.pool, &n.id)
            .await
            .unwrap();
        assert!(jobs.is_empty());
    }

    #[tokio::test]
    async fn deferred_then_scheduled_job_waits_for_eligibility() {
        let h = harness().await;
        let n = h
            .service
            .create_notification(
                sms_request("pat1"),
                DispatchOptions {
                    defer_send: true,
                    delay_ms: 0,
                },
            )
            .await
            .unwrap();

        // 24-hour appointment reminder path.
        h.service
            .schedule_notification(&n.id, Channel::Sms, 86_400_000)
            .await
            .unwrap();

        let claimed = DeliveryQueueRepository::claim_due(&h.pool, 10, 60_000)
            .await
            .unwrap();
        assert!(claimed.is_empty());

        let reloaded = NotificationRepository::find_by_id(&h.pool, &n.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reloaded.status, NotificationStatus::Pending);
    }

    #[tokio::test]
    async fn missing_sms_phone_is_rejected_synchronously() {
        let h = harness().await;
        let mut request = sms_request("pat1");
        request.data = NotificationData::PaymentConfirmation {
            invoice_id: "inv-1".to_string(),
            contact: ContactInfo::default(),
        };

        let err = h
            .service
            .create_notification(request, DispatchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn missing_email_address_is_rejected_synchronously() {
        let h = harness().await;
        let mut request = sms_request("pat1");
        request.channel = Channel::Email;

        let err = h
            .service
            .create_notification(request, DispatchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn queued_job_sends_and_marks_sent() {
        let h = harness().await;
        let n = h
            .service
            .create_notification(sms_request("pat1"), DispatchOptions::default())
            .await
            .unwrap();

        let jobs = DeliveryQueueRepository::claim_due(&h.pool, 1, 60_000)
            .await
            .unwrap();
        h.service.process_due_job(jobs[0].clone()).await.unwrap();

        assert_eq!(h.sms.calls.load(Ordering::SeqCst), 1);
        let sent = NotificationRepository::find_by_id(&h.pool, &n.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sent.status, NotificationStatus::Sent);
        assert!(sent.sent_at.is_some());
        assert!(DeliveryQueueRepository::find_by_notification(&h.pool, &n.id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn job_for_sent_notification_is_a_noop() {
        let h = harness().await;
        let n = h
            .service
            .create_notification(sms_request("pat1"), DispatchOptions::default())
            .await
            .unwrap();
        let first = NotificationRepository::mark_sent(&h.pool, &n.id)
            .await
            .unwrap()
            .unwrap();

        let jobs = DeliveryQueueRepository::claim_due(&h.pool, 1, 60_000)
            .await
            .unwrap();
        h.service.process_due_job(jobs[0].clone()).await.unwrap();

        // Adapter untouched, sent_at unchanged, duplicate job removed.
        assert_eq!(h.sms.calls.load(Ordering::SeqCst), 0);
        let reloaded = NotificationRepository::find_by_id(&h.pool, &n.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reloaded.sent_at, first.sent_at);
        assert!(DeliveryQueueRepository::find_by_notification(&h.pool, &n.id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn deleted_notification_drops_job_silently() {
        let h = harness().await;
        let n = h
            .service
            .create_notification(sms_request("pat1"), DispatchOptions::default())
            .await
            .unwrap();
        let jobs = DeliveryQueueRepository::claim_due(&h.pool, 1, 60_000)
            .await
            .unwrap();

        NotificationRepository::delete(&h.pool, &n.id, "pat1")
            .await
            .unwrap();

        h.service.process_due_job(jobs[0].clone()).await.unwrap();

        assert_eq!(h.sms.calls.load(Ordering::SeqCst), 0);
        // Not resurrected.
        assert!(NotificationRepository::find_by_id(&h.pool, &n.id)
            .await
            .unwrap()
            .is_none());
        assert!(DeliveryQueueRepository::find_by_notification(&h.pool, &n.id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn failing_transport_exhausts_attempts_then_marks_failed() {
        let h = harness().await;
        h.sms.fail.store(true, Ordering::SeqCst);

        let n = h
            .service
            .create_notification(sms_request("pat1"), DispatchOptions::default())
            .await
            .unwrap();

        // Attempt 1: rescheduled with the base backoff.
        let job = DeliveryQueueRepository::claim_due(&h.pool, 1, 60_000)
            .await
            .unwrap()
            .remove(0);
        let job_id = job.id.clone();
        h.service.process_due_job(job).await.unwrap();

        let after_first = DeliveryQueueRepository::find_by_id(&h.pool, &job_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(after_first.attempts, 1);
        assert!(after_first.last_error.is_some());
        let first_wait = after_first.run_at - Utc::now().naive_utc();

        // Attempt 2: backoff strictly increases.
        h.service.process_due_job(after_first.clone()).await.unwrap();
        let after_second = DeliveryQueueRepository::find_by_id(&h.pool, &job_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(after_second.attempts, 2);
        let second_wait = after_second.run_at - Utc::now().naive_utc();
        assert!(second_wait > first_wait);

        // Attempt 3 exhausts the cap: FAILED, job gone, no fourth call.
        h.service.process_due_job(after_second).await.unwrap();

        assert_eq!(h.sms.calls.load(Ordering::SeqCst), 3);
        let failed = NotificationRepository::find_by_id(&h.pool, &n.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(failed.status, NotificationStatus::Failed);
        assert!(DeliveryQueueRepository::find_by_id(&h.pool, &job_id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn hung_transport_times_out_and_counts_as_a_failed_attempt() {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();

        let mut delivery = crate::config::Config::default().delivery;
        delivery.send_timeout_ms = 20;
        delivery.base_backoff_ms = 10;

        let sms = Arc::new(SlowSms::default());
        let service = NotificationService::new(
            pool.clone(),
            delivery,
            Arc::new(PushRegistry::new()),
            sms.clone(),
            Arc::new(FakeEmail::default()),
        );

        let n = service
            .create_notification(sms_request("pat1"), DispatchOptions::default())
            .await
            .unwrap();

        let job = DeliveryQueueRepository::claim_due(&pool, 1, 60_000)
            .await
            .unwrap()
            .remove(0);
        let job_id = job.id.clone();
        service.process_due_job(job).await.unwrap();

        // The worker is released after the timeout; the attempt is recorded
        // as failed with the timeout as its error.
        let after_first = DeliveryQueueRepository::find_by_id(&pool, &job_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(after_first.attempts, 1);
        assert!(after_first
            .last_error
            .as_deref()
            .unwrap()
            .contains("timed out"));

        // Timeouts exhaust the retry budget like any other failure.
        let after_second = {
            service.process_due_job(after_first).await.unwrap();
            DeliveryQueueRepository::find_by_id(&pool, &job_id)
                .await
                .unwrap()
                .unwrap()
        };
        service.process_due_job(after_second).await.unwrap();

        assert_eq!(sms.calls.load(Ordering::SeqCst), 3);
        let failed = NotificationRepository::find_by_id(&pool, &n.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(failed.status, NotificationStatus::Failed);
        assert!(DeliveryQueueRepository::find_by_id(&pool, &job_id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn email_job_uses_the_email_transport() {
        let h = harness().await;
        let n = h
            .service
            .create_notification(
                CreateNotification {
                    recipient_id: "pat2".to_string(),
                    recipient_type: RecipientType::Patient,
                    title: "Lab results ready".to_string(),
                    message: "Your results are available".to_string(),
                    channel: Channel::Email,
                    data: NotificationData::LabResultReady {
                        lab_order_id: "lab-7".to_string(),
                        contact: ContactInfo {
                            email: Some("pat2@example.com".to_string()),
                            ..Default::default()
                        },
                    },
                },
                DispatchOptions::default(),
            )
            .await
            .unwrap();

        let jobs = DeliveryQueueRepository::claim_due(&h.pool, 1, 60_000)
            .await
            .unwrap();
        h.service.process_due_job(jobs[0].clone()).await.unwrap();

        assert_eq!(h.email.calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.sms.calls.load(Ordering::SeqCst), 0);
        let sent = NotificationRepository::find_by_id(&h.pool, &n.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sent.status, NotificationStatus::Sent);
    }

    #[test]
    fn backoff_delays_strictly_increase_until_the_cap() {
        let cfg = crate::config::Config::default().delivery;
        let first = backoff_delay(&cfg, 1);
        let second = backoff_delay(&cfg, 2);
        let third = backoff_delay(&cfg, 3);

        assert_eq!(first, Duration::from_millis(5000));
        assert!(second > first);
        assert!(third > second);
    }

    #[test]
    fn backoff_is_capped() {
        let mut cfg = crate::config::Config::default().delivery;
        cfg.max_backoff_ms = 20_000;
        assert_eq!(backoff_delay(&cfg, 10), Duration::from_millis(20_000));
    }
}
