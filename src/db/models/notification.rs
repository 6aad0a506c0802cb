use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

/// Delivery medium for a notification. Fixed at creation; a request that must
/// reach several channels is represented as several notification records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Channel {
    InApp,
    Sms,
    Email,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::InApp => "IN_APP",
            Channel::Sms => "SMS",
            Channel::Email => "EMAIL",
        }
    }
}

/// Who a notification is addressed to. Only employees hold live push sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecipientType {
    Employee,
    Patient,
}

/// Closed set of domain events that produce notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    AppointmentCreated,
    AppointmentCancelled,
    AppointmentReminder,
    PaymentConfirmation,
    PrescriptionReady,
    LabResultReady,
    LowStockAlert,
}

/// Lifecycle status. READ and FAILED are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationStatus {
    Pending,
    Sent,
    Read,
    Failed,
}

/// Channel addressing shared across event payloads. `phone` is required for
/// SMS delivery and `email` for EMAIL delivery; `html_body` optionally carries
/// an HTML alternative for email messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html_body: Option<String>,
}

/// Per-event payload stored in the notification's `data` column.
///
/// Tagged by the event type so each event's cross-reference ids are explicit
/// while the column stays one flat JSON object on the wire, e.g.
/// `{"type":"APPOINTMENT_REMINDER","appointmentId":"...","phone":"+254..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum NotificationData {
    AppointmentCreated {
        appointment_id: String,
        #[serde(flatten)]
        contact: ContactInfo,
    },
    AppointmentCancelled {
        appointment_id: String,
        #[serde(flatten)]
        contact: ContactInfo,
    },
    AppointmentReminder {
        appointment_id: String,
        #[serde(flatten)]
        contact: ContactInfo,
    },
    PaymentConfirmation {
        invoice_id: String,
        #[serde(flatten)]
        contact: ContactInfo,
    },
    PrescriptionReady {
        prescription_id: String,
        #[serde(flatten)]
        contact: ContactInfo,
    },
    LabResultReady {
        lab_order_id: String,
        #[serde(flatten)]
        contact: ContactInfo,
    },
    LowStockAlert {
        item_id: String,
        item_name: String,
    },
}

impl NotificationData {
    /// The notification type this payload belongs to. Derived from the
    /// variant so the stored tag and payload cannot contradict each other.
    pub fn notification_type(&self) -> NotificationType {
        match self {
            NotificationData::AppointmentCreated { .. } => NotificationType::AppointmentCreated,
            NotificationData::AppointmentCancelled { .. } => NotificationType::AppointmentCancelled,
            NotificationData::AppointmentReminder { .. } => NotificationType::AppointmentReminder,
            NotificationData::PaymentConfirmation { .. } => NotificationType::PaymentConfirmation,
            NotificationData::PrescriptionReady { .. } => NotificationType::PrescriptionReady,
            NotificationData::LabResultReady { .. } => NotificationType::LabResultReady,
            NotificationData::LowStockAlert { .. } => NotificationType::LowStockAlert,
        }
    }

    pub fn contact(&self) -> Option<&ContactInfo> {
        match self {
            NotificationData::AppointmentCreated { contact, .. }
            | NotificationData::AppointmentCancelled { contact, .. }
            | NotificationData::AppointmentReminder { contact, .. }
            | NotificationData::PaymentConfirmation { contact, .. }
            | NotificationData::PrescriptionReady { contact, .. }
            | NotificationData::LabResultReady { contact, .. } => Some(contact),
            NotificationData::LowStockAlert { .. } => None,
        }
    }

    pub fn phone(&self) -> Option<&str> {
        self.contact().and_then(|c| c.phone.as_deref())
    }

    pub fn email(&self) -> Option<&str> {
        self.contact().and_then(|c| c.email.as_deref())
    }
}

/// A persisted notification record. Owned by the recipient it targets;
/// mutated only through the dispatcher, the queue worker, and the
/// recipient-scoped read API.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub recipient_id: String,
    pub recipient_type: RecipientType,
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub channel: Channel,
    pub data: Json<NotificationData>,
    pub status: NotificationStatus,
    pub created_at: NaiveDateTime,
    pub sent_at: Option<NaiveDateTime>,
    pub read_at: Option<NaiveDateTime>,
}

/// Fields a domain collaborator supplies when creating a notification.
/// Id, status, and timestamps are assigned by the dispatcher.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNotification {
    pub recipient_id: String,
    pub recipient_type: RecipientType,
    pub title: String,
    pub message: String,
    pub channel: Channel,
    pub data: NotificationData,
}
