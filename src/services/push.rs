use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{mpsc, RwLock};

use crate::db::models::Notification;

/// Sender half of one live connection's outbound channel.
pub type PushSender = mpsc::UnboundedSender<Notification>;

struct Connection {
    id: u64,
    tx: PushSender,
}

#[derive(Default)]
struct Tables {
    users: HashMap<String, Vec<Connection>>,
    roles: HashMap<String, Vec<Connection>>,
}

/// Process-wide table of live real-time connections, keyed both by user id
/// and by role so a notification can target one person or a whole role.
///
/// Emits are best-effort and non-blocking: a recipient with no live
/// connection is not an error; the durable notification row is the fallback
/// read surface. Multiple simultaneous connections per user (multi-device)
/// all receive the event.
#[derive(Default)]
pub struct PushRegistry {
    tables: RwLock<Tables>,
    next_id: AtomicU64,
}

impl PushRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection under both its user id and its role. Returns a
    /// connection handle used to unregister on disconnect.
    pub async fn register(&self, user_id: &str, role: &str, tx: PushSender) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut tables = self.tables.write().await;
        tables
            .users
            .entry(user_id.to_string())
            .or_default()
            .push(Connection { id, tx: tx.clone() });
        tables
            .roles
            .entry(role.to_string())
            .or_default()
            .push(Connection { id, tx });
        tracing::debug!("Registered push connection {} for user {}", id, user_id);
        id
    }

    /// Remove a connection from both memberships.
    pub async fn unregister(&self, user_id: &str, role: &str, conn_id: u64) {
        let mut tables = self.tables.write().await;
        if let Some(conns) = tables.users.get_mut(user_id) {
            conns.retain(|c| c.id != conn_id);
            if conns.is_empty() {
                tables.users.remove(user_id);
            }
        }
        if let Some(conns) = tables.roles.get_mut(role) {
            conns.retain(|c| c.id != conn_id);
            if conns.is_empty() {
                tables.roles.remove(role);
            }
        }
        tracing::debug!("Unregistered push connection {} for user {}", conn_id, user_id);
    }

    /// Fire-and-forget fan-out to every live connection of one user.
    pub async fn emit_to_user(&self, user_id: &str, notification: &Notification) {
        let tables = self.tables.read().await;
        if let Some(conns) = tables.users.get(user_id) {
            for conn in conns {
                // A closed receiver means the socket is tearing down; the
                // disconnect path removes it.
                let _ = conn.tx.send(notification.clone());
            }
        }
    }

    /// Fire-and-forget fan-out to every connection registered under a role.
    pub async fn emit_to_role(&self, role: &str, notification: &Notification) {
        let tables = self.tables.read().await;
        if let Some(conns) = tables.roles.get(role) {
            for conn in conns {
                let _ = conn.tx.send(notification.clone());
            }
        }
    }

    /// Number of live connections for a user.
    pub async fn connection_count(&self, user_id: &str) -> usize {
        let tables = self.tables.read().await;
        tables.users.get(user_id).map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{
        Channel, ContactInfo, NotificationData, NotificationStatus, NotificationType,
        RecipientType,
    };
    use sqlx::types::Json;

    fn sample_notification(recipient_id: &str) -> Notification {
        Notification {
            id: "n-1".to_string(),
            recipient_id: recipient_id.to_string(),
            recipient_type: RecipientType::Employee,
            notification_type: NotificationType::AppointmentCreated,
            title: "New appointment".to_string(),
            message: "Booked for tomorrow".to_string(),
            channel: Channel::InApp,
            data: Json(NotificationData::AppointmentCreated {
                appointment_id: "appt-1".to_string(),
                contact: ContactInfo::default(),
            }),
            status: NotificationStatus::Pending,
            created_at: chrono::Utc::now().naive_utc(),
            sent_at: None,
            read_at: None,
        }
    }

    #[tokio::test]
    async fn emit_to_user_reaches_all_devices() {
        let registry = PushRegistry::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        registry.register("doc1", "DOCTOR", tx1).await;
        registry.register("doc1", "DOCTOR", tx2).await;

        registry.emit_to_user("doc1", &sample_notification("doc1")).await;

        assert_eq!(rx1.recv().await.unwrap().id, "n-1");
        assert_eq!(rx2.recv().await.unwrap().id, "n-1");
    }

    #[tokio::test]
    async fn emit_to_role_fans_out_across_users() {
        let registry = PushRegistry::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        registry.register("doc1", "DOCTOR", tx1).await;
        registry.register("doc2", "DOCTOR", tx2).await;

        registry.emit_to_role("DOCTOR", &sample_notification("doc1")).await;

        assert!(rx1.recv().await.is_some());
        assert!(rx2.recv().await.is_some());
    }

    #[tokio::test]
    async fn emit_without_connections_is_not_an_error() {
        let registry = PushRegistry::new();
        registry.emit_to_user("ghost", &sample_notification("ghost")).await;
        registry.emit_to_role("NURSE", &sample_notification("ghost")).await;
    }

    #[tokio::test]
    async fn unregister_removes_both_memberships() {
        let registry = PushRegistry::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let conn = registry.register("doc1", "DOCTOR", tx).await;

        registry.unregister("doc1", "DOCTOR", conn).await;
        assert_eq!(registry.connection_count("doc1").await, 0);

        registry.emit_to_user("doc1", &sample_notification("doc1")).await;
        registry.emit_to_role("DOCTOR", &sample_notification("doc1")).await;
        assert!(rx.try_recv().is_err());
    }
}
