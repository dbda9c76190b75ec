use std::collections::HashMap;

use tokio::sync::{mpsc, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::notifications::Notification;

/// Outbound half of one client connection. Messages are pre-serialized JSON.
pub type NotificationSender = mpsc::UnboundedSender<String>;

struct Connection {
    user_id: Uuid,
    sender: NotificationSender,
}

/// Tracks open notification connections and fans messages out per user.
///
/// Thread-safe via interior `RwLock`; shared as `Arc<NotificationHub>`.
#[derive(Default)]
pub struct NotificationHub {
    connections: RwLock<HashMap<Uuid, Connection>>,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connection and returns its id plus the receiver to drain.
    pub async fn connect(&self, user_id: Uuid) -> (Uuid, mpsc::UnboundedReceiver<String>) {
        let (sender, rx) = mpsc::unbounded_channel();
        let conn_id = Uuid::new_v4();
        self.connections
            .write()
            .await
            .insert(conn_id, Connection { user_id, sender });
        (conn_id, rx)
    }

    pub async fn disconnect(&self, conn_id: Uuid) {
        self.connections.write().await.remove(&conn_id);
    }

    /// Sends to every open connection of `user_id`. Returns how many received it.
    pub async fn notify_user(&self, user_id: Uuid, notification: &Notification) -> usize {
        let payload = match serde_json::to_string(notification) {
            Ok(p) => p,
            Err(e) => {
                warn!("Failed to serialize notification: {e}");
                return 0;
            }
        };

        let conns = self.connections.read().await;
        let mut delivered = 0;
        for conn in conns.values().filter(|c| c.user_id == user_id) {
            // Closed channels are cleaned up when their socket loop exits.
            if conn.sender.send(payload.clone()).is_ok() {
                delivered += 1;
            }
        }

        debug!(
            user_id = %user_id,
            kind = ?notification.kind,
            delivered,
            "Notification broadcast"
        );
        delivered
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }
}
