// Notification subsystem boundary.
// BroadcastNotifier keeps the outstanding notifications (so late WebSocket
// clients get a welcome list) and fans deliver/withdraw out on a broadcast channel.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::RwLock;
use tokio::sync::broadcast;

use crate::error::DeliveryError;
use crate::models::{AlertId, Notification};

/// Both calls must be idempotent: delivering an id again replaces it,
/// withdrawing an unknown id is a no-op.
pub trait Notifier: Send + Sync {
    fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError>;
    fn withdraw(&self, id: AlertId) -> Result<(), DeliveryError>;
}

/// Message pushed to `/ws/alerts` subscribers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum NotifierMessage {
    Deliver { notification: Notification },
    Withdraw { id: AlertId },
}

pub struct BroadcastNotifier {
    tx: broadcast::Sender<NotifierMessage>,
    delivered: RwLock<BTreeMap<AlertId, Notification>>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            delivered: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NotifierMessage> {
        self.tx.subscribe()
    }

    /// Currently delivered notifications, ordered by id.
    pub fn delivered(&self) -> Vec<Notification> {
        match self.delivered.read() {
            Ok(map) => map.values().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().values().cloned().collect(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    fn publish(&self, message: NotifierMessage) {
        // No subscribers is normal (nobody has the UI open); the delivered map still holds the alert.
        if self.tx.send(message).is_err() {
            tracing::debug!(
                operation = "broadcast_alert",
                "No active alert subscribers; message kept in delivered set only"
            );
        }
    }
}

impl Notifier for BroadcastNotifier {
    fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError> {
        {
            let mut map = self
                .delivered
                .write()
                .map_err(|_| DeliveryError::Poisoned)?;
            map.insert(notification.id, notification.clone());
        }
        tracing::info!(alert = %notification.id, body = %notification.body, "alert delivered");
        self.publish(NotifierMessage::Deliver {
            notification: notification.clone(),
        });
        Ok(())
    }

    fn withdraw(&self, id: AlertId) -> Result<(), DeliveryError> {
        let removed = self
            .delivered
            .write()
            .map_err(|_| DeliveryError::Poisoned)?
            .remove(&id)
            .is_some();
        if removed {
            tracing::info!(alert = %id, "alert withdrawn");
            self.publish(NotifierMessage::Withdraw { id });
        }
        Ok(())
    }
}
