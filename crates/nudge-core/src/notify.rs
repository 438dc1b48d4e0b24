//! Real-time notification hub
//!
//! Fan-out of notifications to live connections, keyed by user id. Each user
//! gets a broadcast channel on first subscribe; the channel is dropped once
//! its last receiver goes away.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use crate::models::Nudge;

/// Messages buffered per user before slow receivers start lagging
const DEFAULT_CAPACITY: usize = 64;

/// A message pushed to a user's live connections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// A new nudge is ready
    Nudge { nudge: NudgePayload },
    /// An engine run finished
    InsightsUpdated { generated: usize, persisted: usize },
    /// Reply to a client ping
    Pong { at: DateTime<Utc> },
}

/// Wire form of a nudge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NudgePayload {
    pub id: i64,
    pub insight_id: Option<i64>,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub priority: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Nudge> for Notification {
    fn from(nudge: &Nudge) -> Self {
        Notification::Nudge {
            nudge: NudgePayload {
                id: nudge.id,
                insight_id: nudge.insight_id,
                kind: nudge.kind.clone(),
                title: nudge.title.clone(),
                message: nudge.message.clone(),
                priority: nudge.priority.clone(),
                created_at: nudge.created_at,
            },
        }
    }
}

/// Per-user pub/sub
#[derive(Debug)]
pub struct NotificationHub {
    channels: RwLock<HashMap<String, broadcast::Sender<Notification>>>,
    capacity: usize,
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Open a receiver for a user's notifications
    pub fn subscribe(&self, user_id: &str) -> broadcast::Receiver<Notification> {
        let mut channels = self.channels.write().unwrap_or_else(PoisonError::into_inner);
        let sender = channels
            .entry(user_id.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0);
        let rx = sender.subscribe();
        debug!(user_id, connections = sender.receiver_count(), "Subscribed to notifications");
        rx
    }

    /// Send to every live receiver for a user
    ///
    /// Returns how many receivers got the message; zero when the user has no
    /// live connection.
    pub fn publish(&self, user_id: &str, notification: Notification) -> usize {
        let delivered = {
            let channels = self.channels.read().unwrap_or_else(PoisonError::into_inner);
            match channels.get(user_id) {
                Some(sender) => sender.send(notification).unwrap_or(0),
                None => return 0,
            }
        };

        if delivered == 0 {
            self.prune(user_id);
        }
        debug!(user_id, delivered, "Published notification");
        delivered
    }

    /// Live receivers for a user
    pub fn connection_count(&self, user_id: &str) -> usize {
        self.channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(user_id)
            .map(|s| s.receiver_count())
            .unwrap_or(0)
    }

    /// Users with at least one channel open
    pub fn active_users(&self) -> usize {
        self.channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Drop a user's channel if nobody is listening
    pub fn prune(&self, user_id: &str) {
        let mut channels = self.channels.write().unwrap_or_else(PoisonError::into_inner);
        if channels
            .get(user_id)
            .is_some_and(|s| s.receiver_count() == 0)
        {
            channels.remove(user_id);
            debug!(user_id, "Pruned idle notification channel");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update() -> Notification {
        Notification::InsightsUpdated {
            generated: 2,
            persisted: 1,
        }
    }

    #[tokio::test]
    async fn test_publish_fans_out_per_user() {
        let hub = NotificationHub::new();
        let mut a1 = hub.subscribe("alice");
        let mut a2 = hub.subscribe("alice");
        let mut b = hub.subscribe("bob");

        assert_eq!(hub.connection_count("alice"), 2);
        assert_eq!(hub.publish("alice", update()), 2);

        assert_eq!(a1.recv().await.unwrap(), update());
        assert_eq!(a2.recv().await.unwrap(), update());
        assert!(b.try_recv().is_err());
    }

    #[test]
    fn test_publish_without_subscribers() {
        let hub = NotificationHub::new();
        assert_eq!(hub.publish("nobody", update()), 0);

        let rx = hub.subscribe("carol");
        assert_eq!(hub.active_users(), 1);
        drop(rx);

        // Channel is pruned once the last receiver is gone
        assert_eq!(hub.publish("carol", update()), 0);
        assert_eq!(hub.active_users(), 0);
        assert_eq!(hub.connection_count("carol"), 0);
    }

    #[test]
    fn test_notification_wire_format() {
        let json = serde_json::to_value(update()).unwrap();
        assert_eq!(json["type"], "insights_updated");
        assert_eq!(json["generated"], 2);
    }
}
