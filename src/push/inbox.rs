//! Local notification inbox
//!
//! Received notifications are kept under a single storage key as a JSON
//! list, newest first, so the UI can show them and a badge can be derived
//! without a network round trip. Storage failures degrade to an empty inbox.

use crate::collaborators::KeyValueStore;
use crate::error::PushResult;
use crate::events::{EventBroadcaster, InboxChangedPayload, EVENT_INBOX_CHANGED};
use crate::platform::MessageData;
use crate::push::delivery::{NotificationEvent, DEFAULT_TITLE};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A notification as kept in the inbox
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredNotification {
    pub id: String,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub data: MessageData,
    pub received_at: String,
    #[serde(default)]
    pub has_read: bool,
}

impl StoredNotification {
    /// Build an inbox entry from a normalized event
    pub fn from_event(event: &NotificationEvent) -> Option<Self> {
        let id = event.notification_id.clone()?;
        Some(Self {
            id,
            title: event
                .title
                .clone()
                .unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            body: event.body.clone().unwrap_or_default(),
            data: event.data.clone(),
            received_at: event.received_at.to_rfc3339(),
            has_read: false,
        })
    }
}

pub struct NotificationInbox {
    storage: Arc<dyn KeyValueStore>,
    key: String,
    capacity: usize,
    broadcaster: Option<Arc<EventBroadcaster>>,
    // Serialises read-modify-write cycles on the stored list
    lock: tokio::sync::Mutex<()>,
}

impl NotificationInbox {
    pub fn new(storage: Arc<dyn KeyValueStore>, key: impl Into<String>, capacity: usize) -> Self {
        Self {
            storage,
            key: key.into(),
            capacity: capacity.max(1),
            broadcaster: None,
            lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn with_broadcaster(mut self, broadcaster: Arc<EventBroadcaster>) -> Self {
        self.broadcaster = Some(broadcaster);
        self
    }

    /// Load the stored list, treating failures as empty
    async fn load(&self) -> Vec<StoredNotification> {
        let stored = match self.storage.get(&self.key).await {
            Ok(Some(json)) => json,
            Ok(None) => return Vec::new(),
            Err(e) => {
                log::warn!("Error getting stored notifications: {}", e);
                return Vec::new();
            }
        };
        serde_json::from_str(&stored).unwrap_or_else(|e| {
            log::warn!("Stored notifications are corrupt, starting empty: {}", e);
            Vec::new()
        })
    }

    async fn save(&self, notifications: &[StoredNotification]) -> PushResult<()> {
        let json = serde_json::to_string(notifications)?;
        self.storage.set(&self.key, &json).await?;
        if let Some(broadcaster) = &self.broadcaster {
            broadcaster.broadcast(
                EVENT_INBOX_CHANGED,
                InboxChangedPayload {
                    total: notifications.len(),
                    unread: notifications.iter().filter(|n| !n.has_read).count(),
                },
            );
        }
        Ok(())
    }

    /// All stored notifications, newest first
    pub async fn list(&self) -> Vec<StoredNotification> {
        let _guard = self.lock.lock().await;
        self.load().await
    }

    pub async fn get(&self, id: &str) -> Option<StoredNotification> {
        self.list().await.into_iter().find(|n| n.id == id)
    }

    /// Record a notification. An entry with the same id is replaced in place.
    pub async fn record(&self, notification: StoredNotification) -> PushResult<()> {
        let _guard = self.lock.lock().await;
        let mut notifications = self.load().await;

        notifications.retain(|n| n.id != notification.id);
        notifications.insert(0, notification);
        notifications.truncate(self.capacity);

        self.save(&notifications).await?;
        log::info!("Saved notification (total: {})", notifications.len());
        Ok(())
    }

    /// Mark a notification as read. Returns false if it is not in the inbox.
    pub async fn mark_read(&self, id: &str) -> PushResult<bool> {
        let _guard = self.lock.lock().await;
        let mut notifications = self.load().await;

        let Some(entry) = notifications.iter_mut().find(|n| n.id == id) else {
            return Ok(false);
        };
        if entry.has_read {
            return Ok(true);
        }
        entry.has_read = true;
        self.save(&notifications).await?;
        log::debug!("Marked notification {} as read", id);
        Ok(true)
    }

    /// Delete one notification. Returns false if it was not present.
    pub async fn delete(&self, id: &str) -> PushResult<bool> {
        let _guard = self.lock.lock().await;
        let mut notifications = self.load().await;

        let before = notifications.len();
        notifications.retain(|n| n.id != id);
        if notifications.len() == before {
            return Ok(false);
        }
        self.save(&notifications).await?;
        Ok(true)
    }

    pub async fn clear(&self) -> PushResult<()> {
        let _guard = self.lock.lock().await;
        self.storage.remove(&self.key).await?;
        if let Some(broadcaster) = &self.broadcaster {
            broadcaster.broadcast(EVENT_INBOX_CHANGED, InboxChangedPayload { total: 0, unread: 0 });
        }
        Ok(())
    }

    /// Unread entries in the local inbox (distinct from the backend count)
    pub async fn local_unread_count(&self) -> usize {
        self.list().await.iter().filter(|n| !n.has_read).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn notification(id: &str) -> StoredNotification {
        StoredNotification {
            id: id.to_string(),
            title: format!("Title {}", id),
            body: "Body".to_string(),
            data: MessageData::new(),
            received_at: chrono::Utc::now().to_rfc3339(),
            has_read: false,
        }
    }

    fn inbox(capacity: usize) -> NotificationInbox {
        NotificationInbox::new(Arc::new(MemoryStore::new()), "@notifications_storage", capacity)
    }

    #[tokio::test]
    async fn test_record_newest_first() {
        let inbox = inbox(10);
        inbox.record(notification("1")).await.unwrap();
        inbox.record(notification("2")).await.unwrap();

        let ids: Vec<String> = inbox.list().await.into_iter().map(|n| n.id).collect();
        assert_eq!(ids, vec!["2", "1"]);
        assert_eq!(inbox.local_unread_count().await, 2);
    }

    #[tokio::test]
    async fn test_capacity_drops_oldest() {
        let inbox = inbox(2);
        for id in ["1", "2", "3"] {
            inbox.record(notification(id)).await.unwrap();
        }
        let ids: Vec<String> = inbox.list().await.into_iter().map(|n| n.id).collect();
        assert_eq!(ids, vec!["3", "2"]);
    }

    #[tokio::test]
    async fn test_mark_read_and_delete() {
        let inbox = inbox(10);
        inbox.record(notification("1")).await.unwrap();

        assert!(inbox.mark_read("1").await.unwrap());
        assert!(!inbox.mark_read("missing").await.unwrap());
        assert!(inbox.get("1").await.unwrap().has_read);
        assert_eq!(inbox.local_unread_count().await, 0);

        assert!(inbox.delete("1").await.unwrap());
        assert!(!inbox.delete("1").await.unwrap());
        assert!(inbox.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_id_replaced() {
        let inbox = inbox(10);
        inbox.record(notification("1")).await.unwrap();
        inbox.mark_read("1").await.unwrap();
        inbox.record(notification("1")).await.unwrap();

        let all = inbox.list().await;
        assert_eq!(all.len(), 1);
        assert!(!all[0].has_read);
    }

    #[tokio::test]
    async fn test_corrupt_storage_reads_empty() {
        let storage = Arc::new(MemoryStore::with_entry("@notifications_storage", "[oops"));
        let inbox = NotificationInbox::new(storage, "@notifications_storage", 10);
        assert!(inbox.list().await.is_empty());

        inbox.record(notification("1")).await.unwrap();
        assert_eq!(inbox.list().await.len(), 1);
    }

    #[test]
    fn test_entry_from_untitled_event_uses_default_title() {
        let mut normalizer = crate::push::DeliveryNormalizer::new(vec!["target".to_string()]);
        let normalized = normalizer
            .normalize(crate::push::Delivery::ForegroundData(
                crate::platform::RemoteMessage::default().with_id("m-1"),
            ))
            .unwrap();

        let stored = StoredNotification::from_event(&normalized.event).unwrap();
        assert_eq!(stored.id, "m-1");
        assert_eq!(stored.title, DEFAULT_TITLE);
        assert_eq!(Some(stored.title), normalized.local_banner.map(|b| b.title));
    }

    #[tokio::test]
    async fn test_clear() {
        let inbox = inbox(10);
        inbox.record(notification("1")).await.unwrap();
        inbox.clear().await.unwrap();
        assert!(inbox.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_broadcasts_changes() {
        let broadcaster = Arc::new(EventBroadcaster::new());
        let mut rx = broadcaster.subscribe();
        let inbox = inbox(10).with_broadcaster(broadcaster);

        inbox.record(notification("1")).await.unwrap();
        let event = rx.recv().await.unwrap();
        assert_eq!(event.event, EVENT_INBOX_CHANGED);
        assert_eq!(event.payload["unread"], 1);
    }
}
