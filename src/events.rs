// Event types and payload structures for observers of the push core
// These are broadcast to UI layers that want to react without reaching into state

use crate::push::delivery::NotificationSource;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// Event name constants
pub const EVENT_NOTIFICATION_RECEIVED: &str = "notification:received";
pub const EVENT_NAVIGATION_DISPATCHED: &str = "navigation:dispatched";
pub const EVENT_NAVIGATION_QUEUED: &str = "navigation:queued";
pub const EVENT_NAVIGATION_SUPPRESSED: &str = "navigation:suppressed";
pub const EVENT_UNREAD_CHANGED: &str = "unread:changed";
pub const EVENT_INBOX_CHANGED: &str = "inbox:changed";
pub const EVENT_TOKEN_REGISTERED: &str = "token:registered";

/// Payload for notification received events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationReceivedPayload {
    pub source: NotificationSource,
    pub target: Option<String>,
    pub received_at: String,
}

/// Payload for navigation events (dispatched, queued, suppressed)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationPayload {
    pub target: String,
}

/// Payload for unread count changes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadChangedPayload {
    pub value: u32,
    pub last_refreshed_at: String,
}

/// Payload for inbox changes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboxChangedPayload {
    pub total: usize,
    pub unread: usize,
}

/// Payload for token registration (never carries the token itself)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRegisteredPayload {
    pub device_id: String,
    pub rotated: bool,
}

/// An event published by the core
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoreEvent {
    /// Event type (e.g., "navigation:dispatched")
    pub event: String,
    /// Event payload as JSON value
    pub payload: serde_json::Value,
}

/// Broadcasts events to all subscribers
#[derive(Debug)]
pub struct EventBroadcaster {
    tx: broadcast::Sender<CoreEvent>,
}

impl EventBroadcaster {
    /// Create a new event broadcaster with a channel capacity of 256 events
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(256);
        Self { tx }
    }

    /// Broadcast an event to all subscribers
    pub fn broadcast(&self, event_type: &str, payload: impl Serialize) {
        let event = CoreEvent {
            event: event_type.to_string(),
            payload: serde_json::to_value(payload).unwrap_or(serde_json::Value::Null),
        };

        // Ignore send errors (no receivers)
        let _ = self.tx.send(event);
    }

    /// Subscribe to events (returns a receiver)
    pub fn subscribe(&self) -> broadcast::Receiver<CoreEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}
