//! Delivery normalization
//!
//! The OS hands notifications over through four structurally different
//! entry points. Each is adapted here into one [`NotificationEvent`] shape so
//! the navigation gate never branches on where an event came from.

use crate::platform::{
    data_string, LocalNotification, MessageData, NotificationResponse, RemoteMessage,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Number of recent notification ids remembered for duplicate detection
const SEEN_CAPACITY: usize = 64;

/// Title used for synthesized banners when the payload carries none
pub(crate) const DEFAULT_TITLE: &str = "Notification";

/// OS entry point an event arrived through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationSource {
    /// The process was started by tapping a notification
    InitialLaunch,
    /// A tap from the background that no live listener consumed yet
    LastTappedAtMount,
    /// A tap while the app is running
    LiveTap,
    /// A message arriving while the UI is visible
    ForegroundData,
}

impl NotificationSource {
    /// Taps express navigation intent; foreground messages do not
    pub fn is_tap(&self) -> bool {
        !matches!(self, NotificationSource::ForegroundData)
    }
}

/// Raw OS callback payload, one variant per entry point
#[derive(Debug, Clone)]
pub enum Delivery {
    InitialLaunch(RemoteMessage),
    LastTappedAtMount(NotificationResponse),
    LiveTap(NotificationResponse),
    ForegroundData(RemoteMessage),
}

impl Delivery {
    pub fn source(&self) -> NotificationSource {
        match self {
            Delivery::InitialLaunch(_) => NotificationSource::InitialLaunch,
            Delivery::LastTappedAtMount(_) => NotificationSource::LastTappedAtMount,
            Delivery::LiveTap(_) => NotificationSource::LiveTap,
            Delivery::ForegroundData(_) => NotificationSource::ForegroundData,
        }
    }
}

/// The single internal event shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEvent {
    pub source: NotificationSource,
    /// Deep-link path from the payload data, if any
    pub target: Option<String>,
    pub received_at: DateTime<Utc>,
    /// Identifier correlating the event with the inbox entry
    pub notification_id: Option<String>,
    pub title: Option<String>,
    pub body: Option<String>,
    pub data: MessageData,
    /// Original payload, opaque to the core
    pub raw: serde_json::Value,
}

/// Output of normalizing one OS callback
#[derive(Debug, Clone)]
pub struct NormalizedDelivery {
    pub event: NotificationEvent,
    /// Banner to show locally for data-only foreground messages
    pub local_banner: Option<LocalNotification>,
}

/// Adapts OS deliveries into [`NotificationEvent`]s.
///
/// Performs no target deduplication (that belongs to the navigation gate),
/// but never emits twice for the same OS callback: the cold-launch message
/// is consumed once and taps are remembered by id, so a tap reported both by
/// the mount query and by the live listener is processed once.
#[derive(Debug)]
pub struct DeliveryNormalizer {
    target_keys: Vec<String>,
    initial_consumed: bool,
    seen_taps: VecDeque<String>,
    seen_messages: VecDeque<String>,
}

impl DeliveryNormalizer {
    pub fn new(target_keys: Vec<String>) -> Self {
        Self {
            target_keys,
            initial_consumed: false,
            seen_taps: VecDeque::with_capacity(SEEN_CAPACITY),
            seen_messages: VecDeque::with_capacity(SEEN_CAPACITY),
        }
    }

    pub fn normalize(&mut self, delivery: Delivery) -> Option<NormalizedDelivery> {
        let source = delivery.source();
        match delivery {
            Delivery::InitialLaunch(message) => {
                if self.initial_consumed {
                    log::debug!("Initial notification already consumed");
                    return None;
                }
                self.initial_consumed = true;
                let ids: Vec<String> = message.message_id.iter().cloned().collect();
                if !self.remember_tap(&ids) {
                    return None;
                }
                let id = message.message_id.clone();
                Some(self.build(source, message, id, None))
            }
            Delivery::LastTappedAtMount(response) | Delivery::LiveTap(response) => {
                let mut ids = vec![response.notification_id.clone()];
                if let Some(message_id) = &response.message.message_id {
                    ids.push(message_id.clone());
                }
                if !self.remember_tap(&ids) {
                    log::debug!("Tap {} already processed", response.notification_id);
                    return None;
                }
                let id = Some(response.notification_id.clone());
                Some(self.build(source, response.message, id, None))
            }
            Delivery::ForegroundData(message) => {
                if let Some(id) = &message.message_id {
                    if self.seen_messages.contains(id) {
                        log::debug!("Foreground message {} already processed", id);
                        return None;
                    }
                    remember(&mut self.seen_messages, id.clone());
                }

                let id = message
                    .message_id
                    .clone()
                    .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

                // Messages that already produced a platform banner are not re-shown
                let banner = message.is_data_only().then(|| LocalNotification {
                    id: id.clone(),
                    title: message.title().unwrap_or_else(|| DEFAULT_TITLE.to_string()),
                    body: message.body().unwrap_or_default(),
                    data: message.data.clone(),
                });

                Some(self.build(source, message, Some(id), banner))
            }
        }
    }

    /// Returns false if any of `ids` was seen already; records them otherwise
    fn remember_tap(&mut self, ids: &[String]) -> bool {
        if ids.iter().any(|id| self.seen_taps.contains(id)) {
            return false;
        }
        for id in ids {
            remember(&mut self.seen_taps, id.clone());
        }
        true
    }

    fn build(
        &self,
        source: NotificationSource,
        message: RemoteMessage,
        notification_id: Option<String>,
        local_banner: Option<LocalNotification>,
    ) -> NormalizedDelivery {
        let raw = serde_json::to_value(&message).unwrap_or(serde_json::Value::Null);
        let event = NotificationEvent {
            source,
            target: extract_target(&message.data, &self.target_keys),
            received_at: Utc::now(),
            notification_id,
            title: message.title(),
            body: message.body(),
            data: message.data,
            raw,
        };
        NormalizedDelivery {
            event,
            local_banner,
        }
    }
}

fn remember(seen: &mut VecDeque<String>, id: String) {
    if seen.len() == SEEN_CAPACITY {
        seen.pop_front();
    }
    seen.push_back(id);
}

/// Deep-link target from message data: the first non-empty configured key
pub fn extract_target(data: &MessageData, keys: &[String]) -> Option<String> {
    keys.iter()
        .filter_map(|key| data_string(data, key))
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn keys() -> Vec<String> {
        vec!["target".to_string(), "targetScreen".to_string()]
    }

    fn data(pairs: &[(&str, &str)]) -> MessageData {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), json!(v)))
            .collect()
    }

    #[test]
    fn test_extract_target_key_order() {
        assert_eq!(
            extract_target(&data(&[("targetScreen", "/b"), ("target", "/a")]), &keys()),
            Some("/a".to_string())
        );
        assert_eq!(
            extract_target(&data(&[("target", " "), ("targetScreen", "/b")]), &keys()),
            Some("/b".to_string())
        );
        assert_eq!(extract_target(&data(&[("other", "/c")]), &keys()), None);
    }

    #[test]
    fn test_all_sources_produce_same_shape() {
        let mut normalizer = DeliveryNormalizer::new(keys());
        let message = RemoteMessage::data_only(data(&[("target", "/info/1")]));

        let deliveries = vec![
            Delivery::InitialLaunch(message.clone().with_id("m-0")),
            Delivery::LastTappedAtMount(NotificationResponse::tap("n-1", message.clone())),
            Delivery::LiveTap(NotificationResponse::tap("n-2", message.clone())),
            Delivery::ForegroundData(message.clone().with_id("m-3")),
        ];

        let sources: Vec<NotificationSource> = deliveries
            .into_iter()
            .map(|d| normalizer.normalize(d).unwrap().event)
            .inspect(|event| assert_eq!(event.target.as_deref(), Some("/info/1")))
            .map(|event| event.source)
            .collect();

        assert_eq!(
            sources,
            vec![
                NotificationSource::InitialLaunch,
                NotificationSource::LastTappedAtMount,
                NotificationSource::LiveTap,
                NotificationSource::ForegroundData,
            ]
        );
    }

    #[test]
    fn test_initial_launch_consumed_once() {
        let mut normalizer = DeliveryNormalizer::new(keys());
        let message = RemoteMessage::data_only(data(&[("target", "/assignments/7")]));
        assert!(normalizer.normalize(Delivery::InitialLaunch(message.clone())).is_some());
        assert!(normalizer.normalize(Delivery::InitialLaunch(message)).is_none());
    }

    #[test]
    fn test_same_tap_from_mount_query_and_listener_processed_once() {
        let mut normalizer = DeliveryNormalizer::new(keys());
        let response =
            NotificationResponse::tap("n-9", RemoteMessage::data_only(data(&[("target", "/x")])));

        assert!(normalizer
            .normalize(Delivery::LiveTap(response.clone()))
            .is_some());
        assert!(normalizer
            .normalize(Delivery::LastTappedAtMount(response))
            .is_none());
    }

    #[test]
    fn test_cold_launch_and_last_response_share_message_id() {
        let mut normalizer = DeliveryNormalizer::new(keys());
        let message = RemoteMessage::data_only(data(&[("target", "/x")])).with_id("fcm-1");

        assert!(normalizer
            .normalize(Delivery::InitialLaunch(message.clone()))
            .is_some());
        assert!(normalizer
            .normalize(Delivery::LastTappedAtMount(NotificationResponse::tap("local-1", message)))
            .is_none());
    }

    #[test]
    fn test_data_only_foreground_message_gets_local_banner() {
        let mut normalizer = DeliveryNormalizer::new(keys());
        let message = RemoteMessage::data_only(data(&[
            ("target", "/info/5"),
            ("title", "School closed"),
            ("body", "Tomorrow"),
        ]));

        let normalized = normalizer
            .normalize(Delivery::ForegroundData(message))
            .unwrap();
        let banner = normalized.local_banner.unwrap();
        assert_eq!(banner.title, "School closed");
        assert_eq!(banner.body, "Tomorrow");
        assert_eq!(Some(banner.id), normalized.event.notification_id);
        assert!(!normalized.event.source.is_tap());
    }

    #[test]
    fn test_banner_message_is_not_reshown() {
        let mut normalizer = DeliveryNormalizer::new(keys());
        let message = RemoteMessage::data_only(data(&[("target", "/info/5")]))
            .with_notification("Title", "Body")
            .with_id("m-1");

        let normalized = normalizer
            .normalize(Delivery::ForegroundData(message.clone()))
            .unwrap();
        assert!(normalized.local_banner.is_none());
        assert_eq!(normalized.event.title.as_deref(), Some("Title"));

        assert!(normalizer
            .normalize(Delivery::ForegroundData(message))
            .is_none());
    }

    #[test]
    fn test_missing_title_uses_default() {
        let mut normalizer = DeliveryNormalizer::new(keys());
        let normalized = normalizer
            .normalize(Delivery::ForegroundData(RemoteMessage::default()))
            .unwrap();
        assert_eq!(normalized.local_banner.unwrap().title, DEFAULT_TITLE);
        assert_eq!(normalized.event.target, None);
    }

    #[test]
    fn test_seen_ids_are_bounded() {
        let mut normalizer = DeliveryNormalizer::new(keys());
        for i in 0..(SEEN_CAPACITY + 10) {
            let response = NotificationResponse::tap(format!("n-{}", i), RemoteMessage::default());
            assert!(normalizer.normalize(Delivery::LiveTap(response)).is_some());
        }
        assert_eq!(normalizer.seen_taps.len(), SEEN_CAPACITY);
    }
}
