//! Interface to the platform messaging SDK
//!
//! The OS and the messaging SDK deliver notifications through several
//! structurally different entry points. This module describes them as one
//! trait; the delivery normalizer turns their output into a single event.

use crate::config::ChannelConfig;
use crate::error::PushResult;
use crate::listeners::ListenerHandle;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Key/value payload carried by a message
pub type MessageData = BTreeMap<String, serde_json::Value>;

/// Outcome of a notification permission request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionStatus {
    Granted,
    Provisional,
    Denied,
    Undetermined,
}

impl PermissionStatus {
    pub fn allows_delivery(&self) -> bool {
        matches!(self, PermissionStatus::Granted | PermissionStatus::Provisional)
    }
}

/// Banner content rendered by the platform
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// A message as handed over by the messaging SDK
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteMessage {
    /// Platform identifier, when the SDK provides one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    /// Present when the platform rendered (or will render) a banner.
    /// `None` means a data-only message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification: Option<NotificationContent>,
    #[serde(default)]
    pub data: MessageData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<DateTime<Utc>>,
}

impl RemoteMessage {
    pub fn data_only(data: MessageData) -> Self {
        Self {
            data,
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.message_id = Some(id.into());
        self
    }

    pub fn with_notification(mut self, title: impl Into<String>, body: impl Into<String>) -> Self {
        self.notification = Some(NotificationContent {
            title: Some(title.into()),
            body: Some(body.into()),
        });
        self
    }

    /// Data-only messages produce no platform banner
    pub fn is_data_only(&self) -> bool {
        self.notification.is_none()
    }

    /// Title from the banner, falling back to the data map
    pub fn title(&self) -> Option<String> {
        self.notification
            .as_ref()
            .and_then(|n| n.title.clone())
            .or_else(|| data_string(&self.data, "title"))
    }

    /// Body from the banner, falling back to the data map
    pub fn body(&self) -> Option<String> {
        self.notification
            .as_ref()
            .and_then(|n| n.body.clone())
            .or_else(|| data_string(&self.data, "body"))
    }
}

/// A user's response (tap) on a shown notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationResponse {
    /// Identifier of the tapped notification
    pub notification_id: String,
    /// Action the user took (the default tap action on most platforms)
    #[serde(default = "default_action")]
    pub action_identifier: String,
    pub message: RemoteMessage,
}

fn default_action() -> String {
    "default".to_string()
}

impl NotificationResponse {
    pub fn tap(notification_id: impl Into<String>, message: RemoteMessage) -> Self {
        Self {
            notification_id: notification_id.into(),
            action_identifier: default_action(),
            message,
        }
    }
}

/// Notification the core asks the platform to show immediately
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalNotification {
    pub id: String,
    pub title: String,
    pub body: String,
    pub data: MessageData,
}

pub type TokenHandler = Box<dyn Fn(String) + Send + Sync>;
pub type MessageHandler = Box<dyn Fn(RemoteMessage) + Send + Sync>;
pub type ResponseHandler = Box<dyn Fn(NotificationResponse) + Send + Sync>;

/// The platform messaging SDK
#[async_trait]
pub trait MessagingPlatform: Send + Sync {
    /// Simulators and emulators cannot receive push
    fn is_physical_device(&self) -> bool;

    async fn ensure_channel(&self, channel: &ChannelConfig) -> PushResult<()>;
    async fn request_permission(&self) -> PushResult<PermissionStatus>;
    async fn get_token(&self) -> PushResult<String>;
    fn on_token_refresh(&self, handler: TokenHandler) -> PushResult<ListenerHandle>;

    /// Message that cold-launched the process, if any
    async fn get_initial_notification(&self) -> PushResult<Option<RemoteMessage>>;
    /// Last tap response not yet consumed by a live listener
    async fn get_last_notification_response(&self) -> PushResult<Option<NotificationResponse>>;

    fn on_foreground_message(&self, handler: MessageHandler) -> PushResult<ListenerHandle>;
    fn on_notification_tapped(&self, handler: ResponseHandler) -> PushResult<ListenerHandle>;

    /// Show a notification right away, as if the platform had rendered it
    async fn present_local(&self, notification: &LocalNotification) -> PushResult<()>;
}

/// Read a string entry from message data
pub fn data_string(data: &MessageData, key: &str) -> Option<String> {
    match data.get(key)? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
