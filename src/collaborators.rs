//! Narrow interfaces to the collaborators the core does not own
//!
//! Session state, the navigation stack, durable key-value storage, the app
//! lifecycle signal and the two backend endpoints are all supplied by the
//! host application. The core only talks to them through these traits.

use crate::device::{DeviceIdentity, OsType};
use crate::error::PushResult;
use crate::listeners::ListenerHandle;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Opaque handle for an authenticated session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionHandle {
    /// Identifier of the signed-in user
    pub user_id: String,
}

impl SessionHandle {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }
}

pub type SessionHandler = Box<dyn Fn(Option<SessionHandle>) + Send + Sync>;
pub type ReadyHandler = Box<dyn Fn(bool) + Send + Sync>;
pub type AppStateHandler = Box<dyn Fn(AppState) + Send + Sync>;

/// Source of truth for "is somebody signed in"
pub trait SessionProvider: Send + Sync {
    fn current(&self) -> Option<SessionHandle>;

    /// Subscribe to session changes (sign-in, sign-out, user switch)
    fn on_change(&self, handler: SessionHandler) -> PushResult<ListenerHandle>;
}

/// The host's navigation stack
pub trait Router: Send + Sync {
    fn is_ready(&self) -> bool;

    /// Navigate to a deep-link target. Invalid targets are reported as
    /// `PushError::Navigation` and never panic.
    fn push(&self, target: &str) -> PushResult<()>;

    /// Subscribe to readiness changes of the navigation stack
    fn on_ready_change(&self, handler: ReadyHandler) -> PushResult<ListenerHandle>;
}

/// Small durable key-value strings
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> PushResult<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> PushResult<()>;
    async fn remove(&self, key: &str) -> PushResult<()>;
}

/// Platform app-lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppState {
    Active,
    Inactive,
    Background,
}

/// App foreground/background signal
pub trait AppLifecycle: Send + Sync {
    fn current(&self) -> AppState;
    fn on_change(&self, handler: AppStateHandler) -> PushResult<ListenerHandle>;
}

/// Body of the "register device" call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRegistration {
    pub device_id: String,
    pub device_name: String,
    pub token: String,
    pub os_type: OsType,
}

impl DeviceRegistration {
    pub fn new(device: &DeviceIdentity, token: impl Into<String>) -> Self {
        Self {
            device_id: device.device_id.clone(),
            device_name: device.device_name.clone(),
            token: token.into(),
            os_type: device.os_type,
        }
    }
}

/// Body of the "refresh token" call (the old token travels alongside)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRefresh {
    pub device_id: String,
    pub device_name: String,
    pub new_token: String,
    pub os_type: OsType,
}

impl TokenRefresh {
    pub fn new(device: &DeviceIdentity, new_token: impl Into<String>) -> Self {
        Self {
            device_id: device.device_id.clone(),
            device_name: device.device_name.clone(),
            new_token: new_token.into(),
            os_type: device.os_type,
        }
    }
}

/// Remote registry mapping devices to push tokens
#[async_trait]
pub trait NotificationRegistry: Send + Sync {
    async fn register(&self, registration: &DeviceRegistration) -> PushResult<()>;

    /// Atomically replace `old_token` with the new value for this device
    async fn refresh(&self, refresh: &TokenRefresh, old_token: &str) -> PushResult<()>;
}

/// Remote unread-information counter
#[async_trait]
pub trait UnreadCountSource: Send + Sync {
    async fn fetch(&self) -> PushResult<u32>;
}
