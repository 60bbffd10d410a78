// Clippy allows for reasonable defaults
#![allow(clippy::new_without_default)] // Default not always appropriate for stateful types
#![allow(clippy::derivable_impls)] // Explicit Default impls can be clearer
#![allow(clippy::unnecessary_map_or)] // map_or can be clearer than alternatives
#![allow(clippy::redundant_closure)] // |x| f(x) can be clearer than f

// Module declarations
pub mod api;
pub mod collaborators;
pub mod config;
pub mod coordinator;
pub mod device;
pub mod error;
pub mod events;
pub mod listeners;
pub mod platform;
pub mod push;
pub mod scope;
pub mod storage;
mod utils;

pub use api::{ApiResponse, HttpBackend};
pub use collaborators::{
    AppLifecycle, AppState, DeviceRegistration, KeyValueStore, NotificationRegistry, Router,
    SessionHandle, SessionProvider, TokenRefresh, UnreadCountSource,
};
pub use config::PushConfig;
pub use coordinator::{Collaborators, NotificationCoordinator};
pub use device::{DeviceIdentity, OsType};
pub use error::{PushError, PushResult};
pub use events::{CoreEvent, EventBroadcaster};
pub use listeners::{ListenerHandle, SubscriptionSet};
pub use platform::{
    LocalNotification, MessageData, MessagingPlatform, NotificationResponse, PermissionStatus,
    RemoteMessage,
};
pub use scope::ScopeState;
pub use storage::{FileStore, MemoryStore};
