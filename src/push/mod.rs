//! Push notification pipeline
//!
//! Token registration and rotation, delivery normalization, the navigation
//! gate, the unread counter and the local inbox. The coordinator wires these
//! together; each piece is usable and testable on its own.

pub mod delivery;
pub mod inbox;
pub mod navigation;
pub mod token_lifecycle;
pub mod token_store;
pub mod unread;

pub use delivery::{
    extract_target, Delivery, DeliveryNormalizer, NormalizedDelivery, NotificationEvent,
    NotificationSource,
};
pub use inbox::{NotificationInbox, StoredNotification};
pub use navigation::{
    GateDecision, GateState, NavigationDebounce, NavigationGate, PendingNavigationTarget,
};
pub use token_lifecycle::{PushToken, TokenLifecycleManager, TokenSyncOutcome};
pub use token_store::TokenStore;
pub use unread::{RefreshOutcome, UnreadCount, UnreadCounter};
