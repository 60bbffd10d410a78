//! Push token lifecycle
//!
//! Registers the device for push delivery and keeps the remote registry in
//! sync with token additions and rotations. Every path is best-effort: a
//! failure is logged and the next foreground cycle retries, because
//! idempotence is keyed off the locally stored token.

use super::token_store::TokenStore;
use crate::collaborators::{DeviceRegistration, NotificationRegistry, TokenRefresh};
use crate::config::ChannelConfig;
use crate::device::{DeviceIdentity, OsType};
use crate::error::{PushError, PushResult};
use crate::events::{EventBroadcaster, TokenRegisteredPayload, EVENT_TOKEN_REGISTERED};
use crate::listeners::ListenerHandle;
use crate::platform::MessagingPlatform;
use crate::scope::ScopeState;
use crate::utils::redact_token;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A registered push token and the device it belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushToken {
    pub value: String,
    pub device_id: String,
    pub device_name: String,
    pub os_type: OsType,
}

impl PushToken {
    fn new(value: String, device: &DeviceIdentity) -> Self {
        Self {
            value,
            device_id: device.device_id.clone(),
            device_name: device.device_name.clone(),
            os_type: device.os_type,
        }
    }
}

/// What a token synchronisation did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSyncOutcome {
    /// Token equals the stored one, no network call made
    Unchanged,
    /// Registry informed through "register device"
    Registered,
    /// Registry informed through "refresh token"
    Refreshed,
    /// Network or storage failure, retried on the next trigger
    Failed,
}

#[derive(Debug, Clone, Copy)]
enum SyncMode {
    Register,
    Rotate,
}

/// Resets the in-flight flag when registration finishes, however it ends
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct TokenLifecycleManager {
    platform: Arc<dyn MessagingPlatform>,
    registry: Arc<dyn NotificationRegistry>,
    store: TokenStore,
    device: DeviceIdentity,
    channel: ChannelConfig,
    broadcaster: Option<Arc<EventBroadcaster>>,
    registration_in_flight: AtomicBool,
    permission_denied: AtomicBool,
    // Held across compare -> network -> write so two syncs never both pass
    // the comparison with the same stale value
    sync_lock: tokio::sync::Mutex<()>,
}

impl TokenLifecycleManager {
    pub fn new(
        platform: Arc<dyn MessagingPlatform>,
        registry: Arc<dyn NotificationRegistry>,
        store: TokenStore,
        device: DeviceIdentity,
        channel: ChannelConfig,
    ) -> Self {
        Self {
            platform,
            registry,
            store,
            device,
            channel,
            broadcaster: None,
            registration_in_flight: AtomicBool::new(false),
            permission_denied: AtomicBool::new(false),
            sync_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn with_broadcaster(mut self, broadcaster: Arc<EventBroadcaster>) -> Self {
        self.broadcaster = Some(broadcaster);
        self
    }

    pub fn device(&self) -> &DeviceIdentity {
        &self.device
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    /// True once the user denied permission in this process
    pub fn permission_denied(&self) -> bool {
        self.permission_denied.load(Ordering::SeqCst)
    }

    /// Register this device for push delivery.
    ///
    /// Returns `None` on permission denial, on any platform or network
    /// failure, or when another registration is already running. Never
    /// raises.
    pub async fn register_device(&self, scope: &ScopeState) -> Option<PushToken> {
        if self.permission_denied() {
            log::debug!("Push permission denied earlier in this session, skipping registration");
            return None;
        }

        if self.registration_in_flight.swap(true, Ordering::SeqCst) {
            log::debug!("Push registration already in flight");
            return None;
        }
        let _in_flight = InFlight(&self.registration_in_flight);

        if !self.platform.is_physical_device() {
            log::info!("Push notifications need a physical device, skipping registration");
            return None;
        }

        if self.device.os_type == OsType::Android {
            if let Err(e) = self.platform.ensure_channel(&self.channel).await {
                log::warn!("Failed to set up notification channel {}: {}", self.channel.id, e);
            }
        }

        match self.ensure_permission().await {
            Ok(()) => {}
            Err(e) if e.is_terminal_for_session() => {
                log::info!("{}, push disabled for this session", e);
                self.permission_denied.store(true, Ordering::SeqCst);
                return None;
            }
            Err(e) => {
                log::warn!("Failed to request push permission: {}", e);
                return None;
            }
        }

        // Held from fetch to write so a rotation cannot land in between
        let _sync = self.sync_lock.lock().await;

        let token = match self.platform.get_token().await {
            Ok(token) if !token.trim().is_empty() => token,
            Ok(_) => {
                log::warn!("Platform returned an empty push token");
                return None;
            }
            Err(e) => {
                log::warn!("Error getting push token: {}", e);
                return None;
            }
        };

        match self.sync_locked(&token, SyncMode::Register, scope).await {
            TokenSyncOutcome::Unchanged
            | TokenSyncOutcome::Registered
            | TokenSyncOutcome::Refreshed => Some(PushToken::new(token, &self.device)),
            TokenSyncOutcome::Failed => None,
        }
    }

    async fn ensure_permission(&self) -> PushResult<()> {
        let status = self.platform.request_permission().await?;
        if status.allows_delivery() {
            Ok(())
        } else {
            log::debug!("Push permission status: {:?}", status);
            Err(PushError::PermissionDenied)
        }
    }

    /// Handle a token issued by the platform to replace the previous one
    pub async fn handle_rotation(&self, new_token: &str, scope: &ScopeState) -> TokenSyncOutcome {
        if new_token.trim().is_empty() {
            log::warn!("Ignoring empty rotated push token");
            return TokenSyncOutcome::Failed;
        }
        let _sync = self.sync_lock.lock().await;
        self.sync_locked(new_token, SyncMode::Rotate, scope).await
    }

    /// Subscribe to platform token rotation for the lifetime of `scope`
    pub fn on_token_rotated(self: &Arc<Self>, scope: ScopeState) -> PushResult<ListenerHandle> {
        let runtime = tokio::runtime::Handle::current();
        let manager = Arc::clone(self);
        self.platform.on_token_refresh(Box::new(move |token| {
            if !scope.is_alive() {
                return;
            }
            let manager = Arc::clone(&manager);
            let scope = scope.clone();
            runtime.spawn(async move {
                manager.handle_rotation(&token, &scope).await;
            });
        }))
    }

    /// Compare, inform the registry, persist. Caller holds `sync_lock`.
    async fn sync_locked(
        &self,
        token: &str,
        mode: SyncMode,
        scope: &ScopeState,
    ) -> TokenSyncOutcome {
        let previous = self.store.read().await;
        if previous.as_deref() == Some(token) {
            log::debug!("Push token {} unchanged, skipping registry", redact_token(token));
            return TokenSyncOutcome::Unchanged;
        }

        let result = match (mode, previous.as_deref()) {
            (SyncMode::Rotate, Some(old_token)) => {
                log::info!(
                    "Push token rotated {} -> {}",
                    redact_token(old_token),
                    redact_token(token)
                );
                self.registry
                    .refresh(&TokenRefresh::new(&self.device, token), old_token)
                    .await
                    .map(|_| TokenSyncOutcome::Refreshed)
            }
            _ => self
                .registry
                .register(&DeviceRegistration::new(&self.device, token))
                .await
                .map(|_| TokenSyncOutcome::Registered),
        };

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) if e.is_transient() => {
                log::warn!("Failed to sync push token, retrying on next foreground: {}", e);
                return TokenSyncOutcome::Failed;
            }
            Err(e) => {
                log::warn!("Failed to sync push token with registry: {}", e);
                return TokenSyncOutcome::Failed;
            }
        };

        // The store mirrors the registry, so it is written even after teardown
        if let Err(e) = self.store.write(token).await {
            log::warn!("Registered push token but failed to persist it: {}", e);
        }

        if let Some(broadcaster) = &self.broadcaster {
            scope.guard("token registered event", || {
                broadcaster.broadcast(
                    EVENT_TOKEN_REGISTERED,
                    TokenRegisteredPayload {
                        device_id: self.device.device_id.clone(),
                        rotated: outcome == TokenSyncOutcome::Refreshed,
                    },
                )
            });
        }

        log::info!("Push token {} synced with registry", redact_token(token));
        outcome
    }
}
