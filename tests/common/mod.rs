//! In-memory collaborators whose callbacks can be fired from tests
#![allow(dead_code)]

use async_trait::async_trait;
use attendance_push_lib::collaborators::{AppStateHandler, ReadyHandler, SessionHandler};
use attendance_push_lib::config::ChannelConfig;
use attendance_push_lib::platform::{MessageHandler, ResponseHandler, TokenHandler};
use attendance_push_lib::{
    AppLifecycle, AppState, Collaborators, DeviceIdentity, DeviceRegistration, ListenerHandle,
    LocalNotification, MemoryStore, MessageData, MessagingPlatform, NotificationCoordinator,
    NotificationRegistry, NotificationResponse, OsType, PermissionStatus, PushConfig, PushError,
    PushResult, RemoteMessage, Router, SessionHandle, SessionProvider, TokenRefresh,
    UnreadCountSource,
};
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Let spawned work run to completion. Under a paused clock this only
/// advances time once every task is idle.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(5)).await;
}

pub fn message_for(target: &str) -> RemoteMessage {
    let mut data = MessageData::new();
    data.insert("target".to_string(), json!(target));
    RemoteMessage::data_only(data)
}

type Handler<T> = Box<dyn Fn(T) + Send + Sync>;

/// Subscriber list shared by the fakes
pub struct Listeners<T> {
    next_id: AtomicU64,
    handlers: Arc<Mutex<Vec<(u64, Handler<T>)>>>,
}

impl<T: Clone + 'static> Listeners<T> {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            handlers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn subscribe(&self, name: &str, handler: Handler<T>) -> ListenerHandle {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.handlers.lock().unwrap().push((id, handler));
        let handlers = Arc::clone(&self.handlers);
        ListenerHandle::new(name, move || {
            handlers.lock().unwrap().retain(|(other, _)| *other != id);
        })
    }

    pub fn emit(&self, value: T) {
        for (_, handler) in self.handlers.lock().unwrap().iter() {
            handler(value.clone());
        }
    }

    pub fn count(&self) -> usize {
        self.handlers.lock().unwrap().len()
    }
}

pub struct FakeSession {
    current: Mutex<Option<SessionHandle>>,
    pub listeners: Listeners<Option<SessionHandle>>,
}

impl FakeSession {
    pub fn new(current: Option<&str>) -> Self {
        Self {
            current: Mutex::new(current.map(SessionHandle::new)),
            listeners: Listeners::new(),
        }
    }

    pub fn sign_in(&self, user_id: &str) {
        let session = Some(SessionHandle::new(user_id));
        *self.current.lock().unwrap() = session.clone();
        self.listeners.emit(session);
    }

    pub fn sign_out(&self) {
        *self.current.lock().unwrap() = None;
        self.listeners.emit(None);
    }
}

impl SessionProvider for FakeSession {
    fn current(&self) -> Option<SessionHandle> {
        self.current.lock().unwrap().clone()
    }

    fn on_change(&self, handler: SessionHandler) -> PushResult<ListenerHandle> {
        Ok(self.listeners.subscribe("session", handler))
    }
}

pub struct FakeRouter {
    ready: AtomicBool,
    pushes: Mutex<Vec<String>>,
    broken_targets: Mutex<Vec<String>>,
    pub listeners: Listeners<bool>,
}

impl FakeRouter {
    pub fn new(ready: bool) -> Self {
        Self {
            ready: AtomicBool::new(ready),
            pushes: Mutex::new(Vec::new()),
            broken_targets: Mutex::new(Vec::new()),
            listeners: Listeners::new(),
        }
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
        self.listeners.emit(ready);
    }

    /// Every push attempt, including failed ones
    pub fn pushes(&self) -> Vec<String> {
        self.pushes.lock().unwrap().clone()
    }

    pub fn break_target(&self, target: &str) {
        self.broken_targets.lock().unwrap().push(target.to_string());
    }
}

impl Router for FakeRouter {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn push(&self, target: &str) -> PushResult<()> {
        self.pushes.lock().unwrap().push(target.to_string());
        if self.broken_targets.lock().unwrap().iter().any(|t| t == target) {
            return Err(PushError::Navigation(format!("no route for {}", target)));
        }
        Ok(())
    }

    fn on_ready_change(&self, handler: ReadyHandler) -> PushResult<ListenerHandle> {
        Ok(self.listeners.subscribe("router", handler))
    }
}

pub struct FakeLifecycle {
    state: Mutex<AppState>,
    pub listeners: Listeners<AppState>,
}

impl FakeLifecycle {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(AppState::Active),
            listeners: Listeners::new(),
        }
    }

    pub fn set(&self, state: AppState) {
        *self.state.lock().unwrap() = state;
        self.listeners.emit(state);
    }

    /// Background then back to the foreground
    pub fn cycle(&self) {
        self.set(AppState::Background);
        self.set(AppState::Active);
    }
}

impl AppLifecycle for FakeLifecycle {
    fn current(&self) -> AppState {
        *self.state.lock().unwrap()
    }

    fn on_change(&self, handler: AppStateHandler) -> PushResult<ListenerHandle> {
        Ok(self.listeners.subscribe("app_state", handler))
    }
}

pub struct FakePlatform {
    pub permission: Mutex<PermissionStatus>,
    pub token: Mutex<String>,
    pub initial: Mutex<Option<RemoteMessage>>,
    pub last_response: Mutex<Option<NotificationResponse>>,
    pub presented: Mutex<Vec<LocalNotification>>,
    pub permission_requests: AtomicU32,
    pub tokens: Listeners<String>,
    pub messages: Listeners<RemoteMessage>,
    pub taps: Listeners<NotificationResponse>,
}

impl FakePlatform {
    pub fn new(token: &str) -> Self {
        Self {
            permission: Mutex::new(PermissionStatus::Granted),
            token: Mutex::new(token.to_string()),
            initial: Mutex::new(None),
            last_response: Mutex::new(None),
            presented: Mutex::new(Vec::new()),
            permission_requests: AtomicU32::new(0),
            tokens: Listeners::new(),
            messages: Listeners::new(),
            taps: Listeners::new(),
        }
    }

    pub fn rotate_token(&self, token: &str) {
        *self.token.lock().unwrap() = token.to_string();
        self.tokens.emit(token.to_string());
    }

    pub fn receive(&self, message: RemoteMessage) {
        self.messages.emit(message);
    }

    pub fn tap(&self, notification_id: &str, message: RemoteMessage) {
        self.taps.emit(NotificationResponse::tap(notification_id, message));
    }

    pub fn presented(&self) -> Vec<LocalNotification> {
        self.presented.lock().unwrap().clone()
    }

    pub fn listener_count(&self) -> usize {
        self.tokens.count() + self.messages.count() + self.taps.count()
    }
}

#[async_trait]
impl MessagingPlatform for FakePlatform {
    fn is_physical_device(&self) -> bool {
        true
    }

    async fn ensure_channel(&self, _channel: &ChannelConfig) -> PushResult<()> {
        Ok(())
    }

    async fn request_permission(&self) -> PushResult<PermissionStatus> {
        self.permission_requests.fetch_add(1, Ordering::SeqCst);
        Ok(*self.permission.lock().unwrap())
    }

    async fn get_token(&self) -> PushResult<String> {
        Ok(self.token.lock().unwrap().clone())
    }

    fn on_token_refresh(&self, handler: TokenHandler) -> PushResult<ListenerHandle> {
        Ok(self.tokens.subscribe("token_rotation", handler))
    }

    async fn get_initial_notification(&self) -> PushResult<Option<RemoteMessage>> {
        Ok(self.initial.lock().unwrap().clone())
    }

    async fn get_last_notification_response(&self) -> PushResult<Option<NotificationResponse>> {
        Ok(self.last_response.lock().unwrap().clone())
    }

    fn on_foreground_message(&self, handler: MessageHandler) -> PushResult<ListenerHandle> {
        Ok(self.messages.subscribe("foreground_message", handler))
    }

    fn on_notification_tapped(&self, handler: ResponseHandler) -> PushResult<ListenerHandle> {
        Ok(self.taps.subscribe("live_tap", handler))
    }

    async fn present_local(&self, notification: &LocalNotification) -> PushResult<()> {
        self.presented.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeRegistry {
    pub registered: Mutex<Vec<DeviceRegistration>>,
    pub refreshed: Mutex<Vec<(TokenRefresh, String)>>,
    pub offline: AtomicBool,
}

impl FakeRegistry {
    pub fn register_calls(&self) -> usize {
        self.registered.lock().unwrap().len()
    }

    pub fn refresh_calls(&self) -> Vec<(String, String)> {
        self.refreshed
            .lock()
            .unwrap()
            .iter()
            .map(|(refresh, old)| (old.clone(), refresh.new_token.clone()))
            .collect()
    }
}

#[async_trait]
impl NotificationRegistry for FakeRegistry {
    async fn register(&self, registration: &DeviceRegistration) -> PushResult<()> {
        self.registered.lock().unwrap().push(registration.clone());
        if self.offline.load(Ordering::SeqCst) {
            return Err(PushError::Network("offline".into()));
        }
        Ok(())
    }

    async fn refresh(&self, refresh: &TokenRefresh, old_token: &str) -> PushResult<()> {
        self.refreshed
            .lock()
            .unwrap()
            .push((refresh.clone(), old_token.to_string()));
        if self.offline.load(Ordering::SeqCst) {
            return Err(PushError::Network("offline".into()));
        }
        Ok(())
    }
}

pub struct FakeUnread {
    pub value: AtomicU32,
    pub failing: AtomicBool,
    pub fetches: AtomicU32,
}

impl FakeUnread {
    pub fn new(value: u32) -> Self {
        Self {
            value: AtomicU32::new(value),
            failing: AtomicBool::new(false),
            fetches: AtomicU32::new(0),
        }
    }

    pub fn fetches(&self) -> u32 {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UnreadCountSource for FakeUnread {
    async fn fetch(&self) -> PushResult<u32> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(PushError::Network("timeout".into()));
        }
        Ok(self.value.load(Ordering::SeqCst))
    }
}

/// All fakes wired together
pub struct Harness {
    pub session: Arc<FakeSession>,
    pub router: Arc<FakeRouter>,
    pub lifecycle: Arc<FakeLifecycle>,
    pub platform: Arc<FakePlatform>,
    pub registry: Arc<FakeRegistry>,
    pub unread: Arc<FakeUnread>,
    pub storage: Arc<MemoryStore>,
}

impl Harness {
    /// No session, router not ready, platform token "A"
    pub fn new() -> Self {
        Self::with_state(None, false)
    }

    /// Signed in as "u-1" with a ready router
    pub fn ready() -> Self {
        Self::with_state(Some("u-1"), true)
    }

    pub fn with_state(user: Option<&str>, router_ready: bool) -> Self {
        init_logging();
        Self {
            session: Arc::new(FakeSession::new(user)),
            router: Arc::new(FakeRouter::new(router_ready)),
            lifecycle: Arc::new(FakeLifecycle::new()),
            platform: Arc::new(FakePlatform::new("A")),
            registry: Arc::new(FakeRegistry::default()),
            unread: Arc::new(FakeUnread::new(0)),
            storage: Arc::new(MemoryStore::new()),
        }
    }

    pub fn coordinator(&self) -> NotificationCoordinator {
        self.coordinator_with(PushConfig::default())
    }

    pub fn coordinator_with(&self, config: PushConfig) -> NotificationCoordinator {
        NotificationCoordinator::new(
            config,
            Collaborators {
                session: self.session.clone(),
                router: self.router.clone(),
                storage: self.storage.clone(),
                lifecycle: self.lifecycle.clone(),
                platform: self.platform.clone(),
                registry: self.registry.clone(),
                unread_source: self.unread.clone(),
                device: DeviceIdentity::describe(
                    OsType::Android,
                    Some("device-1"),
                    Some("Pixel 8"),
                    Some("14"),
                ),
            },
        )
    }

    /// Activate and let the mount work finish
    pub async fn mounted(&self) -> NotificationCoordinator {
        let mut coordinator = self.coordinator();
        coordinator.activate().await;
        settle().await;
        coordinator
    }
}
