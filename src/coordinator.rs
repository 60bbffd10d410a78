//! Notification coordinator
//!
//! Owns one activation scope at a time. Activation installs every listener
//! into a [`SubscriptionSet`], seeds the navigation gate with the current
//! session and router state, runs the two mount-time queries and starts a
//! single event loop. All inputs (deliveries, session, router and app-state
//! changes) funnel through that loop, so the gate only ever sees one event at
//! a time. Network work is spawned and gated by the scope's alive flag.

use crate::collaborators::{
    AppLifecycle, AppState, KeyValueStore, NotificationRegistry, Router, SessionHandle,
    SessionProvider, UnreadCountSource,
};
use crate::config::PushConfig;
use crate::device::DeviceIdentity;
use crate::error::{PushError, PushResult};
use crate::events::{
    CoreEvent, EventBroadcaster, NavigationPayload, NotificationReceivedPayload,
    EVENT_NAVIGATION_DISPATCHED, EVENT_NAVIGATION_QUEUED, EVENT_NAVIGATION_SUPPRESSED,
    EVENT_NOTIFICATION_RECEIVED,
};
use crate::listeners::{ListenerHandle, SubscriptionSet};
use crate::platform::MessagingPlatform;
use crate::push::{
    Delivery, DeliveryNormalizer, GateDecision, GateState, NavigationGate, NormalizedDelivery,
    NotificationInbox, PendingNavigationTarget, StoredNotification, TokenLifecycleManager,
    TokenStore, UnreadCount, UnreadCounter,
};
use crate::scope::ScopeState;
use crate::utils::lock_recover;
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// External collaborators the coordinator is wired to
pub struct Collaborators {
    pub session: Arc<dyn SessionProvider>,
    pub router: Arc<dyn Router>,
    pub storage: Arc<dyn KeyValueStore>,
    pub lifecycle: Arc<dyn AppLifecycle>,
    pub platform: Arc<dyn MessagingPlatform>,
    pub registry: Arc<dyn NotificationRegistry>,
    pub unread_source: Arc<dyn UnreadCountSource>,
    pub device: DeviceIdentity,
}

/// Everything the event loop reacts to
#[derive(Debug)]
enum Input {
    Delivery(Delivery),
    SessionChanged(Option<SessionHandle>),
    RouterReady(bool),
    AppStateChanged(AppState),
}

struct ActiveScope {
    scope: ScopeState,
    subscriptions: SubscriptionSet,
    task: JoinHandle<()>,
}

pub struct NotificationCoordinator {
    session: Arc<dyn SessionProvider>,
    router: Arc<dyn Router>,
    lifecycle: Arc<dyn AppLifecycle>,
    platform: Arc<dyn MessagingPlatform>,
    token_manager: Arc<TokenLifecycleManager>,
    unread: UnreadCounter,
    inbox: Arc<NotificationInbox>,
    broadcaster: Arc<EventBroadcaster>,
    // Survive re-activation: the cold-launch message is consumed once per
    // process and a pending target outlives a remount
    gate: Arc<Mutex<NavigationGate>>,
    normalizer: Arc<Mutex<DeliveryNormalizer>>,
    active: Option<ActiveScope>,
}

impl NotificationCoordinator {
    pub fn new(config: PushConfig, collaborators: Collaborators) -> Self {
        let broadcaster = Arc::new(EventBroadcaster::new());

        let token_manager = TokenLifecycleManager::new(
            Arc::clone(&collaborators.platform),
            collaborators.registry,
            TokenStore::new(
                Arc::clone(&collaborators.storage),
                config.token_storage_key.clone(),
            ),
            collaborators.device,
            config.android_channel.clone(),
        )
        .with_broadcaster(Arc::clone(&broadcaster));

        let unread = UnreadCounter::new(collaborators.unread_source)
            .with_broadcaster(Arc::clone(&broadcaster));

        let inbox = NotificationInbox::new(
            collaborators.storage,
            config.inbox_storage_key.clone(),
            config.inbox_capacity,
        )
        .with_broadcaster(Arc::clone(&broadcaster));

        let gate = NavigationGate::new(config.debounce_window())
            .with_user_scoped_pending(config.discard_pending_on_user_change);

        Self {
            session: collaborators.session,
            router: collaborators.router,
            lifecycle: collaborators.lifecycle,
            platform: collaborators.platform,
            token_manager: Arc::new(token_manager),
            unread,
            inbox: Arc::new(inbox),
            broadcaster,
            gate: Arc::new(Mutex::new(gate)),
            normalizer: Arc::new(Mutex::new(DeliveryNormalizer::new(config.target_keys))),
            active: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Scope of the current activation, if any
    pub fn scope(&self) -> Option<ScopeState> {
        self.active.as_ref().map(|a| a.scope.clone())
    }

    /// Mount: install listeners, seed state, run mount queries, start the loop.
    ///
    /// Must be called from within a tokio runtime. Calling it while already
    /// active does nothing.
    pub async fn activate(&mut self) {
        if self.active.is_some() {
            log::debug!("Notification coordinator already active");
            return;
        }

        let scope = ScopeState::new();
        let (tx, rx) = mpsc::unbounded_channel();
        log::info!("Activating notification coordinator (scope {})", scope.id());

        let subscriptions = self.install_listeners(&scope, &tx);
        log::debug!("Installed listeners: {:?}", subscriptions.names());

        // Seed with current state; listeners only report changes from here on
        let _ = tx.send(Input::SessionChanged(self.session.current()));
        let _ = tx.send(Input::RouterReady(self.router.is_ready()));

        match self.platform.get_initial_notification().await {
            Ok(Some(message)) => {
                let _ = tx.send(Input::Delivery(Delivery::InitialLaunch(message)));
            }
            Ok(None) => {}
            Err(e) => log::warn!("Failed to query initial notification: {}", e),
        }

        match self.platform.get_last_notification_response().await {
            Ok(Some(response)) => {
                let _ = tx.send(Input::Delivery(Delivery::LastTappedAtMount(response)));
            }
            Ok(None) => {}
            Err(e) => log::warn!("Failed to query last notification response: {}", e),
        }

        let event_loop = EventLoop {
            scope: scope.clone(),
            router: Arc::clone(&self.router),
            platform: Arc::clone(&self.platform),
            token_manager: Arc::clone(&self.token_manager),
            unread: self.unread.clone(),
            inbox: Arc::clone(&self.inbox),
            broadcaster: Arc::clone(&self.broadcaster),
            gate: Arc::clone(&self.gate),
            normalizer: Arc::clone(&self.normalizer),
            app_state: self.lifecycle.current(),
        };
        let task = tokio::spawn(event_loop.run(rx));

        self.active = Some(ActiveScope {
            scope,
            subscriptions,
            task,
        });
    }

    /// Unmount: dispose listeners and stop the loop. In-flight network results
    /// arriving afterwards no longer touch gate, counter or events.
    pub fn deactivate(&mut self) {
        let Some(mut active) = self.active.take() else {
            return;
        };
        log::info!("Deactivating notification coordinator (scope {})", active.scope.id());
        active.scope.close();
        active.subscriptions.dispose();
        active.task.abort();
    }

    fn install_listeners(
        &self,
        scope: &ScopeState,
        tx: &mpsc::UnboundedSender<Input>,
    ) -> SubscriptionSet {
        let mut subscriptions = SubscriptionSet::new();

        let installs: Vec<(&str, PushResult<ListenerHandle>)> = vec![
            ("session", {
                let (tx, scope) = (tx.clone(), scope.clone());
                self.session.on_change(Box::new(move |session| {
                    forward(&scope, &tx, Input::SessionChanged(session));
                }))
            }),
            ("router", {
                let (tx, scope) = (tx.clone(), scope.clone());
                self.router.on_ready_change(Box::new(move |ready| {
                    forward(&scope, &tx, Input::RouterReady(ready));
                }))
            }),
            ("app_state", {
                let (tx, scope) = (tx.clone(), scope.clone());
                self.lifecycle.on_change(Box::new(move |state| {
                    forward(&scope, &tx, Input::AppStateChanged(state));
                }))
            }),
            ("live_tap", {
                let (tx, scope) = (tx.clone(), scope.clone());
                self.platform.on_notification_tapped(Box::new(move |response| {
                    forward(&scope, &tx, Input::Delivery(Delivery::LiveTap(response)));
                }))
            }),
            ("foreground_message", {
                let (tx, scope) = (tx.clone(), scope.clone());
                self.platform.on_foreground_message(Box::new(move |message| {
                    forward(&scope, &tx, Input::Delivery(Delivery::ForegroundData(message)));
                }))
            }),
            (
                "token_rotation",
                self.token_manager.on_token_rotated(scope.clone()),
            ),
        ];

        for (name, result) in installs {
            match result {
                Ok(handle) => subscriptions.insert(handle),
                Err(e) => log::warn!("Listener {} not installed: {}", name, e),
            }
        }
        subscriptions
    }

    pub fn gate_state(&self) -> GateState {
        lock_recover(&self.gate).state()
    }

    pub fn pending_target(&self) -> Option<PendingNavigationTarget> {
        lock_recover(&self.gate).pending().cloned()
    }

    pub fn unread(&self) -> UnreadCount {
        self.unread.current()
    }

    pub fn unread_counter(&self) -> &UnreadCounter {
        &self.unread
    }

    pub fn inbox(&self) -> Arc<NotificationInbox> {
        Arc::clone(&self.inbox)
    }

    pub fn token_manager(&self) -> Arc<TokenLifecycleManager> {
        Arc::clone(&self.token_manager)
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<CoreEvent> {
        self.broadcaster.subscribe()
    }
}

impl Drop for NotificationCoordinator {
    fn drop(&mut self) {
        self.deactivate();
    }
}

fn forward(scope: &ScopeState, tx: &mpsc::UnboundedSender<Input>, input: Input) {
    if !scope.is_alive() {
        return;
    }
    if tx.send(input).is_err() {
        log::debug!("Coordinator loop stopped, dropping input");
    }
}

/// State moved into the spawned loop task
struct EventLoop {
    scope: ScopeState,
    router: Arc<dyn Router>,
    platform: Arc<dyn MessagingPlatform>,
    token_manager: Arc<TokenLifecycleManager>,
    unread: UnreadCounter,
    inbox: Arc<NotificationInbox>,
    broadcaster: Arc<EventBroadcaster>,
    gate: Arc<Mutex<NavigationGate>>,
    normalizer: Arc<Mutex<DeliveryNormalizer>>,
    app_state: AppState,
}

impl EventLoop {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Input>) {
        while let Some(input) = rx.recv().await {
            if !self.scope.is_alive() {
                break;
            }
            match input {
                Input::Delivery(delivery) => self.on_delivery(delivery),
                Input::SessionChanged(session) => self.on_session(session),
                Input::RouterReady(ready) => {
                    let decision =
                        lock_recover(&self.gate).router_ready_changed(ready, Instant::now());
                    if let Some(decision) = decision {
                        self.apply(decision);
                    }
                }
                Input::AppStateChanged(state) => self.on_app_state(state),
            }
        }
        log::debug!("Coordinator loop for scope {} finished", self.scope.id());
    }

    fn on_delivery(&self, delivery: Delivery) {
        let Some(NormalizedDelivery { event, local_banner }) =
            lock_recover(&self.normalizer).normalize(delivery)
        else {
            return;
        };

        log::info!(
            "Notification received via {:?} (target: {:?})",
            event.source,
            event.target
        );
        self.broadcaster.broadcast(
            EVENT_NOTIFICATION_RECEIVED,
            NotificationReceivedPayload {
                source: event.source,
                target: event.target.clone(),
                received_at: event.received_at.to_rfc3339(),
            },
        );

        if !event.source.is_tap() {
            // Foreground messages are shown and stored, never navigated
            let stored = StoredNotification::from_event(&event);
            let (inbox, platform, scope) = (
                Arc::clone(&self.inbox),
                Arc::clone(&self.platform),
                self.scope.clone(),
            );
            tokio::spawn(async move {
                if let Some(stored) = stored {
                    if let Err(e) = inbox.record(stored).await {
                        log::warn!("Failed to store notification: {}", e);
                    }
                }
                if let Some(banner) = local_banner {
                    if !scope.is_alive() {
                        return;
                    }
                    if let Err(e) = platform.present_local(&banner).await {
                        log::warn!("Failed to present local notification: {}", e);
                    }
                }
            });
            return;
        }

        if let Some(id) = event.notification_id.clone() {
            let inbox = Arc::clone(&self.inbox);
            tokio::spawn(async move {
                if let Err(e) = inbox.mark_read(&id).await {
                    log::warn!("Failed to mark notification {} read: {}", id, e);
                }
            });
        }

        let Some(target) = event.target else {
            log::debug!("Tapped notification carries no target");
            return;
        };
        let decision = lock_recover(&self.gate).submit(target, Instant::now());
        self.apply(decision);
    }

    fn on_session(&self, session: Option<SessionHandle>) {
        let (appeared, decision) = {
            let mut gate = lock_recover(&self.gate);
            let had_session = gate.has_session();
            let decision = gate.session_changed(session, Instant::now());
            (!had_session && gate.has_session(), decision)
        };

        if let Some(decision) = decision {
            self.apply(decision);
        }
        if appeared {
            log::debug!("Session available, syncing push registration and unread count");
            self.spawn_refresh();
            self.spawn_registration();
        }
    }

    fn on_app_state(&mut self, state: AppState) {
        let previous = std::mem::replace(&mut self.app_state, state);
        if state != AppState::Active || previous == AppState::Active {
            return;
        }
        if !lock_recover(&self.gate).has_session() {
            return;
        }
        log::debug!("App returned to foreground with a session");
        self.spawn_refresh();
        self.spawn_registration();
    }

    fn apply(&self, decision: GateDecision) {
        match decision {
            GateDecision::Dispatch(target) => {
                log::info!("Navigating to {}", target);
                match self.router.push(&target) {
                    Ok(()) => {}
                    Err(PushError::Navigation(reason)) => {
                        log::warn!("No route for {}: {}", target, reason);
                    }
                    Err(e) => log::warn!("Navigation to {} failed: {}", target, e),
                }
                self.broadcaster
                    .broadcast(EVENT_NAVIGATION_DISPATCHED, NavigationPayload { target });
            }
            GateDecision::Queued(target) => {
                log::debug!("Navigation to {} deferred until session and router are ready", target);
                self.broadcaster
                    .broadcast(EVENT_NAVIGATION_QUEUED, NavigationPayload { target });
            }
            GateDecision::Suppressed(target) => {
                self.broadcaster
                    .broadcast(EVENT_NAVIGATION_SUPPRESSED, NavigationPayload { target });
            }
        }
    }

    fn spawn_refresh(&self) {
        let (unread, scope) = (self.unread.clone(), self.scope.clone());
        tokio::spawn(async move {
            unread.refresh(&scope).await;
        });
    }

    fn spawn_registration(&self) {
        let (manager, scope) = (Arc::clone(&self.token_manager), self.scope.clone());
        tokio::spawn(async move {
            manager.register_device(&scope).await;
        });
    }
}
