// Navigation gate state machine
//
// Decides whether a deep-link target is dispatched now, queued until a
// session and a router exist, or suppressed as a duplicate. Driven only by
// current state, never by which delivery path produced the target.

use crate::collaborators::SessionHandle;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

/// Gate state derived from session presence and router readiness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateState {
    NoSession,
    SessionNoRouter,
    Ready,
}

/// Target waiting for authentication and a router. At most one exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingNavigationTarget {
    pub target: String,
    pub queued_at: DateTime<Utc>,
}

/// Same-target dispatch lock
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavigationDebounce {
    pub last_dispatched_target: Option<String>,
    pub locked_until: Option<Instant>,
}

impl NavigationDebounce {
    /// True while `target` may not be dispatched again
    pub fn is_locked(&self, target: &str, now: Instant) -> bool {
        self.last_dispatched_target.as_deref() == Some(target)
            && self.locked_until.map_or(false, |until| now < until)
    }
}

/// What the gate decided for a target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Call `Router::push` with this target now
    Dispatch(String),
    /// Stored as the pending target
    Queued(String),
    /// Dropped by the debounce lock
    Suppressed(String),
}

#[derive(Debug)]
pub struct NavigationGate {
    session: Option<SessionHandle>,
    router_ready: bool,
    pending: Option<PendingNavigationTarget>,
    debounce: NavigationDebounce,
    window: Duration,
    discard_pending_on_user_change: bool,
    last_user: Option<String>,
}

impl NavigationGate {
    pub fn new(window: Duration) -> Self {
        Self {
            session: None,
            router_ready: false,
            pending: None,
            debounce: NavigationDebounce::default(),
            window,
            discard_pending_on_user_change: false,
            last_user: None,
        }
    }

    /// Drop a pending target when a different user signs in
    pub fn with_user_scoped_pending(mut self, enabled: bool) -> Self {
        self.discard_pending_on_user_change = enabled;
        self
    }

    pub fn state(&self) -> GateState {
        match (self.session.is_some(), self.router_ready) {
            (false, _) => GateState::NoSession,
            (true, false) => GateState::SessionNoRouter,
            (true, true) => GateState::Ready,
        }
    }

    pub fn pending(&self) -> Option<&PendingNavigationTarget> {
        self.pending.as_ref()
    }

    pub fn debounce(&self) -> &NavigationDebounce {
        &self.debounce
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    /// Submit an incoming target
    pub fn submit(&mut self, target: String, now: Instant) -> GateDecision {
        match self.state() {
            GateState::NoSession | GateState::SessionNoRouter => {
                if let Some(previous) = &self.pending {
                    log::debug!("Pending target {} replaced by {}", previous.target, target);
                }
                self.pending = Some(PendingNavigationTarget {
                    target: target.clone(),
                    queued_at: Utc::now(),
                });
                GateDecision::Queued(target)
            }
            GateState::Ready => self.dispatch_or_suppress(target, now),
        }
    }

    /// Session collaborator reported a change. Returns the decision for a
    /// pending target flushed by entering `Ready`.
    pub fn session_changed(
        &mut self,
        session: Option<SessionHandle>,
        now: Instant,
    ) -> Option<GateDecision> {
        let before = self.state();

        if let Some(handle) = &session {
            if self.discard_pending_on_user_change {
                let switched = self
                    .last_user
                    .as_deref()
                    .map_or(false, |previous| previous != handle.user_id);
                if switched {
                    if let Some(dropped) = self.pending.take() {
                        log::info!("Different user signed in, dropping pending target {}", dropped.target);
                    }
                }
            }
            self.last_user = Some(handle.user_id.clone());
        }

        // Session loss keeps the pending target so a re-login resumes it
        self.session = session;
        self.after_transition(before, now)
    }

    /// Router collaborator reported readiness
    pub fn router_ready_changed(&mut self, ready: bool, now: Instant) -> Option<GateDecision> {
        let before = self.state();
        self.router_ready = ready;
        self.after_transition(before, now)
    }

    fn after_transition(&mut self, before: GateState, now: Instant) -> Option<GateDecision> {
        let after = self.state();
        if before != after {
            log::debug!("Navigation gate {:?} -> {:?}", before, after);
        }
        if before != GateState::Ready && after == GateState::Ready {
            let pending = self.pending.take()?;
            return Some(self.dispatch_or_suppress(pending.target, now));
        }
        None
    }

    fn dispatch_or_suppress(&mut self, target: String, now: Instant) -> GateDecision {
        if self.debounce.is_locked(&target, now) {
            log::debug!("Suppressing repeated navigation to {}", target);
            return GateDecision::Suppressed(target);
        }
        self.debounce = NavigationDebounce {
            last_dispatched_target: Some(target.clone()),
            locked_until: Some(now + self.window),
        };
        GateDecision::Dispatch(target)
    }
}
