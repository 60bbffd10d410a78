// Liveness guard for an activated coordinator scope
//
// Every asynchronous continuation (registration, fetches, mount queries)
// checks the guard before mutating state, so a result that lands after
// teardown is a no-op.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

/// Shared "is this scope still alive" flag
#[derive(Debug, Clone)]
pub struct ScopeState {
    id: u64,
    alive: Arc<AtomicBool>,
}

impl ScopeState {
    /// Create a new, live scope
    pub fn new() -> Self {
        Self {
            id: NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed),
            alive: Arc::new(AtomicBool::new(true)),
        }
    }

    /// A scope that is already closed (used when nothing is mounted)
    pub fn closed() -> Self {
        let scope = Self::new();
        scope.alive.store(false, Ordering::SeqCst);
        scope
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Check if the owning scope is still mounted
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Close the scope. Returns false if it was already closed.
    pub fn close(&self) -> bool {
        let was_alive = self.alive.swap(false, Ordering::SeqCst);
        if was_alive {
            log::debug!("Scope {} closed", self.id);
        }
        was_alive
    }

    /// Run `apply` only while the scope is alive
    pub fn guard<T>(&self, what: &str, apply: impl FnOnce() -> T) -> Option<T> {
        if self.is_alive() {
            Some(apply())
        } else {
            log::debug!("Discarding {} after scope {} closed", what, self.id);
            None
        }
    }
}

impl Default for ScopeState {
    fn default() -> Self {
        Self::new()
    }
}
