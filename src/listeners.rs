//! Listener handles and the subscription set owned by an active scope
//!
//! Platform and collaborator subscriptions hand back a [`ListenerHandle`].
//! The coordinator collects them in one [`SubscriptionSet`] created on
//! activation and disposed as a unit on deactivation.

use std::fmt;

type Unsubscribe = Box<dyn FnOnce() + Send>;

/// Handle for an installed listener. Dropping it unsubscribes.
pub struct ListenerHandle {
    name: String,
    unsubscribe: Option<Unsubscribe>,
}

impl ListenerHandle {
    pub fn new(name: impl Into<String>, unsubscribe: impl FnOnce() + Send + 'static) -> Self {
        Self {
            name: name.into(),
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }

    /// A handle with nothing to tear down
    pub fn noop(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            unsubscribe: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Remove the listener now
    pub fn remove(mut self) {
        self.run_unsubscribe();
    }

    fn run_unsubscribe(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
            log::trace!("Removed listener {}", self.name);
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.run_unsubscribe();
    }
}

impl fmt::Debug for ListenerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerHandle")
            .field("name", &self.name)
            .field("installed", &self.unsubscribe.is_some())
            .finish()
    }
}

/// All listeners belonging to one activation
#[derive(Debug, Default)]
pub struct SubscriptionSet {
    handles: Vec<ListenerHandle>,
}

impl SubscriptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, handle: ListenerHandle) {
        self.handles.push(handle);
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Names of the listeners currently installed
    pub fn names(&self) -> Vec<&str> {
        self.handles.iter().map(|h| h.name()).collect()
    }

    /// Remove every listener, most recently installed first
    pub fn dispose(&mut self) {
        let count = self.handles.len();
        while let Some(handle) = self.handles.pop() {
            handle.remove();
        }
        if count > 0 {
            log::debug!("Disposed {} listeners", count);
        }
    }
}

impl Drop for SubscriptionSet {
    fn drop(&mut self) {
        self.dispose();
    }
}
