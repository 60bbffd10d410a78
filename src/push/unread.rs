//! Cached unread-information count
//!
//! Refreshed from the backend when a session appears and when the app comes
//! to the foreground with a session. The cached value is only ever replaced
//! wholesale by a successful fetch; a failed fetch keeps the previous value.

use crate::collaborators::UnreadCountSource;
use crate::events::{EventBroadcaster, UnreadChangedPayload, EVENT_UNREAD_CHANGED};
use crate::scope::ScopeState;
use crate::utils::lock_recover;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadCount {
    pub value: u32,
    /// `None` until the first successful refresh
    pub last_refreshed_at: Option<DateTime<Utc>>,
}

/// Result of a refresh attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Updated(u32),
    /// A newer refresh already landed; this reply was ignored
    Stale,
    /// Fetch failed; the previous value was kept
    Failed,
    /// Scope closed while the fetch was in flight
    Discarded,
}

#[derive(Debug, Default)]
struct CounterState {
    count: UnreadCount,
    issued: u64,
    applied: u64,
}

#[derive(Clone)]
pub struct UnreadCounter {
    source: Arc<dyn UnreadCountSource>,
    state: Arc<Mutex<CounterState>>,
    broadcaster: Option<Arc<EventBroadcaster>>,
}

impl UnreadCounter {
    pub fn new(source: Arc<dyn UnreadCountSource>) -> Self {
        Self {
            source,
            state: Arc::new(Mutex::new(CounterState::default())),
            broadcaster: None,
        }
    }

    pub fn with_broadcaster(mut self, broadcaster: Arc<EventBroadcaster>) -> Self {
        self.broadcaster = Some(broadcaster);
        self
    }

    pub fn current(&self) -> UnreadCount {
        lock_recover(&self.state).count.clone()
    }

    pub fn value(&self) -> u32 {
        lock_recover(&self.state).count.value
    }

    /// Fetch the remote count and replace the cached value.
    ///
    /// Replies are applied in issue order: a reply older than one already
    /// applied is dropped, so overlapping refreshes never regress the value.
    pub async fn refresh(&self, scope: &ScopeState) -> RefreshOutcome {
        let generation = {
            let mut state = lock_recover(&self.state);
            state.issued += 1;
            state.issued
        };

        let fetched = self.source.fetch().await;

        if !scope.is_alive() {
            log::debug!("Scope closed during unread fetch, discarding result");
            return RefreshOutcome::Discarded;
        }

        let value = match fetched {
            Ok(value) => value,
            Err(e) => {
                log::warn!("Error getting unread count, keeping previous value: {}", e);
                return RefreshOutcome::Failed;
            }
        };

        let count = {
            let mut state = lock_recover(&self.state);
            if generation < state.applied {
                log::debug!("Ignoring stale unread count reply #{}", generation);
                return RefreshOutcome::Stale;
            }
            state.applied = generation;
            state.count = UnreadCount {
                value,
                last_refreshed_at: Some(Utc::now()),
            };
            state.count.clone()
        };

        log::debug!("Unread count refreshed: {}", count.value);
        if let Some(broadcaster) = &self.broadcaster {
            broadcaster.broadcast(
                EVENT_UNREAD_CHANGED,
                UnreadChangedPayload {
                    value: count.value,
                    last_refreshed_at: count
                        .last_refreshed_at
                        .map(|t| t.to_rfc3339())
                        .unwrap_or_default(),
                },
            );
        }
        RefreshOutcome::Updated(value)
    }
}
