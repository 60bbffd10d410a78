// Utility functions

use std::sync::{Mutex, MutexGuard};

/// Acquire a mutex, recovering the data if a previous holder panicked.
///
/// State guarded here (gate, normalizer, counters) stays consistent across
/// a panic because every mutation is a single assignment.
pub fn lock_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        log::warn!("Recovering poisoned mutex");
        poisoned.into_inner()
    })
}

/// Shorten a push token for log output
pub fn redact_token(token: &str) -> String {
    let prefix: String = token.chars().take(8).collect();
    if prefix.len() < token.len() {
        format!("{}…", prefix)
    } else {
        prefix
    }
}
