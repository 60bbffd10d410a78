//! Durable copy of the last registered push token
//!
//! The stored value is what registration idempotence is keyed on: a token
//! equal to the stored one is never sent to the registry again.

use crate::collaborators::KeyValueStore;
use crate::error::{PushError, PushResult};
use crate::utils::redact_token;
use std::sync::Arc;

/// Persists the last-known push token
#[derive(Clone)]
pub struct TokenStore {
    storage: Arc<dyn KeyValueStore>,
    key: String,
}

impl TokenStore {
    pub fn new(storage: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
        }
    }

    /// Read the persisted token.
    ///
    /// Storage failures are logged and read as "no previous token", which at
    /// worst costs one redundant registration.
    pub async fn read(&self) -> Option<String> {
        match self.storage.get(&self.key).await {
            Ok(Some(value)) if !value.is_empty() => Some(value),
            Ok(_) => None,
            Err(e) => {
                log::warn!("Failed to read stored push token, treating as absent: {}", e);
                None
            }
        }
    }

    /// Persist a new token value
    pub async fn write(&self, value: &str) -> PushResult<()> {
        if value.trim().is_empty() {
            return Err(PushError::InvalidToken);
        }
        self.storage.set(&self.key, value).await?;
        log::debug!("Stored push token {}", redact_token(value));
        Ok(())
    }
}
