// Configuration for the push notification core
//
// Loaded from ~/.attendance-push/config.toml (or an explicit path).
// Every field has a default so a missing or partial file is fine.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Importance level for the Android notification channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelImportance {
    Min,
    Low,
    Default,
    High,
    Max,
}

/// Android notification channel created before requesting permission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    pub id: String,
    pub name: String,
    pub importance: ChannelImportance,
    pub vibration_pattern: Vec<u64>,
    pub light_color: String,
    pub sound: String,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            id: "default".to_string(),
            name: "default".to_string(),
            importance: ChannelImportance::Max,
            vibration_pattern: vec![0, 250, 250, 250],
            light_color: "#FF231F7C".to_string(),
            sound: "default".to_string(),
        }
    }
}

/// Backend endpoint paths, relative to the configured API host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub register_path: String,
    pub refresh_path: String,
    pub unread_path: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            register_path: "/devices/register".to_string(),
            refresh_path: "/devices/refresh-token".to_string(),
            unread_path: "/informations/count-unread".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PushConfig {
    /// Same-target dispatches inside this window are dropped
    pub debounce_window_ms: u64,
    /// Data keys searched (in order) for the deep-link target
    pub target_keys: Vec<String>,
    /// Storage key holding the last registered push token
    pub token_storage_key: String,
    /// Storage key holding the local notification inbox
    pub inbox_storage_key: String,
    /// Maximum number of notifications kept in the inbox
    pub inbox_capacity: usize,
    /// Drop a pending target when a different user signs in
    pub discard_pending_on_user_change: bool,
    pub android_channel: ChannelConfig,
    pub api: ApiConfig,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            debounce_window_ms: 800,
            target_keys: vec!["target".to_string(), "targetScreen".to_string()],
            token_storage_key: "push_token".to_string(),
            inbox_storage_key: "@notifications_storage".to_string(),
            inbox_capacity: 100,
            discard_pending_on_user_change: false,
            android_channel: ChannelConfig::default(),
            api: ApiConfig::default(),
        }
    }
}

impl PushConfig {
    /// Get the default config file path (~/.attendance-push/config.toml)
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|p| p.join(".attendance-push").join("config.toml"))
    }

    /// Load config from the default location, falling back to defaults
    pub fn load() -> Result<Self> {
        let path =
            Self::default_path().ok_or_else(|| anyhow!("Could not determine home directory"))?;
        Self::load_from(&path)
    }

    /// Load config from an explicit path. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No push config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| anyhow!("Failed to read config file '{}': {}", path.display(), e))?;

        let config: PushConfig = toml::from_str(&contents)
            .map_err(|e| anyhow!("Failed to parse config file '{}': {}", path.display(), e))?;

        config.validate()?;
        log::info!("Loaded push config from: {}", path.display());
        Ok(config)
    }

    /// Reject values that would make the core misbehave
    pub fn validate(&self) -> Result<()> {
        if self.target_keys.iter().all(|k| k.trim().is_empty()) {
            return Err(anyhow!("target_keys must contain at least one key"));
        }
        if self.token_storage_key.is_empty() || self.inbox_storage_key.is_empty() {
            return Err(anyhow!("storage keys must not be empty"));
        }
        if self.token_storage_key == self.inbox_storage_key {
            return Err(anyhow!("token and inbox storage keys must differ"));
        }
        Ok(())
    }

    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_window_ms)
    }
}
