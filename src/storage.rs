//! Key-value store implementations
//!
//! `MemoryStore` is process-lifetime only. `FileStore` keeps all entries in
//! a single JSON file written atomically (temp file + rename), which is what
//! the core needs for the push token and the notification inbox.

use crate::collaborators::KeyValueStore;
use crate::error::{PushError, PushResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// In-memory store
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(key: &str, value: &str) -> Self {
        let store = Self::new();
        crate::utils::lock_recover(&store.entries).insert(key.to_string(), value.to_string());
        store
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> PushResult<Option<String>> {
        Ok(crate::utils::lock_recover(&self.entries).get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> PushResult<()> {
        crate::utils::lock_recover(&self.entries).insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> PushResult<()> {
        crate::utils::lock_recover(&self.entries).remove(key);
        Ok(())
    }
}

/// Get the default directory for persisted push state (~/.attendance-push)
pub fn default_storage_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".attendance-push")
}

/// Ensure a directory exists, creating it if necessary
fn ensure_dir(path: &Path) -> PushResult<()> {
    if !path.exists() {
        fs::create_dir_all(path).map_err(|e| {
            PushError::Storage(format!("Failed to create directory {:?}: {}", path, e))
        })?;
    }
    Ok(())
}

/// Write content atomically (temp file + rename)
fn atomic_write(path: &Path, content: &str) -> PushResult<()> {
    let temp_path = path.with_extension("tmp");

    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }

    fs::write(&temp_path, content).map_err(|e| {
        PushError::Storage(format!("Failed to write temp file {:?}: {}", temp_path, e))
    })?;

    fs::rename(&temp_path, path).map_err(|e| {
        PushError::Storage(format!("Failed to rename {:?} to {:?}: {}", temp_path, path, e))
    })?;

    Ok(())
}

/// JSON-file backed store
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    // Serialises read-modify-write cycles on the file
    lock: tokio::sync::Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Store at ~/.attendance-push/store.json
    pub fn open_default() -> Self {
        Self::new(default_storage_dir().join("store.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> PushResult<HashMap<String, String>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let content = fs::read_to_string(&self.path).map_err(|e| {
            PushError::Storage(format!("Failed to read file {:?}: {}", self.path, e))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            PushError::Storage(format!("Failed to parse JSON from {:?}: {}", self.path, e))
        })
    }

    fn save(&self, entries: &HashMap<String, String>) -> PushResult<()> {
        let content = serde_json::to_string_pretty(entries)?;
        atomic_write(&self.path, &content)
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> PushResult<Option<String>> {
        let _guard = self.lock.lock().await;
        Ok(self.load()?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> PushResult<()> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load()?;
        entries.insert(key.to_string(), value.to_string());
        self.save(&entries)?;
        log::trace!("Stored key {} in {:?}", key, self.path);
        Ok(())
    }

    async fn remove(&self, key: &str) -> PushResult<()> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load()?;
        if entries.remove(key).is_some() {
            self.save(&entries)?;
        }
        Ok(())
    }
}
