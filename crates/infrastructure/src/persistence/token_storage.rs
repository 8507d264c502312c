//! Token storage adapters.
//!
//! [`FileTokenStorage`] keeps a JSON object of key/value pairs in the
//! platform data directory:
//! - Linux: ~/.local/share/authlink/storage.json
//! - macOS: ~/Library/Application Support/authlink/storage.json
//! - Windows: %APPDATA%/authlink/storage.json

use std::collections::{BTreeMap, HashMap};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use authlink_application::ports::{StorageError, TokenStorage};
use parking_lot::Mutex;
use tokio::fs;

type StoredItems = BTreeMap<String, String>;

/// Process-local storage.
#[derive(Debug, Default)]
pub struct MemoryTokenStorage {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryTokenStorage {
    /// Creates empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStorage for MemoryTokenStorage {
    async fn get_item(&self, key: &str) -> Option<String> {
        self.items.lock().get(key).cloned()
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.items.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.items.lock().remove(key);
        Ok(())
    }
}

/// Storage persisted as a JSON file.
///
/// The file is read on every access, so values written by another process
/// are visible. Writes are serialized within the process and replace the
/// file atomically.
#[derive(Debug)]
pub struct FileTokenStorage {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl FileTokenStorage {
    /// Storage backed by `path`; the file is created on first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Storage in the platform data directory, if one exists.
    #[must_use]
    pub fn default_location() -> Option<Self> {
        dirs::data_dir().map(|dir| Self::new(dir.join("authlink").join("storage.json")))
    }

    /// The backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<StoredItems, StorageError> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(StoredItems::new()),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&bytes).map_err(|e| StorageError::Serialization(e.to_string()))
    }

    async fn save(&self, items: &StoredItems) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut content = serde_json::to_vec_pretty(items)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        content.push(b'\n');

        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, content).await?;
        fs::rename(&staging, &self.path).await?;
        Ok(())
    }

    async fn update(&self, apply: impl FnOnce(&mut StoredItems) + Send) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        let mut items = match self.load().await {
            Ok(items) => items,
            Err(StorageError::Serialization(message)) => {
                tracing::warn!(path = %self.path.display(), %message, "replacing unreadable token storage");
                StoredItems::new()
            }
            Err(e) => return Err(e),
        };
        apply(&mut items);
        self.save(&items).await
    }
}

#[async_trait]
impl TokenStorage for FileTokenStorage {
    async fn get_item(&self, key: &str) -> Option<String> {
        match self.load().await {
            Ok(mut items) => items.remove(key),
            Err(error) => {
                tracing::debug!(path = %self.path.display(), %error, "token storage unreadable");
                None
            }
        }
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.update(|items| {
            items.insert(key.to_string(), value.to_string());
        })
        .await
    }

    async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.update(|items| {
            items.remove(key);
        })
        .await
    }
}
