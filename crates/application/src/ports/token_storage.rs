//! Persisted token storage port
//!
//! Mirrors a browser's key-value storage. Hosts without such storage (server
//! side rendering, headless jobs) use [`NoopTokenStorage`], which reports
//! every key as absent.

use async_trait::async_trait;

/// Key under which the refresh token is persisted.
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// Errors that can occur when writing to token storage.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Key-value storage for persisted tokens.
///
/// Reads never fail: storage that is unavailable or unreadable reports the
/// key as absent.
#[async_trait]
pub trait TokenStorage: Send + Sync {
    /// Reads a value.
    async fn get_item(&self, key: &str) -> Option<String>;

    /// Writes a value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be persisted.
    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removes a value.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage cannot be updated.
    async fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

/// Storage for environments without persistence; nothing is ever stored.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTokenStorage;

#[async_trait]
impl TokenStorage for NoopTokenStorage {
    async fn get_item(&self, _key: &str) -> Option<String> {
        None
    }

    async fn set_item(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Ok(())
    }

    async fn remove_item(&self, _key: &str) -> Result<(), StorageError> {
        Ok(())
    }
}
