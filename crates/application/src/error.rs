//! Application error types

use authlink_domain::{DomainError, WebSocketError};
use thiserror::Error;

use crate::ports::{StorageError, SubscriptionError, TransportError};

/// Application-level errors.
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// A domain validation error occurred.
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),

    /// The HTTP transport could not be created or failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The subscription connection could not be used.
    #[error("subscription error: {0}")]
    Subscription(#[from] SubscriptionError),

    /// Token storage failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// The pipeline was assembled incorrectly.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl From<WebSocketError> for ApplicationError {
    fn from(error: WebSocketError) -> Self {
        Self::Subscription(SubscriptionError::from(error))
    }
}

/// Result type alias for application operations.
pub type ApplicationResult<T> = Result<T, ApplicationError>;
