//! Subscription forwarding port

use authlink_domain::{ExecutionResult, Operation, WebSocketError};
use futures_util::stream::BoxStream;

/// Live results of one subscription as delivered by the connection.
pub type ExecutionStream = BoxStream<'static, Result<ExecutionResult, SubscriptionError>>;

/// Errors that can occur on the subscription connection.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SubscriptionError {
    /// The WebSocket connection failed.
    #[error(transparent)]
    WebSocket(#[from] WebSocketError),

    /// Subscriptions are not configured for this client.
    #[error("subscriptions are not available")]
    Unavailable,
}

/// Port for the persistent subscription connection.
pub trait SubscriptionForwarder: Send + Sync {
    /// Starts a subscription; dropping the stream stops it.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection can no longer accept operations.
    fn forward(&self, operation: &Operation) -> Result<ExecutionStream, SubscriptionError>;
}
