//! HTTP transport port

use async_trait::async_trait;
use authlink_domain::{ExecutionResult, FetchOptions, Operation};

/// Everything needed to POST one operation.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    /// Endpoint URL.
    pub url: String,
    /// Normalized fetch options; headers are already stamped.
    pub options: FetchOptions,
    /// JSON body `{query, variables, operationName}`.
    pub body: serde_json::Value,
}

impl FetchRequest {
    /// Builds the request for an operation.
    #[must_use]
    pub fn from_operation(operation: &Operation) -> Self {
        Self {
            url: operation.context.url.to_string(),
            options: operation.context.resolved_fetch_options(),
            body: operation.request.body(),
        }
    }

    /// Headers to send, empty when none.
    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.options
            .headers
            .iter()
            .flatten()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }
}

/// A response whose body parsed as a GraphQL result.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Parsed body.
    pub body: ExecutionResult,
}

/// Errors that can occur while sending an operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The URL could not be parsed.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// The request did not complete in time.
    #[error("request timed out")]
    Timeout,

    /// No connection could be made.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Non-success status without a GraphQL body.
    #[error("HTTP {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Reason phrase or body excerpt.
        message: String,
    },

    /// The body was not a GraphQL result.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Anything else.
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// HTTP status, when the server answered.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Port for sending queries and mutations over HTTP.
///
/// The default adapter uses reqwest; hosts can supply their own.
#[async_trait]
pub trait GraphQLTransport: Send + Sync {
    /// Sends one operation.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is not a
    /// GraphQL result.
    async fn fetch(&self, request: FetchRequest) -> Result<TransportResponse, TransportError>;
}
