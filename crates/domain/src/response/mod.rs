//! Results of GraphQL operations.

mod error;

use serde::{Deserialize, Serialize};

use crate::operation::Operation;

pub use error::{CombinedError, ErrorLocation, FORBIDDEN_CODE, GraphQLError};

/// Response body as returned by a GraphQL server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ExecutionResult {
    /// Result data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// Reported errors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<GraphQLError>>,
    /// Server extensions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<serde_json::Value>,
}

/// Result delivered to the caller of an operation.
#[derive(Debug, Clone)]
pub struct OperationResult {
    /// The operation this result answers.
    pub operation: Operation,
    /// Result data.
    pub data: Option<serde_json::Value>,
    /// Failures, if any.
    pub error: Option<CombinedError>,
    /// Server extensions.
    pub extensions: Option<serde_json::Value>,
    /// Served from the document cache.
    pub from_cache: bool,
}

impl OperationResult {
    /// Builds a result from a response body; an HTTP status is attached to the
    /// error when there is one.
    #[must_use]
    pub fn from_execution(
        operation: Operation,
        result: ExecutionResult,
        status: Option<u16>,
    ) -> Self {
        let errors = result.errors.unwrap_or_default();
        let error = if errors.is_empty() {
            None
        } else {
            let combined = CombinedError::graphql(errors);
            Some(match status {
                Some(status) => combined.with_status(status),
                None => combined,
            })
        };
        Self {
            operation,
            data: result.data,
            error,
            extensions: result.extensions,
            from_cache: false,
        }
    }

    /// A result carrying only an error.
    #[must_use]
    pub const fn from_error(operation: Operation, error: CombinedError) -> Self {
        Self {
            operation,
            data: None,
            error: Some(error),
            extensions: None,
            from_cache: false,
        }
    }

    /// Returns true when the result has no error.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.error.as_ref().is_none_or(CombinedError::is_empty)
    }
}
