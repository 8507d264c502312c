//! GraphQL and combined error types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Extension code the backend uses for authorization failures.
pub const FORBIDDEN_CODE: &str = "FORBIDDEN";

/// Source location of a GraphQL error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorLocation {
    /// 1-based line.
    pub line: u32,
    /// 1-based column.
    pub column: u32,
}

/// One entry of a response's `errors` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GraphQLError {
    /// Human-readable message.
    #[serde(default)]
    pub message: String,
    /// Locations in the query document.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<ErrorLocation>,
    /// Path to the failing field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<serde_json::Value>>,
    /// Server-defined extensions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<serde_json::Map<String, serde_json::Value>>,
}

impl GraphQLError {
    /// Error with only a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    /// Sets `extensions.code`.
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.extensions
            .get_or_insert_with(serde_json::Map::new)
            .insert("code".to_string(), serde_json::Value::String(code.into()));
        self
    }

    /// `extensions.code`, when it is a string.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.extensions
            .as_ref()
            .and_then(|extensions| extensions.get("code"))
            .and_then(serde_json::Value::as_str)
    }
}

/// Network and GraphQL failures of one result, combined.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CombinedError {
    /// Transport-level failure, if any.
    pub network_error: Option<String>,
    /// Errors reported in the response body.
    pub graphql_errors: Vec<GraphQLError>,
    /// HTTP status of the response, when one was received.
    pub status: Option<u16>,
}

impl CombinedError {
    /// A transport failure.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            network_error: Some(message.into()),
            ..Self::default()
        }
    }

    /// Errors from a response body.
    #[must_use]
    pub fn graphql(errors: Vec<GraphQLError>) -> Self {
        Self {
            graphql_errors: errors,
            ..Self::default()
        }
    }

    /// Sets the HTTP status.
    #[must_use]
    pub const fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Returns true when there is nothing to report.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.network_error.is_none() && self.graphql_errors.is_empty()
    }

    /// One line per failure: `[Network] ...` first, then `[GraphQL] ...`.
    #[must_use]
    pub fn message(&self) -> String {
        let network = self
            .network_error
            .iter()
            .map(|message| format!("[Network] {message}"));
        let graphql = self
            .graphql_errors
            .iter()
            .map(|error| format!("[GraphQL] {}", error.message));
        network.chain(graphql).collect::<Vec<_>>().join("\n")
    }
}

impl fmt::Display for CombinedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

impl std::error::Error for CombinedError {}
