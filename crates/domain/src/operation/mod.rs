//! GraphQL operations as they travel through the exchange pipeline.
//!
//! An [`Operation`] is cheap to clone: the request payload is shared behind an
//! `Arc`, so stages that only touch the context (such as header stamping)
//! produce a new operation without copying the query or variables.

mod fetch_options;

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use fetch_options::{FetchOptions, FetchOptionsSource, Headers};

/// Kind of GraphQL operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    /// Read over HTTP.
    Query,
    /// Write over HTTP.
    Mutation,
    /// Live results over the WebSocket connection.
    Subscription,
}

impl OperationKind {
    /// Lowercase name as used in logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Mutation => "mutation",
            Self::Subscription => "subscription",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a query interacts with the document cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RequestPolicy {
    /// Answer from cache when possible, otherwise fetch.
    CacheFirst,
    /// Answer from cache only; never fetch.
    CacheOnly,
    /// Always fetch; refresh the cache.
    NetworkOnly,
    /// Always fetch; refresh the cache.
    #[default]
    CacheAndNetwork,
}

/// Stable identity of a request: hash of query text and variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperationKey(u64);

impl OperationKey {
    /// Computes the key for a query and its variables.
    #[must_use]
    pub fn compute(query: &str, variables: &serde_json::Value) -> Self {
        let mut hasher = DefaultHasher::new();
        query.trim().hash(&mut hasher);
        // serde_json maps are ordered, so the rendering is stable.
        variables.to_string().hash(&mut hasher);
        Self(hasher.finish())
    }

    /// Raw key value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for OperationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// The GraphQL payload of an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphQLRequest {
    /// Stable key derived from query and variables.
    pub key: OperationKey,
    /// Query document text.
    pub query: String,
    /// Variables (`null` when none).
    pub variables: serde_json::Value,
    /// Operation to run when the document holds several.
    pub operation_name: Option<String>,
}

impl GraphQLRequest {
    /// Creates a request and computes its key.
    #[must_use]
    pub fn new(query: impl Into<String>, variables: serde_json::Value) -> Self {
        let query = query.into();
        let key = OperationKey::compute(&query, &variables);
        Self {
            key,
            query,
            variables,
            operation_name: None,
        }
    }

    /// Sets the operation name.
    #[must_use]
    pub fn with_operation_name(mut self, name: impl Into<String>) -> Self {
        self.operation_name = Some(name.into());
        self
    }

    /// Wire body: `{query, variables, operationName}`.
    #[must_use]
    pub fn body(&self) -> serde_json::Value {
        let mut body = serde_json::Map::new();
        body.insert("query".to_string(), self.query.clone().into());
        if !self.variables.is_null() {
            body.insert("variables".to_string(), self.variables.clone());
        }
        if let Some(name) = &self.operation_name {
            body.insert("operationName".to_string(), name.clone().into());
        }
        serde_json::Value::Object(body)
    }
}

/// Per-operation transport settings.
#[derive(Debug, Clone)]
pub struct OperationContext {
    /// HTTP endpoint the operation is sent to.
    pub url: Arc<str>,
    /// Cache interaction for queries.
    pub request_policy: RequestPolicy,
    /// Caller-supplied fetch options.
    pub fetch_options: Option<FetchOptionsSource>,
}

impl OperationContext {
    /// Context for an endpoint with default policy and no options.
    #[must_use]
    pub fn new(url: impl Into<Arc<str>>) -> Self {
        Self {
            url: url.into(),
            request_policy: RequestPolicy::default(),
            fetch_options: None,
        }
    }

    /// Normalized fetch options; empty when none were supplied.
    #[must_use]
    pub fn resolved_fetch_options(&self) -> FetchOptions {
        self.fetch_options
            .as_ref()
            .map(FetchOptionsSource::resolve)
            .unwrap_or_default()
    }
}

/// A single outgoing GraphQL request.
#[derive(Debug, Clone)]
pub struct Operation {
    /// Query, mutation or subscription.
    pub kind: OperationKind,
    /// Shared payload.
    pub request: Arc<GraphQLRequest>,
    /// Transport settings.
    pub context: OperationContext,
}

impl Operation {
    /// Creates an operation.
    #[must_use]
    pub fn new(kind: OperationKind, request: GraphQLRequest, context: OperationContext) -> Self {
        Self {
            kind,
            request: Arc::new(request),
            context,
        }
    }

    /// The request key.
    #[must_use]
    pub fn key(&self) -> OperationKey {
        self.request.key
    }

    /// Copy of this operation with a different context.
    ///
    /// The payload is shared with `self`.
    #[must_use]
    pub fn with_context(&self, context: OperationContext) -> Self {
        Self {
            kind: self.kind,
            request: Arc::clone(&self.request),
            context,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_key_depends_on_query_and_variables() {
        let a = GraphQLRequest::new("query { me { id } }", json!({"a": 1}));
        let b = GraphQLRequest::new("query { me { id } }", json!({"a": 1}));
        let c = GraphQLRequest::new("query { me { id } }", json!({"a": 2}));
        assert_eq!(a.key, b.key);
        assert_ne!(a.key, c.key);
    }

    #[test]
    fn test_body_shape() {
        let request = GraphQLRequest::new("query Me { me { id } }", serde_json::Value::Null)
            .with_operation_name("Me");
        assert_eq!(
            request.body(),
            json!({"query": "query Me { me { id } }", "operationName": "Me"})
        );
    }

    #[test]
    fn test_with_context_shares_payload() {
        let op = Operation::new(
            OperationKind::Query,
            GraphQLRequest::new("{ a }", serde_json::Value::Null),
            OperationContext::new("https://api.example.com/graphql"),
        );
        let moved = op.with_context(OperationContext::new("https://other.example.com/graphql"));
        assert!(Arc::ptr_eq(&op.request, &moved.request));
        assert_eq!(&*op.context.url, "https://api.example.com/graphql");
    }

    #[test]
    fn test_request_policy_serde() {
        let policy: RequestPolicy = serde_json::from_str("\"cache-and-network\"").unwrap();
        assert_eq!(policy, RequestPolicy::CacheAndNetwork);
        assert_eq!(RequestPolicy::default(), RequestPolicy::CacheAndNetwork);
    }
}
