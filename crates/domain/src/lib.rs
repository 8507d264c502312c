//! Authlink Domain - Core types
//!
//! This crate defines the domain model for the authlink GraphQL auth layer:
//! authentication state, credentials, operations, results and settings.
//! All types here are pure Rust with no I/O dependencies.

pub mod auth;
pub mod error;
pub mod operation;
pub mod response;
pub mod settings;
pub mod websocket;

pub use auth::{AuthHeader, AuthenticationState, Credential, PublicRole};
pub use error::{DomainError, DomainResult};
pub use operation::{
    FetchOptions, FetchOptionsSource, GraphQLRequest, Headers, Operation, OperationContext,
    OperationKey, OperationKind, RequestPolicy,
};
pub use response::{CombinedError, ExecutionResult, GraphQLError, OperationResult};
pub use settings::{ClientSettings, SubscriptionSettings};
pub use websocket::{
    ConnectionParams, ConnectionState, SubscriptionConfig, WebSocketError, websocket_uri,
};
