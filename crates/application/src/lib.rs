//! Authlink Application - Auth policy, ports and the exchange pipeline
//!
//! This crate defines the application layer with:
//! - Port traits (identity provider, token storage, transport, subscriptions)
//! - Authorization policy (header stamping, credential resolution, auth-error
//!   classification, signed-in state publishing)
//! - The exchange pipeline and the GraphQL client built on it
//! - Application-level error handling

pub mod auth;
pub mod client;
pub mod error;
pub mod exchange;
pub mod ports;

#[cfg(test)]
mod test_support;

pub use auth::{
    AuthStateConsumer, AuthStatePublisher, AuthStatus, CredentialResolver, OperationAuthorizer,
    RefreshPolicy, authorize, is_auth_error,
};
pub use client::{ClientBuilder, GraphQLClient};
pub use error::{ApplicationError, ApplicationResult};
pub use exchange::{
    AuthExchange, AuthHooks, ErrorHandler, Exchange, Next, OperationOutcome, Pipeline,
    ProviderAuthHooks, ResultStream,
};
pub use ports::{
    AuthProviderError, AuthStateListener, AuthSubscription, ExecutionStream, FetchRequest,
    GraphQLTransport, IdentityProvider, NoopTokenStorage, REFRESH_TOKEN_KEY, StorageError,
    SubscriptionError, SubscriptionForwarder, TokenStorage, TransportError, TransportResponse,
};
