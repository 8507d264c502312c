//! Port definitions (interfaces)
//!
//! Ports define the boundaries between the auth core and external systems.
//! Each port is a trait that can be implemented by adapters in the infrastructure layer.

mod identity_provider;
mod subscription;
mod token_storage;
mod transport;

pub use identity_provider::{
    AuthProviderError, AuthStateListener, AuthSubscription, IdentityProvider,
};
pub use subscription::{ExecutionStream, SubscriptionError, SubscriptionForwarder};
pub use token_storage::{NoopTokenStorage, REFRESH_TOKEN_KEY, StorageError, TokenStorage};
pub use transport::{FetchRequest, GraphQLTransport, TransportError, TransportResponse};
