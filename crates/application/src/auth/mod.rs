//! Authentication policy for outgoing operations.
//!
//! This module provides:
//! - Header stamping for queries, mutations and subscriptions
//! - Credential resolution for the auth exchange
//! - Classification of authorization failures
//! - Publishing of the provider's signed-in state

mod authorizer;
mod classifier;
mod publisher;
mod resolver;

pub use authorizer::{OperationAuthorizer, authorize};
pub use classifier::is_auth_error;
pub use publisher::{AuthStateConsumer, AuthStatePublisher, AuthStatus};
pub use resolver::{CredentialResolver, RefreshPolicy};
