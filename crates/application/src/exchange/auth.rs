//! Authorization of every outgoing operation.

use std::sync::Arc;

use async_trait::async_trait;
use authlink_domain::{CombinedError, Credential, Operation};
use parking_lot::Mutex;

use super::{Exchange, Next, OperationOutcome};
use crate::auth::{CredentialResolver, OperationAuthorizer, is_auth_error};

/// The three decisions the auth exchange delegates.
#[async_trait]
pub trait AuthHooks: Send + Sync {
    /// Produces the auth state; `current` is the state being replaced, `None`
    /// on the first call.
    async fn get_auth(&self, current: Option<&Credential>) -> Option<Credential>;

    /// Returns the operation with authorization applied.
    fn add_auth_to_operation(&self, operation: &Operation, auth: Option<&Credential>) -> Operation;

    /// Whether a failed result should trigger a refresh and retry.
    fn did_auth_error(&self, error: &CombinedError) -> bool;
}

/// Hooks backed by the identity provider.
///
/// Stamping always reads the provider's live state, so the held credential
/// only gates the refresh path.
#[derive(Debug, Clone)]
pub struct ProviderAuthHooks {
    authorizer: OperationAuthorizer,
    resolver: CredentialResolver,
}

impl ProviderAuthHooks {
    /// Creates hooks from an authorizer and a resolver.
    #[must_use]
    pub const fn new(authorizer: OperationAuthorizer, resolver: CredentialResolver) -> Self {
        Self {
            authorizer,
            resolver,
        }
    }

    /// The authorizer used for stamping.
    #[must_use]
    pub const fn authorizer(&self) -> &OperationAuthorizer {
        &self.authorizer
    }
}

#[async_trait]
impl AuthHooks for ProviderAuthHooks {
    async fn get_auth(&self, _current: Option<&Credential>) -> Option<Credential> {
        self.resolver.resolve().await
    }

    fn add_auth_to_operation(&self, operation: &Operation, _auth: Option<&Credential>) -> Operation {
        self.authorizer.authorize(operation)
    }

    fn did_auth_error(&self, error: &CombinedError) -> bool {
        is_auth_error(error)
    }
}

#[derive(Debug, Default)]
struct AuthSlot {
    initialized: bool,
    credential: Option<Credential>,
}

/// Stamps operations and retries once after an auth failure.
pub struct AuthExchange {
    hooks: Arc<dyn AuthHooks>,
    slot: Mutex<AuthSlot>,
}

impl AuthExchange {
    /// Creates the exchange; the auth state is resolved on first use.
    #[must_use]
    pub fn new(hooks: Arc<dyn AuthHooks>) -> Self {
        Self {
            hooks,
            slot: Mutex::new(AuthSlot::default()),
        }
    }

    /// The credential currently held, if any.
    #[must_use]
    pub fn credential(&self) -> Option<Credential> {
        self.slot.lock().credential.clone()
    }

    async fn ensure_initialized(&self) -> Option<Credential> {
        {
            let slot = self.slot.lock();
            if slot.initialized {
                return slot.credential.clone();
            }
        }
        let credential = self.hooks.get_auth(None).await;
        let mut slot = self.slot.lock();
        if !slot.initialized {
            slot.initialized = true;
            slot.credential.clone_from(&credential);
        }
        slot.credential.clone()
    }

    async fn refresh(&self, current: Option<Credential>) -> Option<Credential> {
        let credential = self.hooks.get_auth(current.as_ref()).await;
        let mut slot = self.slot.lock();
        slot.initialized = true;
        slot.credential.clone_from(&credential);
        credential
    }
}

impl std::fmt::Debug for AuthExchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthExchange")
            .field("slot", &*self.slot.lock())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Exchange for AuthExchange {
    fn name(&self) -> &'static str {
        "auth"
    }

    async fn run(&self, operation: Operation, next: Next<'_>) -> OperationOutcome {
        let credential = self.ensure_initialized().await;
        let stamped = self.hooks.add_auth_to_operation(&operation, credential.as_ref());

        let outcome = next.run(stamped).await;
        let OperationOutcome::Single(result) = outcome else {
            return outcome;
        };
        let auth_failed = result
            .error
            .as_ref()
            .is_some_and(|error| self.hooks.did_auth_error(error));
        if !auth_failed {
            return OperationOutcome::Single(result);
        }

        tracing::debug!(kind = %operation.kind, key = %operation.key(), "auth error, refreshing and retrying once");
        let credential = self.refresh(credential).await;
        let stamped = self.hooks.add_auth_to_operation(&operation, credential.as_ref());
        next.run(stamped).await
    }
}
