//! Credential resolution for the auth exchange.

use std::sync::Arc;

use authlink_domain::Credential;

use crate::ports::{IdentityProvider, REFRESH_TOKEN_KEY, TokenStorage};

/// What the resolver does for an already signed-in user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshPolicy {
    /// Nothing; the provider keeps its own session fresh.
    #[default]
    Disabled,
    /// Ask the provider to refresh with the persisted refresh token.
    ///
    /// The outcome is only logged. A failed refresh does not sign the user
    /// out.
    Delegate,
}

/// Reads the credential pair the auth exchange keeps as its state.
#[derive(Clone)]
pub struct CredentialResolver {
    provider: Arc<dyn IdentityProvider>,
    storage: Arc<dyn TokenStorage>,
    refresh_policy: RefreshPolicy,
}

impl CredentialResolver {
    /// Creates a resolver with refresh disabled.
    #[must_use]
    pub fn new(provider: Arc<dyn IdentityProvider>, storage: Arc<dyn TokenStorage>) -> Self {
        Self {
            provider,
            storage,
            refresh_policy: RefreshPolicy::default(),
        }
    }

    /// Sets the refresh policy.
    #[must_use]
    pub const fn with_refresh_policy(mut self, refresh_policy: RefreshPolicy) -> Self {
        self.refresh_policy = refresh_policy;
        self
    }

    /// Resolves the credential pair.
    ///
    /// Signed-in users yield `None`. Otherwise a credential is returned only
    /// when both the access token and the persisted refresh token exist;
    /// `None` means the operation proceeds with the public role.
    pub async fn resolve(&self) -> Option<Credential> {
        if self.provider.is_authenticated() {
            self.delegate_refresh().await;
            return None;
        }

        let access_token = self.provider.jwt_token().filter(|t| !t.is_empty())?;
        let refresh_token = self.refresh_token().await?;
        Some(Credential::new(access_token, Some(refresh_token)))
    }

    async fn refresh_token(&self) -> Option<String> {
        self.storage
            .get_item(REFRESH_TOKEN_KEY)
            .await
            .filter(|t| !t.is_empty())
    }

    async fn delegate_refresh(&self) {
        if self.refresh_policy != RefreshPolicy::Delegate {
            return;
        }
        let Some(refresh_token) = self.refresh_token().await else {
            tracing::debug!("no persisted refresh token, skipping session refresh");
            return;
        };
        match self.provider.refresh_session(&refresh_token).await {
            Ok(()) => tracing::debug!("identity provider refreshed the session"),
            Err(error) => tracing::warn!(%error, "session refresh failed, keeping current session"),
        }
    }
}

impl std::fmt::Debug for CredentialResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialResolver")
            .field("refresh_policy", &self.refresh_policy)
            .finish_non_exhaustive()
    }
}
