//! Identity provider port
//!
//! The identity provider owns the user session. The core only reads its
//! status and token, listens for changes and, when configured to, asks it to
//! refresh the session. It never issues or refreshes tokens itself.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use authlink_domain::AuthenticationState;

/// Callback invoked with the new signed-in flag on every state change.
pub type AuthStateListener = Arc<dyn Fn(bool) + Send + Sync>;

/// Registration of an [`AuthStateListener`].
///
/// The listener is released when the handle is dropped or
/// [`AuthSubscription::unsubscribe`] is called; no callback is delivered
/// afterwards.
pub struct AuthSubscription {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl AuthSubscription {
    /// Handle that runs `release` exactly once.
    #[must_use]
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// Handle for providers that never emit changes.
    #[must_use]
    pub const fn inert() -> Self {
        Self { release: None }
    }

    /// Releases the listener now.
    pub fn unsubscribe(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for AuthSubscription {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl fmt::Debug for AuthSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSubscription")
            .field("active", &self.release.is_some())
            .finish()
    }
}

/// Errors reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthProviderError {
    /// The provider cannot refresh sessions.
    #[error("session refresh is not supported by this provider")]
    RefreshUnsupported,

    /// The refresh attempt failed.
    #[error("session refresh failed: {0}")]
    RefreshFailed(String),
}

/// Port for the external identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Whether a user session is established right now.
    fn is_authenticated(&self) -> bool;

    /// Tri-state view of the session, `Unknown` before the provider resolves.
    fn authentication_state(&self) -> AuthenticationState {
        AuthenticationState::from_signed_in(self.is_authenticated())
    }

    /// The current access token, if the provider holds one.
    fn jwt_token(&self) -> Option<String>;

    /// Registers a listener for signed-in changes.
    fn on_auth_state_changed(&self, listener: AuthStateListener) -> AuthSubscription;

    /// Asks the provider to refresh its session with a persisted refresh token.
    ///
    /// # Errors
    ///
    /// The default implementation returns
    /// [`AuthProviderError::RefreshUnsupported`].
    async fn refresh_session(&self, refresh_token: &str) -> Result<(), AuthProviderError> {
        let _ = refresh_token;
        Err(AuthProviderError::RefreshUnsupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_subscription_releases_once() {
        let released = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&released);
        let subscription = AuthSubscription::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        subscription.unsubscribe();
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_subscription_releases_on_drop() {
        let released = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&released);
        {
            let _subscription = AuthSubscription::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(released.load(Ordering::SeqCst), 1);
        drop(AuthSubscription::inert());
    }
}
