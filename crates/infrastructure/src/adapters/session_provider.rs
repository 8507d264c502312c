//! In-memory identity provider driven by the host.
//!
//! Hosts without an external identity SDK sign users in and out through this
//! adapter. It starts in `Unknown` until the host either signs in or calls
//! [`SessionIdentityProvider::resolve_signed_out`].

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use authlink_application::ports::{
    AuthProviderError, AuthStateListener, AuthSubscription, IdentityProvider,
};
use authlink_domain::AuthenticationState;
use futures_util::future::BoxFuture;
use parking_lot::Mutex;

/// Exchanges a refresh token for a new access token.
pub type RefreshHandler =
    Arc<dyn Fn(String) -> BoxFuture<'static, Result<String, AuthProviderError>> + Send + Sync>;

#[derive(Default)]
struct Session {
    state: AuthenticationState,
    token: Option<String>,
    listeners: Vec<(u64, AuthStateListener)>,
    next_listener: u64,
}

/// Identity provider whose session is set explicitly.
#[derive(Clone, Default)]
pub struct SessionIdentityProvider {
    session: Arc<Mutex<Session>>,
    refresh: Option<RefreshHandler>,
}

impl SessionIdentityProvider {
    /// Creates a provider in the `Unknown` state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs the handler used by [`IdentityProvider::refresh_session`].
    #[must_use]
    pub fn with_refresh(mut self, handler: RefreshHandler) -> Self {
        self.refresh = Some(handler);
        self
    }

    /// Signs a user in with an access token and notifies listeners.
    pub fn sign_in(&self, access_token: impl Into<String>) {
        {
            let mut session = self.session.lock();
            session.state = AuthenticationState::SignedIn;
            session.token = Some(access_token.into());
        }
        tracing::debug!("session signed in");
        self.notify(true);
    }

    /// Signs the user out and notifies listeners.
    pub fn sign_out(&self) {
        {
            let mut session = self.session.lock();
            session.state = AuthenticationState::SignedOut;
            session.token = None;
        }
        tracing::debug!("session signed out");
        self.notify(false);
    }

    /// Marks an unresolved session as signed out.
    ///
    /// Does nothing once the session has been resolved.
    pub fn resolve_signed_out(&self) {
        let resolved = {
            let mut session = self.session.lock();
            if session.state == AuthenticationState::Unknown {
                session.state = AuthenticationState::SignedOut;
                true
            } else {
                false
            }
        };
        if resolved {
            self.notify(false);
        }
    }

    /// Replaces the access token without a state change.
    pub fn set_token(&self, access_token: Option<String>) {
        self.session.lock().token = access_token;
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.session.lock().listeners.len()
    }

    // Listeners run outside the lock so they may call back into the provider.
    fn notify(&self, signed_in: bool) {
        let listeners: Vec<AuthStateListener> = self
            .session
            .lock()
            .listeners
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(signed_in);
        }
    }
}

impl std::fmt::Debug for SessionIdentityProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let session = self.session.lock();
        f.debug_struct("SessionIdentityProvider")
            .field("state", &session.state)
            .field("has_token", &session.token.is_some())
            .field("listeners", &session.listeners.len())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl IdentityProvider for SessionIdentityProvider {
    fn is_authenticated(&self) -> bool {
        self.session.lock().state.is_signed_in()
    }

    fn authentication_state(&self) -> AuthenticationState {
        self.session.lock().state
    }

    fn jwt_token(&self) -> Option<String> {
        self.session.lock().token.clone()
    }

    fn on_auth_state_changed(&self, listener: AuthStateListener) -> AuthSubscription {
        let id = {
            let mut session = self.session.lock();
            let id = session.next_listener;
            session.next_listener += 1;
            session.listeners.push((id, listener));
            id
        };
        let session: Weak<Mutex<Session>> = Arc::downgrade(&self.session);
        AuthSubscription::new(move || {
            if let Some(session) = session.upgrade() {
                session.lock().listeners.retain(|(other, _)| *other != id);
            }
        })
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<(), AuthProviderError> {
        let Some(handler) = self.refresh.as_ref() else {
            return Err(AuthProviderError::RefreshUnsupported);
        };
        let access_token = handler(refresh_token.to_string()).await?;
        self.set_token(Some(access_token));
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use futures_util::FutureExt;
    use pretty_assertions::assert_eq;

    fn recording(provider: &SessionIdentityProvider) -> (AuthSubscription, Arc<Mutex<Vec<bool>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let subscription = provider.on_auth_state_changed(Arc::new(move |signed_in| {
            sink.lock().push(signed_in);
        }));
        (subscription, seen)
    }

    #[test]
    fn test_starts_unknown() {
        let provider = SessionIdentityProvider::new();
        assert_eq!(provider.authentication_state(), AuthenticationState::Unknown);
        assert!(!provider.is_authenticated());
        assert_eq!(provider.jwt_token(), None);
    }

    #[test]
    fn test_sign_in_and_out_notify() {
        let provider = SessionIdentityProvider::new();
        let (_subscription, seen) = recording(&provider);

        provider.sign_in("abc");
        assert!(provider.is_authenticated());
        assert_eq!(provider.jwt_token(), Some("abc".to_string()));

        provider.sign_out();
        assert_eq!(provider.authentication_state(), AuthenticationState::SignedOut);
        assert_eq!(provider.jwt_token(), None);
        assert_eq!(*seen.lock(), vec![true, false]);
    }

    #[test]
    fn test_resolve_signed_out_only_from_unknown() {
        let provider = SessionIdentityProvider::new();
        let (_subscription, seen) = recording(&provider);
        provider.resolve_signed_out();
        provider.sign_in("abc");
        provider.resolve_signed_out();
        assert!(provider.is_authenticated());
        assert_eq!(*seen.lock(), vec![false, true]);
    }

    #[test]
    fn test_unsubscribe_stops_notifications() {
        let provider = SessionIdentityProvider::new();
        let (subscription, seen) = recording(&provider);
        assert_eq!(provider.listener_count(), 1);
        subscription.unsubscribe();
        assert_eq!(provider.listener_count(), 0);
        provider.sign_in("abc");
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_listener_may_read_provider() {
        let provider = SessionIdentityProvider::new();
        let observed = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&observed);
        let reader = provider.clone();
        let _subscription = provider.on_auth_state_changed(Arc::new(move |_| {
            *sink.lock() = reader.jwt_token();
        }));
        provider.sign_in("abc");
        assert_eq!(*observed.lock(), Some("abc".to_string()));
    }

    #[tokio::test]
    async fn test_refresh_requires_handler() {
        let provider = SessionIdentityProvider::new();
        assert_eq!(
            provider.refresh_session("r1").await,
            Err(AuthProviderError::RefreshUnsupported)
        );

        let provider =
            SessionIdentityProvider::new().with_refresh(Arc::new(|refresh_token: String| {
                async move { Ok::<_, AuthProviderError>(format!("access-for-{refresh_token}")) }
                    .boxed()
            }));
        provider.sign_in("old");
        provider.refresh_session("r1").await.unwrap();
        assert_eq!(provider.jwt_token(), Some("access-for-r1".to_string()));
        assert!(provider.is_authenticated());
    }
}
