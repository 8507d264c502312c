//! Publishing the provider's signed-in state to consumers.
//!
//! The publisher is an explicit object owned by whatever scope hosts the UI
//! (or other consumers). Several publishers may observe the same provider.

use std::sync::{Arc, Weak};

use authlink_domain::AuthenticationState;
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::ports::{AuthStateListener, AuthSubscription, IdentityProvider};

/// Value handed to consumers: `signed_in` is `None` until resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AuthStatus {
    /// Whether a user is signed in.
    pub signed_in: Option<bool>,
}

/// Republishes provider state changes to any number of consumers.
///
/// The provider registration is released on [`AuthStatePublisher::shutdown`]
/// or when the publisher is dropped.
#[derive(Debug)]
pub struct AuthStatePublisher {
    state: Arc<watch::Sender<AuthenticationState>>,
    registration: Mutex<Option<AuthSubscription>>,
}

impl AuthStatePublisher {
    /// Starts listening for changes, then reads the provider's current state.
    ///
    /// A change that lands between the two steps is still reflected.
    #[must_use]
    pub fn new(provider: &dyn IdentityProvider) -> Self {
        let (sender, _) = watch::channel(AuthenticationState::Unknown);
        let state = Arc::new(sender);

        let sink: Weak<watch::Sender<AuthenticationState>> = Arc::downgrade(&state);
        let listener: AuthStateListener = Arc::new(move |signed_in| {
            if let Some(sender) = sink.upgrade() {
                let next = AuthenticationState::from_signed_in(signed_in);
                let previous = sender.send_replace(next);
                tracing::debug!(?previous, ?next, "auth state changed");
            }
        });
        let registration = provider.on_auth_state_changed(listener);
        state.send_replace(provider.authentication_state());

        Self {
            state,
            registration: Mutex::new(Some(registration)),
        }
    }

    /// The current state.
    #[must_use]
    pub fn current(&self) -> AuthenticationState {
        *self.state.borrow()
    }

    /// The current status as consumers see it.
    #[must_use]
    pub fn status(&self) -> AuthStatus {
        AuthStatus {
            signed_in: self.current().signed_in(),
        }
    }

    /// Registers a consumer; it stops counting when dropped.
    #[must_use]
    pub fn subscribe(&self) -> AuthStateConsumer {
        AuthStateConsumer {
            receiver: self.state.subscribe(),
        }
    }

    /// Number of live consumers.
    #[must_use]
    pub fn consumer_count(&self) -> usize {
        self.state.receiver_count()
    }

    /// Whether provider notifications are still being received.
    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.registration.lock().is_some()
    }

    /// Stops listening to the provider. Consumers keep the last value.
    pub fn shutdown(&self) {
        if let Some(registration) = self.registration.lock().take() {
            registration.unsubscribe();
        }
    }
}

/// One consumer of an [`AuthStatePublisher`].
#[derive(Debug, Clone)]
pub struct AuthStateConsumer {
    receiver: watch::Receiver<AuthenticationState>,
}

impl AuthStateConsumer {
    /// The latest published state.
    #[must_use]
    pub fn state(&self) -> AuthenticationState {
        *self.receiver.borrow()
    }

    /// The latest status.
    #[must_use]
    pub fn status(&self) -> AuthStatus {
        AuthStatus {
            signed_in: self.state().signed_in(),
        }
    }

    /// Waits for the next published change.
    ///
    /// Returns `None` once the publisher is gone.
    pub async fn changed(&mut self) -> Option<AuthenticationState> {
        self.receiver.changed().await.ok()?;
        Some(*self.receiver.borrow_and_update())
    }
}
