//! Binding settings and an identity provider into a ready client.

use std::sync::Arc;

use authlink_application::auth::{CredentialResolver, OperationAuthorizer, RefreshPolicy};
use authlink_application::client::GraphQLClient;
use authlink_application::error::{ApplicationError, ApplicationResult};
use authlink_application::exchange::{ErrorHandler, ProviderAuthHooks};
use authlink_application::ports::{
    GraphQLTransport, IdentityProvider, NoopTokenStorage, SubscriptionError, TokenStorage,
};
use authlink_domain::{ClientSettings, ConnectionState};

use crate::adapters::ReqwestGraphQLTransport;
use crate::websocket::SubscriptionClient;

/// Optional parts of a binding.
pub struct BindOptions {
    /// Custom HTTP transport; reqwest is used when `None`.
    pub fetch: Option<Arc<dyn GraphQLTransport>>,
    /// Where the refresh token is persisted; nothing is when `None`.
    pub storage: Option<Arc<dyn TokenStorage>>,
    /// Refresh behaviour for signed-in users.
    pub refresh_policy: RefreshPolicy,
    /// Replaces the default error logger.
    pub on_error: Option<ErrorHandler>,
    /// Open the subscription connection.
    pub subscriptions: bool,
}

impl Default for BindOptions {
    fn default() -> Self {
        Self {
            fetch: None,
            storage: None,
            refresh_policy: RefreshPolicy::default(),
            on_error: None,
            subscriptions: true,
        }
    }
}

impl std::fmt::Debug for BindOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindOptions")
            .field("custom_fetch", &self.fetch.is_some())
            .field("storage", &self.storage.is_some())
            .field("refresh_policy", &self.refresh_policy)
            .field("subscriptions", &self.subscriptions)
            .finish_non_exhaustive()
    }
}

/// A client bound to one endpoint and identity provider.
///
/// The subscription connection's handshake parameters are captured at bind
/// time; call [`TransportBinder::reconnect`] after a sign-in or sign-out to
/// present the new credentials.
#[derive(Debug)]
pub struct TransportBinder {
    settings: ClientSettings,
    authorizer: OperationAuthorizer,
    client: GraphQLClient,
    subscriptions: Option<SubscriptionClient>,
}

impl TransportBinder {
    /// Binds with reqwest, no token storage and a subscription connection.
    ///
    /// # Errors
    ///
    /// See [`TransportBinder::bind_with`].
    pub fn bind(settings: ClientSettings, provider: Arc<dyn IdentityProvider>) -> ApplicationResult<Self> {
        Self::bind_with(settings, provider, BindOptions::default())
    }

    /// Binds with explicit options.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings are invalid, the HTTP client cannot
    /// be created, or the subscription connection cannot be started.
    pub fn bind_with(
        settings: ClientSettings,
        provider: Arc<dyn IdentityProvider>,
        options: BindOptions,
    ) -> ApplicationResult<Self> {
        settings.validate()?;

        let authorizer = OperationAuthorizer::new(Arc::clone(&provider), settings.public_role.clone());
        let storage = options
            .storage
            .unwrap_or_else(|| Arc::new(NoopTokenStorage) as Arc<dyn TokenStorage>);
        let resolver =
            CredentialResolver::new(provider, storage).with_refresh_policy(options.refresh_policy);

        let transport: Arc<dyn GraphQLTransport> = match options.fetch {
            Some(transport) => transport,
            None => Arc::new(ReqwestGraphQLTransport::new(&settings.user_agent)?),
        };

        let subscriptions = if options.subscriptions {
            let config = settings
                .subscription_config()
                .with_connection_params(authorizer.connection_params());
            Some(SubscriptionClient::connect(config)?)
        } else {
            None
        };

        let mut builder = GraphQLClient::builder(settings.gql_endpoint.as_str())
            .request_policy(settings.request_policy)
            .auth_hooks(Arc::new(ProviderAuthHooks::new(authorizer.clone(), resolver)))
            .fetch(transport);
        if let Some(subscriptions) = &subscriptions {
            builder = builder.subscriptions(Arc::new(subscriptions.clone()));
        }
        if let Some(handler) = options.on_error {
            builder = builder.on_error(handler);
        }
        let client = builder.build()?;

        tracing::info!(
            endpoint = %settings.gql_endpoint,
            public_role = %settings.public_role,
            subscriptions = subscriptions.is_some(),
            "GraphQL client bound"
        );
        Ok(Self {
            settings,
            authorizer,
            client,
            subscriptions,
        })
    }

    /// The bound client.
    #[must_use]
    pub const fn client(&self) -> &GraphQLClient {
        &self.client
    }

    /// The settings used for binding.
    #[must_use]
    pub const fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    /// The subscription endpoint.
    #[must_use]
    pub fn websocket_uri(&self) -> String {
        self.settings.websocket_uri()
    }

    /// The subscription connection, if one was opened.
    #[must_use]
    pub const fn subscriptions(&self) -> Option<&SubscriptionClient> {
        self.subscriptions.as_ref()
    }

    /// State of the subscription connection.
    #[must_use]
    pub fn connection_state(&self) -> Option<ConnectionState> {
        self.subscriptions.as_ref().map(SubscriptionClient::state)
    }

    /// Reconnects subscriptions with the provider's current credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if no subscription connection was opened or it has
    /// been closed.
    pub fn reconnect(&self) -> ApplicationResult<()> {
        let subscriptions = self
            .subscriptions
            .as_ref()
            .ok_or(ApplicationError::Subscription(SubscriptionError::Unavailable))?;
        let params = self.authorizer.connection_params();
        tracing::debug!(headers = ?params.headers.keys().collect::<Vec<_>>(), "reconnecting subscriptions");
        subscriptions.reconnect(params)?;
        Ok(())
    }

    /// Closes the subscription connection.
    pub fn close(&self) {
        if let Some(subscriptions) = &self.subscriptions {
            subscriptions.close();
        }
    }
}
