//! Stamping the authorization header onto outgoing operations.

use std::sync::Arc;

use authlink_domain::{
    AuthHeader, AuthenticationState, ConnectionParams, FetchOptionsSource, Operation,
    OperationContext, PublicRole,
};

use crate::ports::IdentityProvider;

/// Returns a copy of `operation` carrying `header`.
///
/// Fetch options are normalized first (a deferred producer is invoked), then
/// the header is merged into the existing headers. Any header of the other
/// scheme, and any differently-cased copy of this one, is dropped so exactly
/// one scheme is sent. The input operation is left untouched and the request
/// payload is shared with the result.
#[must_use]
pub fn authorize(operation: &Operation, header: &AuthHeader) -> Operation {
    let mut options = operation.context.resolved_fetch_options();
    let mut headers = options.headers.take().unwrap_or_default();
    headers.retain(|name, _| {
        !name.eq_ignore_ascii_case(header.name())
            && !name.eq_ignore_ascii_case(header.conflicting_name())
    });
    headers.insert(header.name().to_string(), header.value());
    options.headers = Some(headers);

    operation.with_context(OperationContext {
        fetch_options: Some(FetchOptionsSource::value(options)),
        ..operation.context.clone()
    })
}

/// Decides the header for the identity provider's current state.
#[derive(Clone)]
pub struct OperationAuthorizer {
    provider: Arc<dyn IdentityProvider>,
    public_role: PublicRole,
}

impl OperationAuthorizer {
    /// Creates an authorizer for a provider and role.
    #[must_use]
    pub fn new(provider: Arc<dyn IdentityProvider>, public_role: PublicRole) -> Self {
        Self {
            provider,
            public_role,
        }
    }

    /// The role used for anonymous requests.
    #[must_use]
    pub const fn public_role(&self) -> &PublicRole {
        &self.public_role
    }

    /// Header for the provider's state at this moment.
    #[must_use]
    pub fn current_header(&self) -> AuthHeader {
        let state = AuthenticationState::from_signed_in(self.provider.is_authenticated());
        let token = if state.is_signed_in() {
            let token = self.provider.jwt_token();
            if token.is_none() {
                tracing::warn!("signed in without an access token, using the public role");
            }
            token
        } else {
            None
        };
        AuthHeader::decide(state, token.as_deref(), &self.public_role)
    }

    /// Stamps the current header onto an operation.
    #[must_use]
    pub fn authorize(&self, operation: &Operation) -> Operation {
        authorize(operation, &self.current_header())
    }

    /// Handshake parameters for the subscription connection.
    #[must_use]
    pub fn connection_params(&self) -> ConnectionParams {
        ConnectionParams::from_auth_header(&self.current_header())
    }
}

impl std::fmt::Debug for OperationAuthorizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationAuthorizer")
            .field("public_role", &self.public_role)
            .finish_non_exhaustive()
    }
}
