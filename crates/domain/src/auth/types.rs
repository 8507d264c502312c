//! Authentication state and credential types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Header carrying the bearer token.
pub const AUTHORIZATION_HEADER: &str = "Authorization";

/// Header carrying the public role for anonymous requests.
pub const ROLE_HEADER: &str = "role";

/// Role presented when no public role is configured.
pub const DEFAULT_PUBLIC_ROLE: &str = "public";

/// Signed-in status as reported by the identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuthenticationState {
    /// The provider has not resolved the session yet.
    #[default]
    Unknown,
    /// A user session is established.
    SignedIn,
    /// No user session.
    SignedOut,
}

impl AuthenticationState {
    /// Maps a provider boolean onto a resolved state.
    #[must_use]
    pub const fn from_signed_in(signed_in: bool) -> Self {
        if signed_in {
            Self::SignedIn
        } else {
            Self::SignedOut
        }
    }

    /// Returns true only for an established session.
    #[must_use]
    pub const fn is_signed_in(self) -> bool {
        matches!(self, Self::SignedIn)
    }

    /// The value exposed to UI consumers: `None` until resolved.
    #[must_use]
    pub const fn signed_in(self) -> Option<bool> {
        match self {
            Self::Unknown => None,
            Self::SignedIn => Some(true),
            Self::SignedOut => Some(false),
        }
    }
}

/// Access token plus the refresh token that accompanied it.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    /// Opaque access token (a JWT for most providers).
    pub access_token: String,
    /// Opaque refresh token, if one was persisted.
    pub refresh_token: Option<String>,
}

impl Credential {
    /// Creates a credential from both tokens.
    #[must_use]
    pub fn new(access_token: impl Into<String>, refresh_token: Option<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
        }
    }
}

// Tokens never reach logs.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &token_preview(&self.access_token))
            .field(
                "refresh_token",
                &self.refresh_token.as_deref().map(token_preview),
            )
            .finish()
    }
}

/// First few characters of a token followed by an ellipsis.
#[must_use]
pub fn token_preview(token: &str) -> String {
    match token.char_indices().nth(8) {
        Some((idx, _)) if token.len() > 12 => format!("{}...", &token[..idx]),
        _ => token.to_string(),
    }
}

/// Role presented to the backend for anonymous requests.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PublicRole(String);

impl PublicRole {
    /// Wraps a role name.
    #[must_use]
    pub fn new(role: impl Into<String>) -> Self {
        Self(role.into())
    }

    /// The role name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for PublicRole {
    fn default() -> Self {
        Self(DEFAULT_PUBLIC_ROLE.to_string())
    }
}

impl fmt::Display for PublicRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PublicRole {
    fn from(role: &str) -> Self {
        Self::new(role)
    }
}

/// The single authorization header attached to an outgoing operation.
///
/// Exactly one scheme is ever chosen: a bearer token for signed-in users,
/// the public role otherwise.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthHeader {
    /// `Authorization: Bearer <token>`.
    Bearer(String),
    /// `role: <public role>`.
    PublicRole(PublicRole),
}

impl AuthHeader {
    /// Picks the header for the given state.
    ///
    /// A signed-in state without a token falls back to the public role so
    /// that a malformed `Bearer` header is never sent.
    #[must_use]
    pub fn decide(state: AuthenticationState, token: Option<&str>, role: &PublicRole) -> Self {
        match (state, token) {
            (AuthenticationState::SignedIn, Some(token)) if !token.is_empty() => {
                Self::Bearer(token.to_string())
            }
            _ => Self::PublicRole(role.clone()),
        }
    }

    /// Header name to set.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Bearer(_) => AUTHORIZATION_HEADER,
            Self::PublicRole(_) => ROLE_HEADER,
        }
    }

    /// Header name of the other scheme, which must not be present alongside.
    #[must_use]
    pub const fn conflicting_name(&self) -> &'static str {
        match self {
            Self::Bearer(_) => ROLE_HEADER,
            Self::PublicRole(_) => AUTHORIZATION_HEADER,
        }
    }

    /// Rendered header value.
    #[must_use]
    pub fn value(&self) -> String {
        match self {
            Self::Bearer(token) => format!("Bearer {token}"),
            Self::PublicRole(role) => role.to_string(),
        }
    }

    /// Returns true for the bearer scheme.
    #[must_use]
    pub const fn is_bearer(&self) -> bool {
        matches!(self, Self::Bearer(_))
    }
}

impl fmt::Debug for AuthHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bearer(token) => f.debug_tuple("Bearer").field(&token_preview(token)).finish(),
            Self::PublicRole(role) => f.debug_tuple("PublicRole").field(role).finish(),
        }
    }
}
