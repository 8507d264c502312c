//! Client settings
//!
//! Everything needed to bind a GraphQL endpoint: the HTTP URI, the role used
//! for anonymous requests and the subscription connection behaviour.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::auth::PublicRole;
use crate::error::{DomainError, DomainResult};
use crate::operation::RequestPolicy;
use crate::websocket::{SubscriptionConfig, websocket_uri};

/// Subscription connection behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionSettings {
    /// Reconnect after the connection drops.
    #[serde(default = "default_auto_reconnect")]
    pub auto_reconnect: bool,

    /// Give up after this many attempts (0 for unlimited).
    #[serde(default)]
    pub max_reconnect_attempts: u32,

    /// Handshake timeout.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_auto_reconnect() -> bool {
    true
}

fn default_connect_timeout_secs() -> u64 {
    30
}

impl Default for SubscriptionSettings {
    fn default() -> Self {
        Self {
            auto_reconnect: default_auto_reconnect(),
            max_reconnect_attempts: 0,
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

/// Settings for one GraphQL client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSettings {
    /// Absolute http(s) URI of the GraphQL endpoint.
    pub gql_endpoint: String,

    /// Role presented when no user is signed in.
    #[serde(default)]
    pub public_role: PublicRole,

    /// Default cache interaction for queries.
    #[serde(default)]
    pub request_policy: RequestPolicy,

    /// Subscription connection behaviour.
    #[serde(default)]
    pub subscription: SubscriptionSettings,

    /// User-Agent sent over HTTP.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_user_agent() -> String {
    concat!("authlink/", env!("CARGO_PKG_VERSION")).to_string()
}

impl ClientSettings {
    /// Settings for an endpoint with every other field defaulted.
    #[must_use]
    pub fn new(gql_endpoint: impl Into<String>) -> Self {
        Self {
            gql_endpoint: gql_endpoint.into(),
            public_role: PublicRole::default(),
            request_policy: RequestPolicy::default(),
            subscription: SubscriptionSettings::default(),
            user_agent: default_user_agent(),
        }
    }

    /// Set the public role.
    #[must_use]
    pub fn with_public_role(mut self, role: impl Into<PublicRole>) -> Self {
        self.public_role = role.into();
        self
    }

    /// Checks that the endpoint is an absolute http(s) URI.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::InvalidUrl`] otherwise.
    pub fn validate(&self) -> DomainResult<()> {
        let url = Url::parse(&self.gql_endpoint)
            .map_err(|e| DomainError::InvalidUrl(format!("{e}: {}", self.gql_endpoint)))?;
        match url.scheme() {
            "http" | "https" => Ok(()),
            other => Err(DomainError::InvalidUrl(format!(
                "unsupported scheme {other}: {}",
                self.gql_endpoint
            ))),
        }
    }

    /// The subscription endpoint derived from the HTTP endpoint.
    #[must_use]
    pub fn websocket_uri(&self) -> String {
        websocket_uri(&self.gql_endpoint)
    }

    /// Subscription connection config without handshake parameters.
    #[must_use]
    pub fn subscription_config(&self) -> SubscriptionConfig {
        SubscriptionConfig {
            url: self.websocket_uri(),
            connect_timeout_secs: self.subscription.connect_timeout_secs,
            auto_reconnect: self.subscription.auto_reconnect,
            max_reconnect_attempts: self.subscription.max_reconnect_attempts,
            ..SubscriptionConfig::default()
        }
    }
}
