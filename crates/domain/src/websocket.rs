//! WebSocket subscription connection types.
//!
//! Subscriptions share one persistent connection. Its credentials travel in
//! the `connection_init` payload and are fixed for the lifetime of that
//! handshake; see [`ConnectionParams`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::auth::AuthHeader;
use crate::operation::Headers;

/// Subprotocol spoken by the subscription server.
pub const GRAPHQL_WS_PROTOCOL: &str = "graphql-ws";

/// Derives the subscription endpoint from the HTTP endpoint.
///
/// `https://` becomes `wss://` and `http://` becomes `ws://`. Anything else is
/// returned unchanged.
#[must_use]
pub fn websocket_uri(http_uri: &str) -> String {
    if let Some(rest) = http_uri.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = http_uri.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        http_uri.to_string()
    }
}

/// Payload of the `connection_init` message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionParams {
    /// Headers the server applies to every subscription on this connection.
    #[serde(default)]
    pub headers: Headers,
}

impl ConnectionParams {
    /// Parameters carrying a single authorization header.
    #[must_use]
    pub fn from_auth_header(header: &AuthHeader) -> Self {
        let mut headers = Headers::new();
        headers.insert(header.name().to_string(), header.value());
        Self { headers }
    }
}

/// Subscription connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionConfig {
    /// The WebSocket URL (ws:// or wss://).
    pub url: String,
    /// Handshake payload, computed once when the connection is established.
    #[serde(default)]
    pub connection_params: ConnectionParams,
    /// Connection timeout in seconds.
    #[serde(default = "default_timeout")]
    pub connect_timeout_secs: u64,
    /// Reconnect automatically after the connection drops.
    #[serde(default = "default_reconnect")]
    pub auto_reconnect: bool,
    /// Maximum reconnection attempts (0 for unlimited).
    #[serde(default)]
    pub max_reconnect_attempts: u32,
}

const fn default_timeout() -> u64 {
    30
}

const fn default_reconnect() -> bool {
    true
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            connection_params: ConnectionParams::default(),
            connect_timeout_secs: default_timeout(),
            auto_reconnect: default_reconnect(),
            max_reconnect_attempts: 0,
        }
    }
}

impl SubscriptionConfig {
    /// Configuration for a subscription endpoint.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Set the handshake payload.
    #[must_use]
    pub fn with_connection_params(mut self, params: ConnectionParams) -> Self {
        self.connection_params = params;
        self
    }

    /// Enable or disable auto-reconnect.
    #[must_use]
    pub const fn with_auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = enabled;
        self
    }

    /// Get the connect timeout as Duration.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Returns true while another reconnect attempt is allowed.
    #[must_use]
    pub const fn may_reconnect(&self, attempts: u32) -> bool {
        self.auto_reconnect
            && (self.max_reconnect_attempts == 0 || attempts < self.max_reconnect_attempts)
    }

    /// Validate the configuration.
    #[allow(clippy::missing_errors_doc)]
    pub fn validate(&self) -> Result<(), WebSocketError> {
        if self.url.is_empty() {
            return Err(WebSocketError::InvalidUrl(
                "URL cannot be empty".to_string(),
            ));
        }

        if !self.url.starts_with("ws://") && !self.url.starts_with("wss://") {
            return Err(WebSocketError::InvalidUrl(format!(
                "URL must start with ws:// or wss://: {}",
                self.url
            )));
        }

        Ok(())
    }
}

/// Subscription connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Not connected.
    #[default]
    Disconnected,
    /// Handshake in progress.
    Connecting,
    /// `connection_ack` received.
    Connected,
    /// Waiting before the next attempt.
    Reconnecting,
    /// Gave up; no further attempts.
    Failed,
    /// Closed by the client.
    Closed,
}

impl ConnectionState {
    /// Check if the connection is usable.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Check if the connection can never carry traffic again.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed | Self::Closed)
    }
}

/// WebSocket-related errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum WebSocketError {
    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    /// Connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    /// The server rejected `connection_init`.
    #[error("Connection rejected: {0}")]
    ConnectionRejected(String),
    /// Connection closed.
    #[error("Connection closed: {0}")]
    ConnectionClosed(String),
    /// Send failed.
    #[error("Failed to send message: {0}")]
    SendFailed(String),
    /// Unexpected frame.
    #[error("Protocol error: {0}")]
    Protocol(String),
    /// Timeout.
    #[error("Connection timeout")]
    Timeout,
    /// The client was shut down.
    #[error("Not connected")]
    NotConnected,
}
