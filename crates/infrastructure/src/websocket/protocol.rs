//! Messages of the `graphql-ws` subprotocol (subscriptions-transport-ws).

use authlink_domain::{ConnectionParams, ExecutionResult};
use serde::{Deserialize, Serialize};

/// Messages sent by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Opens the session; the payload carries the credentials.
    ConnectionInit {
        /// Handshake parameters.
        payload: ConnectionParams,
    },
    /// Starts an operation.
    Start {
        /// Client-chosen operation id.
        id: String,
        /// `{query, variables, operationName}`.
        payload: serde_json::Value,
    },
    /// Stops an operation.
    Stop {
        /// Operation id.
        id: String,
    },
    /// Ends the session.
    ConnectionTerminate,
}

/// Messages sent by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The handshake was accepted.
    ConnectionAck {
        /// Optional server payload.
        #[serde(default)]
        payload: Option<serde_json::Value>,
    },
    /// The handshake was rejected.
    ConnectionError {
        /// Reason supplied by the server.
        #[serde(default)]
        payload: Option<serde_json::Value>,
    },
    /// Keep-alive.
    #[serde(rename = "ka")]
    KeepAlive,
    /// A result for a running operation.
    Data {
        /// Operation id.
        id: String,
        /// Execution result.
        payload: ExecutionResult,
    },
    /// The operation failed before execution.
    Error {
        /// Operation id.
        id: String,
        /// Error payload.
        #[serde(default)]
        payload: serde_json::Value,
    },
    /// The operation finished.
    Complete {
        /// Operation id.
        id: String,
    },
}

impl ClientMessage {
    /// Encodes the message as a text frame payload.
    #[must_use]
    pub fn to_text(&self) -> String {
        // Every field is a string, a string map or a JSON value.
        serde_json::to_string(self).unwrap_or_default()
    }
}

impl ServerMessage {
    /// Decodes a text frame.
    ///
    /// # Errors
    ///
    /// Returns the parse error for unknown or malformed messages.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Human-readable reason from an error payload.
#[must_use]
pub fn describe_payload(payload: &serde_json::Value) -> String {
    match payload {
        serde_json::Value::String(message) => message.clone(),
        serde_json::Value::Object(map) => map
            .get("message")
            .and_then(serde_json::Value::as_str)
            .map_or_else(|| payload.to_string(), str::to_string),
        serde_json::Value::Array(items) => items
            .iter()
            .map(describe_payload)
            .collect::<Vec<_>>()
            .join("; "),
        other => other.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use authlink_domain::Headers;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_connection_init_wire_format() {
        let mut headers = Headers::new();
        headers.insert("Authorization".to_string(), "Bearer abc".to_string());
        let message = ClientMessage::ConnectionInit {
            payload: ConnectionParams { headers },
        };
        let value: serde_json::Value = serde_json::from_str(&message.to_text()).unwrap();
        assert_eq!(
            value,
            json!({"type": "connection_init", "payload": {"headers": {"Authorization": "Bearer abc"}}})
        );
    }

    #[test]
    fn test_start_and_stop_wire_format() {
        let start = ClientMessage::Start {
            id: "1".to_string(),
            payload: json!({"query": "subscription { feed }"}),
        };
        let value: serde_json::Value = serde_json::from_str(&start.to_text()).unwrap();
        assert_eq!(value["type"], "start");
        assert_eq!(value["id"], "1");

        let stop: serde_json::Value =
            serde_json::from_str(&ClientMessage::Stop { id: "1".to_string() }.to_text()).unwrap();
        assert_eq!(stop, json!({"type": "stop", "id": "1"}));
        assert_eq!(ClientMessage::ConnectionTerminate.to_text(), r#"{"type":"connection_terminate"}"#);
    }

    #[test]
    fn test_parse_server_messages() {
        assert_eq!(
            ServerMessage::parse(r#"{"type":"connection_ack"}"#).unwrap(),
            ServerMessage::ConnectionAck { payload: None }
        );
        assert_eq!(ServerMessage::parse(r#"{"type":"ka"}"#).unwrap(), ServerMessage::KeepAlive);
        let data = ServerMessage::parse(r#"{"type":"data","id":"2","payload":{"data":{"feed":1}}}"#).unwrap();
        let ServerMessage::Data { id, payload } = data else {
            panic!("expected data");
        };
        assert_eq!(id, "2");
        assert_eq!(payload.data, Some(json!({"feed": 1})));
        assert!(ServerMessage::parse(r#"{"type":"next","id":"2"}"#).is_err());
    }

    #[test]
    fn test_describe_payload() {
        assert_eq!(describe_payload(&json!({"message": "denied"})), "denied");
        assert_eq!(describe_payload(&json!("bad token")), "bad token");
        assert_eq!(describe_payload(&json!([{"message": "a"}, {"message": "b"}])), "a; b");
    }
}
