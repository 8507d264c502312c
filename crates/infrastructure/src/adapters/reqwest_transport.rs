//! GraphQL transport implementation using reqwest.
//!
//! This adapter implements the `GraphQLTransport` port: every operation is a
//! JSON `POST` to the endpoint with the stamped headers.

use std::time::Duration;

use async_trait::async_trait;
use authlink_application::ports::{
    FetchRequest, GraphQLTransport, TransportError, TransportResponse,
};
use authlink_domain::ExecutionResult;
use reqwest::{Client, Url};

/// Request timeout applied when the caller sets none.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP transport backed by `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestGraphQLTransport {
    client: Client,
    timeout: Duration,
}

impl ReqwestGraphQLTransport {
    /// Creates a transport with its own connection pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be created.
    pub fn new(user_agent: &str) -> Result<Self, TransportError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| TransportError::Other(e.to_string()))?;

        Ok(Self {
            client,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Creates a transport over an existing reqwest client.
    #[must_use]
    pub const fn with_client(client: Client) -> Self {
        Self {
            client,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builds the `POST` for a request without sending it.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed.
    pub fn build_request(
        &self,
        request: &FetchRequest,
    ) -> Result<reqwest::RequestBuilder, TransportError> {
        let url = Url::parse(&request.url)
            .map_err(|e| TransportError::InvalidUrl(format!("{e}: {}", request.url)))?;

        let mut builder = self
            .client
            .post(url)
            .timeout(self.timeout)
            .header("Accept", "application/json");
        for (name, value) in request.headers() {
            builder = builder.header(name, value);
        }
        Ok(builder.json(&request.body))
    }

    /// Maps reqwest errors to `TransportError`.
    fn map_error(error: &reqwest::Error) -> TransportError {
        if error.is_timeout() {
            return TransportError::Timeout;
        }
        if error.is_connect() {
            return TransportError::ConnectionFailed(error.to_string());
        }
        if error.is_builder() {
            return TransportError::InvalidResponse(format!("could not build request: {error}"));
        }
        TransportError::Other(error.to_string())
    }

    /// Interprets a response body.
    ///
    /// A GraphQL body is returned whatever the status, so errors the server
    /// reports (including authorization failures) reach the pipeline.
    fn parse_body(status: u16, bytes: &[u8]) -> Result<TransportResponse, TransportError> {
        let parsed = serde_json::from_slice::<ExecutionResult>(bytes);
        if (200..300).contains(&status) {
            return parsed
                .map(|body| TransportResponse { status, body })
                .map_err(|e| TransportError::InvalidResponse(e.to_string()));
        }
        match parsed {
            Ok(body) if body.data.is_some() || body.errors.is_some() => {
                Ok(TransportResponse { status, body })
            }
            _ => Err(TransportError::Status {
                status,
                message: excerpt(bytes),
            }),
        }
    }
}

fn excerpt(bytes: &[u8]) -> String {
    const LIMIT: usize = 200;
    let text = String::from_utf8_lossy(bytes);
    let text = text.trim();
    match text.char_indices().nth(LIMIT) {
        Some((index, _)) => format!("{}...", &text[..index]),
        None => text.to_string(),
    }
}

#[async_trait]
impl GraphQLTransport for ReqwestGraphQLTransport {
    async fn fetch(&self, request: FetchRequest) -> Result<TransportResponse, TransportError> {
        let builder = self.build_request(&request)?;
        let response = builder.send().await.map_err(|e| Self::map_error(&e))?;

        let status = response.status().as_u16();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| TransportError::InvalidResponse(format!("failed to read body: {e}")))?;

        tracing::debug!(status, bytes = bytes.len(), "graphql response received");
        Self::parse_body(status, &bytes)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use authlink_domain::{FetchOptions, Headers};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn fetch_request(headers: &[(&str, &str)]) -> FetchRequest {
        let headers: Headers = headers
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        FetchRequest {
            url: "https://api.example.com/v1/graphql".to_string(),
            options: FetchOptions::with_headers(headers),
            body: json!({"query": "{ me { id } }", "variables": null}),
        }
    }

    #[test]
    fn test_build_request_posts_json_with_headers() {
        let transport = ReqwestGraphQLTransport::new("authlink-test").unwrap();
        let request = transport
            .build_request(&fetch_request(&[("Authorization", "Bearer abc")]))
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(request.method(), reqwest::Method::POST);
        assert_eq!(request.url().as_str(), "https://api.example.com/v1/graphql");
        assert_eq!(request.headers()["authorization"], "Bearer abc");
        assert_eq!(request.headers()["content-type"], "application/json");
        let body: serde_json::Value =
            serde_json::from_slice(request.body().unwrap().as_bytes().unwrap()).unwrap();
        assert_eq!(body["query"], "{ me { id } }");
    }

    #[test]
    fn test_invalid_url() {
        let transport = ReqwestGraphQLTransport::new("authlink-test").unwrap();
        let mut request = fetch_request(&[]);
        request.url = "not a url".to_string();
        assert!(matches!(
            transport.build_request(&request),
            Err(TransportError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_graphql_body_is_kept_on_error_status() {
        let body = br#"{"errors":[{"message":"denied","extensions":{"code":"FORBIDDEN"}}]}"#;
        let response = ReqwestGraphQLTransport::parse_body(401, body).unwrap();
        assert_eq!(response.status, 401);
        assert_eq!(response.body.errors.unwrap()[0].code(), Some("FORBIDDEN"));
    }

    #[test]
    fn test_non_graphql_error_body_is_status_error() {
        let error = ReqwestGraphQLTransport::parse_body(502, b"<html>Bad Gateway</html>").unwrap_err();
        assert_eq!(
            error,
            TransportError::Status {
                status: 502,
                message: "<html>Bad Gateway</html>".to_string(),
            }
        );
        assert!(ReqwestGraphQLTransport::parse_body(500, b"{}").is_err());
    }

    #[test]
    fn test_invalid_success_body() {
        assert!(matches!(
            ReqwestGraphQLTransport::parse_body(200, b"not json"),
            Err(TransportError::InvalidResponse(_))
        ));
        let empty = ReqwestGraphQLTransport::parse_body(200, b"{}").unwrap();
        assert_eq!(empty.body, ExecutionResult::default());
    }

    #[test]
    fn test_excerpt_is_bounded() {
        let long = "x".repeat(500);
        assert_eq!(excerpt(long.as_bytes()).len(), 203);
    }
}
