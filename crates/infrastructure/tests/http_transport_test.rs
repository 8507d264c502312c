//! Integration tests for the reqwest transport against a local HTTP server.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::Arc;

use authlink_application::ports::{FetchRequest, GraphQLTransport, TransportError};
use authlink_domain::{ClientSettings, FetchOptions, Headers};
use authlink_infrastructure::{BindOptions, ReqwestGraphQLTransport, SessionIdentityProvider, TransportBinder};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// What the server saw: the raw request head and the JSON body.
struct Captured {
    head: String,
    body: serde_json::Value,
}

/// Serves exactly one request with the given status and body.
async fn serve_once(status: &'static str, body: &'static str) -> (String, oneshot::Receiver<Captured>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    let (sender, captured) = oneshot::channel();

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut buffer = Vec::new();
        let mut chunk = [0_u8; 4096];
        let (head, body_start) = loop {
            let read = stream.read(&mut chunk).await.unwrap();
            assert!(read > 0, "connection closed before the request head");
            buffer.extend_from_slice(&chunk[..read]);
            if let Some(end) = buffer.windows(4).position(|w| w == b"\r\n\r\n") {
                break (String::from_utf8_lossy(&buffer[..end]).to_string(), end + 4);
            }
        };
        let length: usize = head
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse().ok())
                    .flatten()
            })
            .unwrap_or(0);
        while buffer.len() < body_start + length {
            let read = stream.read(&mut chunk).await.unwrap();
            assert!(read > 0, "connection closed before the request body");
            buffer.extend_from_slice(&chunk[..read]);
        }
        let request_body = serde_json::from_slice(&buffer[body_start..body_start + length]).unwrap();

        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        stream.write_all(response.as_bytes()).await.unwrap();
        stream.shutdown().await.unwrap();
        let _ = sender.send(Captured {
            head,
            body: request_body,
        });
    });

    (format!("http://{address}/v1/graphql"), captured)
}

#[tokio::test]
async fn test_post_carries_headers_and_body() {
    let (url, captured) = serve_once("200 OK", r#"{"data":{"me":{"id":1}}}"#).await;
    let transport = ReqwestGraphQLTransport::new("authlink-test").unwrap();

    let mut headers = Headers::new();
    headers.insert("Authorization".to_string(), "Bearer abc".to_string());
    let response = transport
        .fetch(FetchRequest {
            url,
            options: FetchOptions::with_headers(headers),
            body: json!({"query": "{ me { id } }", "variables": {"limit": 1}}),
        })
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.body.data, Some(json!({"me": {"id": 1}})));

    let captured = captured.await.unwrap();
    assert!(captured.head.starts_with("POST /v1/graphql HTTP/1.1"));
    let head = captured.head.to_ascii_lowercase();
    assert!(head.contains("authorization: bearer abc"));
    assert!(head.contains("user-agent: authlink-test"));
    assert_eq!(captured.body["variables"], json!({"limit": 1}));
}

#[tokio::test]
async fn test_gateway_error_is_status_error() {
    let (url, _captured) = serve_once("502 Bad Gateway", r#"{"message":"upstream down"}"#).await;
    let transport = ReqwestGraphQLTransport::new("authlink-test").unwrap();

    let error = transport
        .fetch(FetchRequest {
            url,
            options: FetchOptions::default(),
            body: json!({"query": "{ a }"}),
        })
        .await
        .unwrap_err();
    assert_eq!(error.status(), Some(502));
}

#[tokio::test]
async fn test_unreachable_endpoint_is_connection_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    drop(listener);

    let transport = ReqwestGraphQLTransport::new("authlink-test").unwrap();
    let error = transport
        .fetch(FetchRequest {
            url: format!("http://{address}/v1/graphql"),
            options: FetchOptions::default(),
            body: json!({"query": "{ a }"}),
        })
        .await
        .unwrap_err();
    assert!(matches!(error, TransportError::ConnectionFailed(_)));
}

#[tokio::test]
async fn test_bound_client_sends_role_header_over_http() {
    let (url, captured) = serve_once("200 OK", r#"{"data":{"posts":[]}}"#).await;
    let provider = Arc::new(SessionIdentityProvider::new());
    provider.resolve_signed_out();
    let binder = TransportBinder::bind_with(
        ClientSettings::new(url).with_public_role("anonymous"),
        provider,
        BindOptions {
            subscriptions: false,
            ..BindOptions::default()
        },
    )
    .unwrap();

    let result = binder.client().query("{ posts { id } }", serde_json::Value::Null).await;
    assert_eq!(result.data, Some(json!({"posts": []})));

    let captured = captured.await.unwrap();
    let head = captured.head.to_ascii_lowercase();
    assert!(head.contains("role: anonymous"));
    assert!(!head.contains("authorization:"));
}
