//! Shared fakes for unit tests.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use authlink_domain::{
    ExecutionResult, GraphQLError, GraphQLRequest, Operation, OperationContext, OperationKind,
};
use parking_lot::Mutex;

use crate::ports::{
    AuthProviderError, AuthStateListener, AuthSubscription, FetchRequest, GraphQLTransport,
    IdentityProvider, StorageError, TokenStorage, TransportError, TransportResponse,
};

pub const ENDPOINT: &str = "https://api.example.com/graphql";

pub fn operation(kind: OperationKind, query: &str) -> Operation {
    Operation::new(
        kind,
        GraphQLRequest::new(query, serde_json::Value::Null),
        OperationContext::new(ENDPOINT),
    )
}

/// Identity provider whose state tests flip by hand.
#[derive(Default)]
pub struct StubProvider {
    signed_in: Mutex<bool>,
    token: Mutex<Option<String>>,
    listeners: Arc<Mutex<Vec<AuthStateListener>>>,
    pub refresh_calls: Mutex<Vec<String>>,
    pub refresh_result: Mutex<Option<Result<(), AuthProviderError>>>,
}

impl StubProvider {
    pub fn signed_out() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn signed_in(token: &str) -> Arc<Self> {
        let provider = Self::default();
        *provider.signed_in.lock() = true;
        *provider.token.lock() = Some(token.to_string());
        Arc::new(provider)
    }

    pub fn set_token(&self, token: Option<&str>) {
        *self.token.lock() = token.map(str::to_string);
    }

    pub fn set_signed_in(&self, signed_in: bool) {
        *self.signed_in.lock() = signed_in;
        let listeners = self.listeners.lock().clone();
        for listener in listeners {
            listener(signed_in);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }
}

#[async_trait]
impl IdentityProvider for StubProvider {
    fn is_authenticated(&self) -> bool {
        *self.signed_in.lock()
    }

    fn jwt_token(&self) -> Option<String> {
        self.token.lock().clone()
    }

    fn on_auth_state_changed(&self, listener: AuthStateListener) -> AuthSubscription {
        self.listeners.lock().push(Arc::clone(&listener));
        let listeners = Arc::clone(&self.listeners);
        AuthSubscription::new(move || {
            listeners.lock().retain(|l| !Arc::ptr_eq(l, &listener));
        })
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<(), AuthProviderError> {
        self.refresh_calls.lock().push(refresh_token.to_string());
        self.refresh_result
            .lock()
            .clone()
            .unwrap_or(Err(AuthProviderError::RefreshUnsupported))
    }
}

/// In-memory storage.
#[derive(Default)]
pub struct StubStorage(Mutex<HashMap<String, String>>);

impl StubStorage {
    pub fn with(key: &str, value: &str) -> Arc<Self> {
        let storage = Self::default();
        storage.0.lock().insert(key.to_string(), value.to_string());
        Arc::new(storage)
    }
}

#[async_trait]
impl TokenStorage for StubStorage {
    async fn get_item(&self, key: &str) -> Option<String> {
        self.0.lock().get(key).cloned()
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.0.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.0.lock().remove(key);
        Ok(())
    }
}

/// Transport that records requests and replays scripted responses.
#[derive(Default)]
pub struct StubTransport {
    pub requests: Mutex<Vec<FetchRequest>>,
    responses: Mutex<VecDeque<Result<TransportResponse, TransportError>>>,
    calls: AtomicUsize,
    pub delay: Option<std::time::Duration>,
}

impl StubTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn delayed(delay: std::time::Duration) -> Arc<Self> {
        Arc::new(Self {
            delay: Some(delay),
            ..Self::default()
        })
    }

    pub fn push_data(&self, data: serde_json::Value) {
        self.responses.lock().push_back(Ok(TransportResponse {
            status: 200,
            body: ExecutionResult {
                data: Some(data),
                ..ExecutionResult::default()
            },
        }));
    }

    pub fn push_errors(&self, errors: Vec<GraphQLError>) {
        self.responses.lock().push_back(Ok(TransportResponse {
            status: 200,
            body: ExecutionResult {
                data: None,
                errors: Some(errors),
                extensions: None,
            },
        }));
    }

    pub fn push_failure(&self, error: TransportError) {
        self.responses.lock().push_back(Err(error));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn header(&self, index: usize, name: &str) -> Option<String> {
        self.requests.lock()[index].options.header(name).map(str::to_string)
    }
}

#[async_trait]
impl GraphQLTransport for StubTransport {
    async fn fetch(&self, request: FetchRequest) -> Result<TransportResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.responses.lock().pop_front().unwrap_or_else(|| {
            Ok(TransportResponse {
                status: 200,
                body: ExecutionResult {
                    data: Some(serde_json::json!({})),
                    ..ExecutionResult::default()
                },
            })
        })
    }
}
