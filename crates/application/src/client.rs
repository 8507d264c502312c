//! GraphQL client over the exchange pipeline.

use std::sync::Arc;

use authlink_domain::{
    FetchOptionsSource, GraphQLRequest, Operation, OperationContext, OperationKind,
    OperationResult, RequestPolicy,
};

use crate::error::{ApplicationError, ApplicationResult};
use crate::exchange::{
    AuthExchange, AuthHooks, CacheExchange, DedupExchange, ErrorExchange, ErrorHandler, Exchange,
    FetchExchange, OperationOutcome, Pipeline, ResultStream, SubscriptionExchange,
};
use crate::ports::{ExecutionStream, GraphQLTransport, SubscriptionError, SubscriptionForwarder};

/// Executes operations against one endpoint.
///
/// Cloning is cheap; clones share the pipeline (and therefore the cache and
/// auth state).
#[derive(Debug, Clone)]
pub struct GraphQLClient {
    url: Arc<str>,
    request_policy: RequestPolicy,
    fetch_options: Option<FetchOptionsSource>,
    pipeline: Pipeline,
}

impl GraphQLClient {
    /// Starts building a client for `url`.
    #[must_use]
    pub fn builder(url: impl Into<Arc<str>>) -> ClientBuilder {
        ClientBuilder::new(url)
    }

    /// The endpoint URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The default request policy.
    #[must_use]
    pub const fn request_policy(&self) -> RequestPolicy {
        self.request_policy
    }

    /// The pipeline this client runs.
    #[must_use]
    pub const fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Wraps a request in an operation carrying the client defaults.
    #[must_use]
    pub fn create_operation(&self, kind: OperationKind, request: GraphQLRequest) -> Operation {
        let context = OperationContext {
            request_policy: self.request_policy,
            fetch_options: self.fetch_options.clone(),
            ..OperationContext::new(Arc::clone(&self.url))
        };
        Operation::new(kind, request, context)
    }

    /// Runs an operation through the pipeline.
    pub async fn execute(&self, operation: Operation) -> OperationOutcome {
        self.pipeline.execute(operation).await
    }

    /// Runs a query.
    pub async fn query(&self, query: &str, variables: serde_json::Value) -> OperationResult {
        self.execute_single(OperationKind::Query, GraphQLRequest::new(query, variables))
            .await
    }

    /// Runs a mutation.
    pub async fn mutation(&self, query: &str, variables: serde_json::Value) -> OperationResult {
        self.execute_single(OperationKind::Mutation, GraphQLRequest::new(query, variables))
            .await
    }

    /// Starts a subscription; dropping the stream stops it.
    pub async fn subscription(&self, query: &str, variables: serde_json::Value) -> ResultStream {
        let operation = self.create_operation(
            OperationKind::Subscription,
            GraphQLRequest::new(query, variables),
        );
        self.execute(operation).await.into_stream()
    }

    async fn execute_single(&self, kind: OperationKind, request: GraphQLRequest) -> OperationResult {
        let operation = self.create_operation(kind, request);
        self.execute(operation.clone()).await.into_result(operation).await
    }
}

/// Stands in when no subscription connection is configured.
struct NoSubscriptions;

impl SubscriptionForwarder for NoSubscriptions {
    fn forward(&self, _operation: &Operation) -> Result<ExecutionStream, SubscriptionError> {
        Err(SubscriptionError::Unavailable)
    }
}

/// Assembles a [`GraphQLClient`].
///
/// The pipeline order is fixed: dedup, cache, error, auth, fetch,
/// subscription.
pub struct ClientBuilder {
    url: Arc<str>,
    request_policy: RequestPolicy,
    fetch_options: Option<FetchOptionsSource>,
    auth_hooks: Option<Arc<dyn AuthHooks>>,
    transport: Option<Arc<dyn GraphQLTransport>>,
    forwarder: Option<Arc<dyn SubscriptionForwarder>>,
    on_error: Option<ErrorHandler>,
}

impl ClientBuilder {
    /// Creates a builder with the default request policy.
    #[must_use]
    pub fn new(url: impl Into<Arc<str>>) -> Self {
        Self {
            url: url.into(),
            request_policy: RequestPolicy::default(),
            fetch_options: None,
            auth_hooks: None,
            transport: None,
            forwarder: None,
            on_error: None,
        }
    }

    /// Sets the default request policy.
    #[must_use]
    pub const fn request_policy(mut self, request_policy: RequestPolicy) -> Self {
        self.request_policy = request_policy;
        self
    }

    /// Fetch options attached to every operation.
    #[must_use]
    pub fn fetch_options(mut self, fetch_options: impl Into<FetchOptionsSource>) -> Self {
        self.fetch_options = Some(fetch_options.into());
        self
    }

    /// Enables the auth exchange.
    #[must_use]
    pub fn auth_hooks(mut self, hooks: Arc<dyn AuthHooks>) -> Self {
        self.auth_hooks = Some(hooks);
        self
    }

    /// Sets the HTTP transport (required).
    #[must_use]
    pub fn fetch(mut self, transport: Arc<dyn GraphQLTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets the subscription connection.
    #[must_use]
    pub fn subscriptions(mut self, forwarder: Arc<dyn SubscriptionForwarder>) -> Self {
        self.forwarder = Some(forwarder);
        self
    }

    /// Replaces the default error logger.
    #[must_use]
    pub fn on_error(mut self, handler: ErrorHandler) -> Self {
        self.on_error = Some(handler);
        self
    }

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// Returns [`ApplicationError::Configuration`] when no transport was set.
    pub fn build(self) -> ApplicationResult<GraphQLClient> {
        let transport = self
            .transport
            .ok_or_else(|| ApplicationError::Configuration("a fetch transport is required".to_string()))?;
        let errors = self.on_error.map_or_else(ErrorExchange::logging, ErrorExchange::new);
        let forwarder = self
            .forwarder
            .unwrap_or_else(|| Arc::new(NoSubscriptions) as Arc<dyn SubscriptionForwarder>);

        let mut exchanges: Vec<Arc<dyn Exchange>> = vec![
            Arc::new(DedupExchange::new()),
            Arc::new(CacheExchange::new()),
            Arc::new(errors),
        ];
        if let Some(hooks) = self.auth_hooks {
            exchanges.push(Arc::new(AuthExchange::new(hooks)));
        }
        exchanges.push(Arc::new(FetchExchange::new(transport)));
        exchanges.push(Arc::new(SubscriptionExchange::new(forwarder)));

        let pipeline = Pipeline::new(exchanges);
        tracing::debug!(url = %self.url, exchanges = ?pipeline.names(), "client built");
        Ok(GraphQLClient {
            url: self.url,
            request_policy: self.request_policy,
            fetch_options: self.fetch_options,
            pipeline,
        })
    }
}

impl std::fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("url", &self.url)
            .field("request_policy", &self.request_policy)
            .finish_non_exhaustive()
    }
}
