//! Reporting failed results.

use std::sync::Arc;

use async_trait::async_trait;
use authlink_domain::{CombinedError, Operation, OperationResult};
use futures_util::StreamExt;

use super::{Exchange, Next, OperationOutcome};

/// Callback for every result that carries an error.
pub type ErrorHandler = Arc<dyn Fn(&CombinedError, &Operation) + Send + Sync>;

/// Rewrites the first `[GraphQL]` prefix of a combined error message.
#[must_use]
pub fn server_error_message(message: &str) -> String {
    message.replacen("[GraphQL]", "Server error:", 1)
}

/// Default handler: logs the error at error level.
pub fn log_server_error(error: &CombinedError, operation: &Operation) {
    tracing::error!(
        kind = %operation.kind,
        key = %operation.key(),
        "{}",
        server_error_message(&error.message())
    );
}

/// Invokes a handler for failed results without altering them.
pub struct ErrorExchange {
    handler: ErrorHandler,
}

impl ErrorExchange {
    /// Creates the exchange with a custom handler.
    #[must_use]
    pub fn new(handler: ErrorHandler) -> Self {
        Self { handler }
    }

    /// Creates the exchange with [`log_server_error`].
    #[must_use]
    pub fn logging() -> Self {
        Self::new(Arc::new(log_server_error))
    }
}

impl Default for ErrorExchange {
    fn default() -> Self {
        Self::logging()
    }
}

impl std::fmt::Debug for ErrorExchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorExchange").finish_non_exhaustive()
    }
}

fn report(handler: &ErrorHandler, result: &OperationResult) {
    if let Some(error) = result.error.as_ref().filter(|error| !error.is_empty()) {
        handler(error, &result.operation);
    }
}

#[async_trait]
impl Exchange for ErrorExchange {
    fn name(&self) -> &'static str {
        "error"
    }

    async fn run(&self, operation: Operation, next: Next<'_>) -> OperationOutcome {
        match next.run(operation).await {
            OperationOutcome::Single(result) => {
                report(&self.handler, &result);
                OperationOutcome::Single(result)
            }
            OperationOutcome::Stream(results) => {
                let handler = Arc::clone(&self.handler);
                OperationOutcome::Stream(
                    results
                        .inspect(move |result| report(&handler, result))
                        .boxed(),
                )
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::exchange::{FetchExchange, Pipeline};
    use crate::ports::TransportError;
    use crate::test_support::{StubTransport, operation};
    use authlink_domain::{GraphQLError, OperationKind};
    use futures_util::stream;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    fn recording() -> (ErrorHandler, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let handler: ErrorHandler = Arc::new(move |error: &CombinedError, _: &Operation| {
            sink.lock().push(server_error_message(&error.message()));
        });
        (handler, seen)
    }

    #[test]
    fn test_only_first_prefix_is_rewritten() {
        assert_eq!(
            server_error_message("[GraphQL] denied\n[GraphQL] missing field"),
            "Server error: denied\n[GraphQL] missing field"
        );
        assert_eq!(server_error_message("[Network] offline"), "[Network] offline");
    }

    #[tokio::test]
    async fn test_failed_results_reach_handler() {
        let transport = StubTransport::new();
        transport.push_errors(vec![GraphQLError::new("denied")]);
        transport.push_failure(TransportError::Timeout);
        let (handler, seen) = recording();
        let pipeline = Pipeline::new(vec![
            Arc::new(ErrorExchange::new(handler)) as Arc<dyn Exchange>,
            Arc::new(FetchExchange::new(transport)),
        ]);

        pipeline.execute(operation(OperationKind::Query, "{ a }")).await;
        pipeline.execute(operation(OperationKind::Query, "{ b }")).await;
        pipeline.execute(operation(OperationKind::Query, "{ c }")).await;

        assert_eq!(
            *seen.lock(),
            vec![
                "Server error: denied".to_string(),
                "[Network] request timed out".to_string(),
            ]
        );
    }

    struct Streaming;

    #[async_trait]
    impl Exchange for Streaming {
        fn name(&self) -> &'static str {
            "streaming"
        }

        async fn run(&self, operation: Operation, _next: Next<'_>) -> OperationOutcome {
            let ok = OperationResult {
                operation: operation.clone(),
                data: Some(serde_json::json!({"feed": 1})),
                error: None,
                extensions: None,
                from_cache: false,
            };
            let failed = OperationResult::from_error(
                operation,
                CombinedError::graphql(vec![GraphQLError::new("boom")]),
            );
            OperationOutcome::Stream(stream::iter(vec![ok, failed]).boxed())
        }
    }

    #[tokio::test]
    async fn test_stream_items_reach_handler() {
        let (handler, seen) = recording();
        let pipeline = Pipeline::new(vec![
            Arc::new(ErrorExchange::new(handler)) as Arc<dyn Exchange>,
            Arc::new(Streaming),
        ]);
        let results: Vec<_> = pipeline
            .execute(operation(OperationKind::Subscription, "subscription { feed }"))
            .await
            .into_stream()
            .collect()
            .await;

        assert_eq!(results.len(), 2);
        assert_eq!(*seen.lock(), vec!["Server error: boom".to_string()]);
    }
}
