//! Sending queries and mutations over the HTTP transport.

use std::sync::Arc;

use async_trait::async_trait;
use authlink_domain::{CombinedError, Operation, OperationKind, OperationResult};

use super::{Exchange, Next, OperationOutcome};
use crate::ports::{FetchRequest, GraphQLTransport};

/// Terminal exchange for queries and mutations.
///
/// Subscriptions are handed on to the next exchange.
pub struct FetchExchange {
    transport: Arc<dyn GraphQLTransport>,
}

impl FetchExchange {
    /// Creates the exchange over a transport.
    #[must_use]
    pub fn new(transport: Arc<dyn GraphQLTransport>) -> Self {
        Self { transport }
    }
}

impl std::fmt::Debug for FetchExchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchExchange").finish_non_exhaustive()
    }
}

#[async_trait]
impl Exchange for FetchExchange {
    fn name(&self) -> &'static str {
        "fetch"
    }

    async fn run(&self, operation: Operation, next: Next<'_>) -> OperationOutcome {
        if operation.kind == OperationKind::Subscription {
            return next.run(operation).await;
        }

        let request = FetchRequest::from_operation(&operation);
        tracing::debug!(kind = %operation.kind, key = %operation.key(), url = %request.url, "fetching");

        let result = match self.transport.fetch(request).await {
            Ok(response) => {
                let status = (response.status >= 400).then_some(response.status);
                OperationResult::from_execution(operation, response.body, status)
            }
            Err(error) => {
                tracing::debug!(%error, "fetch failed");
                let combined = CombinedError::network(error.to_string());
                let combined = match error.status() {
                    Some(status) => combined.with_status(status),
                    None => combined,
                };
                OperationResult::from_error(operation, combined)
            }
        };
        OperationOutcome::Single(result)
    }
}
