//! Routing subscriptions to the live connection.

use std::sync::Arc;

use async_trait::async_trait;
use authlink_domain::{CombinedError, Operation, OperationKind, OperationResult};
use futures_util::StreamExt;

use super::{Exchange, Next, OperationOutcome};
use crate::ports::SubscriptionForwarder;

/// Terminal exchange for subscriptions.
///
/// Queries and mutations are handed on to the next exchange.
pub struct SubscriptionExchange {
    forwarder: Arc<dyn SubscriptionForwarder>,
}

impl SubscriptionExchange {
    /// Creates the exchange over a forwarder.
    #[must_use]
    pub fn new(forwarder: Arc<dyn SubscriptionForwarder>) -> Self {
        Self { forwarder }
    }
}

impl std::fmt::Debug for SubscriptionExchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionExchange").finish_non_exhaustive()
    }
}

#[async_trait]
impl Exchange for SubscriptionExchange {
    fn name(&self) -> &'static str {
        "subscription"
    }

    async fn run(&self, operation: Operation, next: Next<'_>) -> OperationOutcome {
        if operation.kind != OperationKind::Subscription {
            return next.run(operation).await;
        }

        match self.forwarder.forward(&operation) {
            Ok(results) => OperationOutcome::Stream(
                results
                    .map(move |item| match item {
                        Ok(result) => OperationResult::from_execution(operation.clone(), result, None),
                        Err(error) => OperationResult::from_error(
                            operation.clone(),
                            CombinedError::network(error.to_string()),
                        ),
                    })
                    .boxed(),
            ),
            Err(error) => {
                tracing::warn!(%error, key = %operation.key(), "subscription could not be started");
                OperationOutcome::Single(OperationResult::from_error(
                    operation,
                    CombinedError::network(error.to_string()),
                ))
            }
        }
    }
}
