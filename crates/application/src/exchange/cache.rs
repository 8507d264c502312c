//! Document cache for query results.

use std::collections::HashMap;

use async_trait::async_trait;
use authlink_domain::{Operation, OperationKey, OperationKind, OperationResult, RequestPolicy};
use parking_lot::Mutex;

use super::{Exchange, Next, OperationOutcome};

/// Caches successful query results by operation key.
///
/// `cache-first` and `cache-only` answer from the cache when they can;
/// `network-only` and `cache-and-network` always dispatch and refresh the
/// entry. A successful mutation clears the whole cache.
#[derive(Debug, Default)]
pub struct CacheExchange {
    documents: Mutex<HashMap<OperationKey, OperationResult>>,
}

impl CacheExchange {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.lock().len()
    }

    /// Returns true if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.lock().is_empty()
    }

    fn lookup(&self, operation: &Operation) -> Option<OperationResult> {
        self.documents
            .lock()
            .get(&operation.key())
            .map(|cached| OperationResult {
                operation: operation.clone(),
                from_cache: true,
                ..cached.clone()
            })
    }

    async fn run_query(&self, operation: Operation, next: Next<'_>) -> OperationOutcome {
        let policy = operation.context.request_policy;
        if matches!(policy, RequestPolicy::CacheFirst | RequestPolicy::CacheOnly) {
            if let Some(hit) = self.lookup(&operation) {
                tracing::debug!(key = %operation.key(), "cache hit");
                return OperationOutcome::Single(hit);
            }
            if policy == RequestPolicy::CacheOnly {
                return OperationOutcome::Single(OperationResult {
                    operation,
                    data: None,
                    error: None,
                    extensions: None,
                    from_cache: true,
                });
            }
        }

        let key = operation.key();
        let outcome = next.run(operation).await;
        if let OperationOutcome::Single(result) = &outcome {
            if result.is_ok() && result.data.is_some() {
                self.documents.lock().insert(key, result.clone());
            }
        }
        outcome
    }
}

#[async_trait]
impl Exchange for CacheExchange {
    fn name(&self) -> &'static str {
        "cache"
    }

    async fn run(&self, operation: Operation, next: Next<'_>) -> OperationOutcome {
        match operation.kind {
            OperationKind::Query => self.run_query(operation, next).await,
            OperationKind::Mutation => {
                let outcome = next.run(operation).await;
                if matches!(&outcome, OperationOutcome::Single(result) if result.is_ok()) {
                    let mut documents = self.documents.lock();
                    if !documents.is_empty() {
                        tracing::debug!(count = documents.len(), "mutation invalidated cached documents");
                        documents.clear();
                    }
                }
                outcome
            }
            OperationKind::Subscription => next.run(operation).await,
        }
    }
}
