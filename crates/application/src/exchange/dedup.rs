//! Sharing one dispatch between identical in-flight queries.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use authlink_domain::{CombinedError, Operation, OperationKey, OperationKind, OperationResult};
use parking_lot::Mutex;
use tokio::sync::oneshot;

use super::{Exchange, Next, OperationOutcome};

type Waiters = HashMap<OperationKey, Vec<oneshot::Sender<OperationResult>>>;

/// Deduplicates concurrent queries with the same key.
///
/// The first query is dispatched; later identical queries wait for its result.
/// Mutations and subscriptions always pass through.
#[derive(Debug, Default)]
pub struct DedupExchange {
    in_flight: Arc<Mutex<Waiters>>,
}

impl DedupExchange {
    /// Creates the exchange.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently being dispatched.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().len()
    }
}

/// Owns the in-flight entry of the leading dispatch.
///
/// [`Lead::finish`] hands the result to the waiters and disarms the guard.
/// A lead dropped while still armed was cancelled, so its entry is removed
/// and the waiters see their senders close.
struct Lead {
    key: OperationKey,
    in_flight: Arc<Mutex<Waiters>>,
    armed: bool,
}

impl Lead {
    fn finish(&mut self, result: &OperationResult) {
        self.armed = false;
        let waiters = self.in_flight.lock().remove(&self.key).unwrap_or_default();
        for waiter in waiters {
            let _ = waiter.send(result.clone());
        }
    }
}

impl Drop for Lead {
    fn drop(&mut self) {
        // After `finish` the key may already belong to a newer lead.
        if self.armed {
            self.in_flight.lock().remove(&self.key);
        }
    }
}

#[async_trait]
impl Exchange for DedupExchange {
    fn name(&self) -> &'static str {
        "dedup"
    }

    async fn run(&self, operation: Operation, next: Next<'_>) -> OperationOutcome {
        if operation.kind != OperationKind::Query {
            return next.run(operation).await;
        }

        let key = operation.key();
        let waiting = {
            let mut in_flight = self.in_flight.lock();
            if let Some(waiters) = in_flight.get_mut(&key) {
                let (sender, receiver) = oneshot::channel();
                waiters.push(sender);
                Some(receiver)
            } else {
                in_flight.insert(key, Vec::new());
                None
            }
        };

        if let Some(receiver) = waiting {
            tracing::debug!(%key, "joining in-flight query");
            let result = receiver.await.unwrap_or_else(|_| {
                OperationResult::from_error(
                    operation.clone(),
                    CombinedError::network("deduplicated query was cancelled"),
                )
            });
            return OperationOutcome::Single(OperationResult {
                operation,
                ..result
            });
        }

        let mut lead = Lead {
            key,
            in_flight: Arc::clone(&self.in_flight),
            armed: true,
        };
        let outcome = next.run(operation).await;
        if let OperationOutcome::Single(result) = &outcome {
            lead.finish(result);
        }
        outcome
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::exchange::{FetchExchange, Pipeline};
    use crate::test_support::{StubTransport, operation};
    use std::time::Duration;

    fn pipeline(transport: Arc<StubTransport>) -> (Pipeline, Arc<DedupExchange>) {
        let dedup = Arc::new(DedupExchange::new());
        let pipeline = Pipeline::new(vec![
            dedup.clone() as Arc<dyn Exchange>,
            Arc::new(FetchExchange::new(transport)),
        ]);
        (pipeline, dedup)
    }

    #[tokio::test]
    async fn test_concurrent_identical_queries_share_dispatch() {
        let transport = StubTransport::delayed(Duration::from_millis(50));
        transport.push_data(serde_json::json!({"me": {"id": 1}}));
        let (pipeline, dedup) = pipeline(transport.clone());

        let op = operation(OperationKind::Query, "{ me { id } }");
        let (a, b) = tokio::join!(pipeline.execute(op.clone()), pipeline.execute(op.clone()));

        assert_eq!(transport.calls(), 1);
        for outcome in [a, b] {
            let result = outcome.into_result(op.clone()).await;
            assert_eq!(result.data, Some(serde_json::json!({"me": {"id": 1}})));
        }
        assert_eq!(dedup.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_sequential_queries_dispatch_again() {
        let transport = StubTransport::new();
        let (pipeline, _) = pipeline(transport.clone());
        let op = operation(OperationKind::Query, "{ me { id } }");
        pipeline.execute(op.clone()).await;
        pipeline.execute(op).await;
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn test_mutations_are_not_deduplicated() {
        let transport = StubTransport::delayed(Duration::from_millis(20));
        let (pipeline, _) = pipeline(transport.clone());
        let op = operation(OperationKind::Mutation, "mutation { like }");
        tokio::join!(pipeline.execute(op.clone()), pipeline.execute(op));
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_back_to_back_queries_never_see_cancellation() {
        let transport = StubTransport::delayed(Duration::from_millis(20));
        let (pipeline, dedup) = pipeline(transport);
        let op = operation(OperationKind::Query, "{ me { id } }");

        for _ in 0..10 {
            let tasks: Vec<_> = (0..100)
                .map(|_| {
                    let pipeline = pipeline.clone();
                    let op = op.clone();
                    tokio::spawn(async move {
                        let mut failures = 0;
                        for _ in 0..2 {
                            let result = pipeline
                                .execute(op.clone())
                                .await
                                .into_result(op.clone())
                                .await;
                            if !result.is_ok() {
                                failures += 1;
                            }
                        }
                        failures
                    })
                })
                .collect();

            let mut failures = 0;
            for task in tasks {
                failures += task.await.unwrap();
            }
            assert_eq!(failures, 0);
        }
        assert_eq!(dedup.in_flight(), 0);
    }

    #[test]
    fn test_finished_lead_leaves_newer_entry_alone() {
        let in_flight = Arc::new(Mutex::new(Waiters::new()));
        let op = operation(OperationKind::Query, "{ a }");
        let key = op.key();

        let (first_sender, first_receiver) = oneshot::channel();
        in_flight.lock().insert(key, vec![first_sender]);
        let mut lead = Lead {
            key,
            in_flight: Arc::clone(&in_flight),
            armed: true,
        };
        lead.finish(&OperationResult::from_error(op, CombinedError::network("x")));
        assert!(first_receiver.blocking_recv().is_ok());

        // A newer lead registers before the finished one goes away.
        let (sender, mut receiver) = oneshot::channel::<OperationResult>();
        in_flight.lock().insert(key, vec![sender]);
        drop(lead);

        assert_eq!(in_flight.lock().get(&key).map(Vec::len), Some(1));
        assert!(matches!(
            receiver.try_recv(),
            Err(oneshot::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn test_cancelled_lead_clears_entry() {
        let transport = StubTransport::delayed(Duration::from_secs(5));
        let (pipeline, dedup) = pipeline(transport);
        let op = operation(OperationKind::Query, "{ slow }");
        let _ = tokio::time::timeout(Duration::from_millis(10), pipeline.execute(op)).await;
        assert_eq!(dedup.in_flight(), 0);
    }
}
