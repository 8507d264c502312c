//! Exchange pipeline
//!
//! Every operation passes through an ordered list of exchanges. Each exchange
//! may answer the operation itself or hand it to the rest of the pipeline via
//! [`Next`]. Queries and mutations produce a single result; subscriptions
//! produce a stream.

mod auth;
mod cache;
mod dedup;
mod errors;
mod fetch;
mod subscription;

use std::sync::Arc;

use async_trait::async_trait;
use authlink_domain::{CombinedError, Operation, OperationResult};
use futures_util::stream::{self, BoxStream};
use futures_util::StreamExt;

pub use auth::{AuthExchange, AuthHooks, ProviderAuthHooks};
pub use cache::CacheExchange;
pub use dedup::DedupExchange;
pub use errors::{ErrorExchange, ErrorHandler, log_server_error, server_error_message};
pub use fetch::FetchExchange;
pub use subscription::SubscriptionExchange;

/// Stream of results for one subscription.
pub type ResultStream = BoxStream<'static, OperationResult>;

/// What an exchange hands back for an operation.
pub enum OperationOutcome {
    /// One result (queries and mutations).
    Single(OperationResult),
    /// Live results (subscriptions).
    Stream(ResultStream),
}

impl OperationOutcome {
    /// The single result, or the first item of a stream.
    ///
    /// `operation` is used to report a stream that ended without results.
    pub async fn into_result(self, operation: Operation) -> OperationResult {
        match self {
            Self::Single(result) => result,
            Self::Stream(mut results) => results.next().await.unwrap_or_else(|| {
                OperationResult::from_error(
                    operation,
                    CombinedError::network("stream ended without a result"),
                )
            }),
        }
    }

    /// Any outcome as a stream.
    #[must_use]
    pub fn into_stream(self) -> ResultStream {
        match self {
            Self::Single(result) => stream::once(async move { result }).boxed(),
            Self::Stream(results) => results,
        }
    }
}

impl std::fmt::Debug for OperationOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Single(result) => f.debug_tuple("Single").field(result).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// One stage of the pipeline.
#[async_trait]
pub trait Exchange: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Handles an operation, delegating to `next` where appropriate.
    async fn run(&self, operation: Operation, next: Next<'_>) -> OperationOutcome;
}

/// The remainder of the pipeline after the current exchange.
///
/// `Next` is `Copy`, so an exchange may dispatch more than once (the auth
/// exchange retries through it).
#[derive(Clone, Copy)]
pub struct Next<'a> {
    rest: &'a [Arc<dyn Exchange>],
}

impl<'a> Next<'a> {
    const fn new(rest: &'a [Arc<dyn Exchange>]) -> Self {
        Self { rest }
    }

    /// Runs the operation through the remaining exchanges.
    pub async fn run(self, operation: Operation) -> OperationOutcome {
        match self.rest.split_first() {
            Some((head, tail)) => head.run(operation, Next::new(tail)).await,
            None => {
                tracing::warn!(
                    kind = %operation.kind,
                    key = %operation.key(),
                    "no exchange handled the operation"
                );
                OperationOutcome::Single(OperationResult::from_error(
                    operation,
                    CombinedError::network("no exchange handled the operation"),
                ))
            }
        }
    }
}

/// An ordered, immutable list of exchanges.
#[derive(Clone)]
pub struct Pipeline {
    exchanges: Arc<[Arc<dyn Exchange>]>,
}

impl Pipeline {
    /// Creates a pipeline; exchanges run in the given order.
    #[must_use]
    pub fn new(exchanges: Vec<Arc<dyn Exchange>>) -> Self {
        Self {
            exchanges: exchanges.into(),
        }
    }

    /// Runs an operation through every exchange.
    pub async fn execute(&self, operation: Operation) -> OperationOutcome {
        Next::new(&self.exchanges).run(operation).await
    }

    /// Exchange names in order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.exchanges.iter().map(|exchange| exchange.name()).collect()
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
