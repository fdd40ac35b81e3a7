//! Timeout and retry policy at the capability boundary.
//!
//! Pipelines never retry; whatever this wrapper finally returns is what the
//! run sees.

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

use extract::capability::{Capabilities, CapabilityResult};
use extract::CapabilityError;

use crate::retry::RetryPolicy;

pub struct BoundedCapabilities<C> {
    inner: C,
    timeout: Duration,
    retry: RetryPolicy,
}

impl<C: Capabilities> BoundedCapabilities<C> {
    pub fn new(inner: C, timeout: Duration, retry: RetryPolicy) -> Self {
        Self {
            inner,
            timeout,
            retry,
        }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    async fn call<F, Fut>(&self, operation: &str, mut f: F) -> CapabilityResult
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = CapabilityResult> + Send,
    {
        let timeout = self.timeout;
        self.retry
            .retry(operation, is_transient, || {
                let attempt = f();
                async move {
                    tokio::time::timeout(timeout, attempt)
                        .await
                        .unwrap_or(Err(CapabilityError::Timeout(timeout)))
                }
            })
            .await
    }
}

/// Transport failures and timeouts may succeed on a second try; a response
/// the boundary cannot decode will not.
fn is_transient(error: &CapabilityError) -> bool {
    matches!(
        error,
        CapabilityError::Unavailable(_) | CapabilityError::Timeout(_)
    )
}

#[async_trait]
impl<C: Capabilities> Capabilities for BoundedCapabilities<C> {
    async fn extract_entities(&self, context: &str) -> CapabilityResult {
        self.call("extract_entities", || self.inner.extract_entities(context))
            .await
    }

    async fn summarize_memory(&self, context: &str) -> CapabilityResult {
        self.call("summarize_memory", || self.inner.summarize_memory(context))
            .await
    }

    async fn check_entity_consistency(&self, entity_json: &str) -> CapabilityResult {
        self.call("check_entity_consistency", || {
            self.inner.check_entity_consistency(entity_json)
        })
        .await
    }

    async fn correct_text(&self, chunk: &str, conflicts: &str) -> CapabilityResult {
        self.call("correct_text", || self.inner.correct_text(chunk, conflicts))
            .await
    }

    async fn check_grammar(&self, chunk: &str) -> CapabilityResult {
        self.call("check_grammar", || self.inner.check_grammar(chunk))
            .await
    }
}
