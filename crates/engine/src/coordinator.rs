//! Fan-out / fan-in over the requested providers.
//!
//! Every dispatched provider runs in its own task under an outer deadline of
//! `per_call_timeout + hard_deadline_buffer`. The buffer leaves room for the
//! retry executor's back-off, so the outer deadline only fires when the whole
//! retry sequence has overrun. The coordinator returns once every task has
//! produced exactly one result.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use domain::{ErrorCategory, LatencyMs, ProviderFailure, ProviderId, ProviderResult};
use futures::future::join_all;
use tracing::{error, warn, Instrument};

use crate::breaker::CircuitBreaker;
use crate::config::FanOutConfig;
use crate::registry::ProviderRegistry;
use crate::retry::{panic_message, RetryExecutor};

/// Message reported for providers that are requested but not configured.
pub const NOT_INITIALIZED_MESSAGE: &str = "Provider not initialized (missing API key?)";

/// Requested providers split by dispatchability, in request order without
/// duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition {
    pub available: Vec<ProviderId>,
    pub skipped: Vec<ProviderId>,
}

/// Dispatches providers concurrently and collects one result per provider.
#[derive(Debug, Clone)]
pub struct FanOutCoordinator {
    registry: Arc<ProviderRegistry>,
    breaker: Arc<CircuitBreaker>,
    executor: RetryExecutor,
    config: FanOutConfig,
}

impl FanOutCoordinator {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        breaker: Arc<CircuitBreaker>,
        executor: RetryExecutor,
        config: FanOutConfig,
    ) -> Self {
        Self {
            registry,
            breaker,
            executor,
            config,
        }
    }

    /// Outer deadline applied to one provider's whole retry sequence.
    pub fn outer_deadline(&self, per_call_timeout: Duration) -> Duration {
        per_call_timeout.saturating_add(self.config.hard_deadline_buffer)
    }

    /// Splits `requested` into dispatchable and not-initialized providers.
    pub fn partition(&self, requested: &[ProviderId]) -> Partition {
        let mut seen = HashSet::new();
        let mut partition = Partition::default();
        for id in requested {
            if !seen.insert(id) {
                continue;
            }
            if self.registry.is_available(id) {
                partition.available.push(id.clone());
            } else {
                partition.skipped.push(id.clone());
            }
        }
        partition
    }

    /// Runs every requested provider and returns one result per provider.
    ///
    /// Not-initialized providers are reported without an attempt. The call
    /// never returns early: callers need the full per-provider breakdown.
    pub async fn dispatch(
        &self,
        requested: &[ProviderId],
        prompt: &str,
        per_call_timeout: Duration,
    ) -> BTreeMap<ProviderId, ProviderResult> {
        let partition = self.partition(requested);
        let mut results = BTreeMap::new();

        for id in partition.skipped {
            let failure = ProviderFailure::new(ErrorCategory::NotInitialized, NOT_INITIALIZED_MESSAGE);
            results.insert(id.clone(), ProviderResult::failure(id, failure, LatencyMs::ZERO, 0));
        }

        let outer = self.outer_deadline(per_call_timeout);
        let max_retries = self.executor.default_max_retries();
        let prompt: Arc<str> = Arc::from(prompt);

        let mut ids = Vec::with_capacity(partition.available.len());
        let mut handles = Vec::with_capacity(partition.available.len());

        for id in partition.available {
            let Some(capability) = self.registry.capability(&id) else {
                continue;
            };
            let executor = self.executor.clone();
            let breaker = self.breaker.clone();
            let prompt = prompt.clone();
            let provider = id.clone();

            let task = async move {
                let attempts = AtomicU32::new(0);
                let run = executor.execute(
                    &provider,
                    capability.as_ref(),
                    &prompt,
                    per_call_timeout,
                    max_retries,
                    &attempts,
                );
                let outcome = tokio::time::timeout(outer, run).await;
                match outcome {
                    Ok(result) => result,
                    Err(_) => {
                        let attempt = attempts.load(Ordering::Relaxed).max(1);
                        warn!(provider = %provider, attempt, deadline_secs = outer.as_secs(), "Outer deadline reached");
                        breaker.on_failure(&provider, ErrorCategory::Timeout);
                        ProviderResult::failure(
                            provider,
                            ProviderFailure::timeout(outer),
                            LatencyMs::from_duration(outer),
                            attempt,
                        )
                        .with_model(capability.model_name().clone())
                    }
                }
            };

            ids.push(id);
            handles.push(tokio::spawn(task.in_current_span()));
        }

        let joined = join_all(handles).await;
        for (id, outcome) in ids.into_iter().zip(joined) {
            let result = match outcome {
                Ok(result) => result,
                Err(join_error) => {
                    error!(provider = %id, error = %join_error, "Provider task aborted");
                    let message = if join_error.is_panic() {
                        panic_message(join_error.into_panic().as_ref())
                    } else {
                        join_error.to_string()
                    };
                    let failure = ProviderFailure::new(ErrorCategory::Unknown, message);
                    ProviderResult::failure(id.clone(), failure, LatencyMs::ZERO, 1)
                }
            };
            results.insert(id, result);
        }

        results
    }
}
