//! Bounded retries with exponential back-off around one provider.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use domain::{
    ErrorCategory, LatencyMs, ProviderCapability, ProviderFailure, ProviderId, ProviderResult,
    RetryPolicy,
};
use futures::FutureExt;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use crate::breaker::{cooldown_message, Admission, CircuitBreaker};
use crate::config::RetryConfig;

// ---------------------------------------------------------------------------
// Back-off schedule
// ---------------------------------------------------------------------------

/// Exponential back-off state for one execution.
///
/// A positive provider hint replaces the computed wait for that single retry
/// and leaves the schedule untouched; unhinted waits double it up to `max`.
#[derive(Debug, Clone)]
pub struct Backoff {
    next: Duration,
    max: Duration,
}

impl Backoff {
    /// Starts a schedule at `base`, never exceeding `max`.
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            next: base.min(max),
            max,
        }
    }

    /// Returns how long to wait before the next attempt.
    pub fn next_wait(&mut self, hint: Option<Duration>) -> Duration {
        match hint {
            Some(hint) if !hint.is_zero() => hint,
            _ => {
                let wait = self.next;
                self.next = self.next.saturating_mul(2).min(self.max);
                wait
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

/// Runs one provider call with retries and breaker bookkeeping.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    breaker: Arc<CircuitBreaker>,
    config: RetryConfig,
}

impl RetryExecutor {
    /// Creates an executor sharing `breaker` with every other executor.
    pub fn new(breaker: Arc<CircuitBreaker>, config: RetryConfig) -> Self {
        Self { breaker, config }
    }

    /// Configured retries after the first attempt.
    pub fn default_max_retries(&self) -> u32 {
        self.config.max_retries
    }

    /// Executes `capability` for `provider_id`.
    ///
    /// Never fails: every outcome, including an open circuit, is returned as
    /// a [`ProviderResult`]. The breaker is updated once per execution, not
    /// once per attempt.
    ///
    /// `attempts` is updated as each network attempt starts, so a caller that
    /// abandons the execution still knows how many calls were made.
    #[instrument(name = "provider_call", skip_all, fields(provider = %provider_id))]
    pub async fn execute(
        &self,
        provider_id: &ProviderId,
        capability: &dyn ProviderCapability,
        prompt: &str,
        per_call_timeout: Duration,
        max_retries: u32,
        attempts: &AtomicU32,
    ) -> ProviderResult {
        let model = capability.model_name().clone();

        if let Admission::Denied { remaining } = self.breaker.allow(provider_id) {
            debug!(remaining_secs = remaining.as_secs(), "Circuit open, skipping call");
            let failure = ProviderFailure::new(ErrorCategory::ProviderDown, cooldown_message(remaining));
            return ProviderResult::failure(provider_id.clone(), failure, LatencyMs::ZERO, 0)
                .with_model(model);
        }

        let mut backoff = Backoff::new(self.config.base_delay, self.config.max_delay);
        let mut attempt: u32 = 0;

        let (failure, latency) = loop {
            attempt += 1;
            attempts.store(attempt, Ordering::Relaxed);
            let started = Instant::now();
            let call = AssertUnwindSafe(capability.query(prompt, per_call_timeout)).catch_unwind();
            let outcome = match tokio::time::timeout(per_call_timeout, call).await {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(panic)) => Err(ProviderFailure::new(
                    ErrorCategory::Unknown,
                    panic_message(panic.as_ref()),
                )),
                Err(_) => Err(ProviderFailure::timeout(per_call_timeout)),
            };
            let latency = LatencyMs::from_duration(started.elapsed());

            let failure = match outcome {
                Ok(reply) => {
                    self.breaker.on_success(provider_id);
                    debug!(attempt, latency_ms = latency.as_millis(), "Provider answered");
                    return ProviderResult::success(provider_id.clone(), reply, latency, attempt)
                        .with_model(model);
                }
                Err(failure) => failure,
            };

            match self.config.policy_for(&failure) {
                RetryPolicy::Retryable { after } if attempt <= max_retries => {
                    let wait = backoff.next_wait(after);
                    warn!(
                        attempt,
                        category = %failure.category,
                        wait_ms = LatencyMs::from_duration(wait).as_millis(),
                        "Provider attempt failed, retrying"
                    );
                    tokio::time::sleep(wait).await;
                }
                _ => break (failure, latency),
            }
        };

        warn!(attempt, category = %failure.category, "Provider failed");
        self.breaker.on_failure(provider_id, failure.category);
        ProviderResult::failure(provider_id.clone(), failure, latency, attempt).with_model(model)
    }
}

/// Extracts a printable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());
    format!("Provider fault: {detail}")
}
