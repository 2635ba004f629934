//! Per-provider circuit breaker.
//!
//! # States
//! - Closed: fail count below threshold, calls pass through
//! - Open: fail count at or above threshold, calls rejected until cooldown ends
//!
//! There is no tracked half-open state. Once the cooldown has elapsed the
//! breaker simply admits the next call; the fail count is kept, so one more
//! breakable failure re-opens the circuit immediately, while a success resets
//! everything.
//!
//! State lives in a sharded concurrent map, so every read-modify-write on one
//! provider's record is serialized without a global lock.

use std::collections::BTreeMap;
use std::time::Duration;

use dashmap::DashMap;
use domain::{ErrorCategory, ProviderId};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::BreakerConfig;

/// Result of asking the breaker whether a provider may be called.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The call may proceed.
    Allowed,
    /// The circuit is open for another `remaining`.
    Denied { remaining: Duration },
}

impl Admission {
    /// Returns `true` for [`Admission::Allowed`].
    pub fn is_allowed(self) -> bool {
        matches!(self, Admission::Allowed)
    }
}

/// Observable state of one provider's circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open {
        #[serde(rename = "remaining_secs", serialize_with = "serialize_secs")]
        remaining: Duration,
    },
}

/// Point-in-time view of one provider's breaker record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BreakerSnapshot {
    pub fail_count: u32,
    #[serde(flatten)]
    pub state: CircuitState,
}

#[derive(Debug, Clone, Copy, Default)]
struct ProviderState {
    fail_count: u32,
    cooldown_until: Option<Instant>,
}

/// Process-lifetime breaker shared by every request.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: BreakerConfig,
    states: DashMap<ProviderId, ProviderState>,
}

impl CircuitBreaker {
    /// Creates a breaker with every circuit closed.
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            states: DashMap::new(),
        }
    }

    /// Returns whether `provider` may be called now.
    pub fn allow(&self, provider: &ProviderId) -> Admission {
        let now = Instant::now();
        match self.states.get(provider).and_then(|s| s.cooldown_until) {
            Some(until) if until > now => Admission::Denied {
                remaining: until - now,
            },
            _ => Admission::Allowed,
        }
    }

    /// Resets the provider's record after any successful call.
    pub fn on_success(&self, provider: &ProviderId) {
        if let Some((_, previous)) = self.states.remove(provider) {
            if previous.fail_count > 0 {
                info!(
                    provider = %provider,
                    previous_failures = previous.fail_count,
                    "Circuit reset after success"
                );
            }
        }
    }

    /// Records a failed execution. Only breakable categories count.
    pub fn on_failure(&self, provider: &ProviderId, category: ErrorCategory) {
        if !self.config.breakable.contains(&category) {
            debug!(provider = %provider, category = %category, "Failure does not count towards circuit");
            return;
        }

        let mut state = self.states.entry(provider.clone()).or_default();
        state.fail_count = state.fail_count.saturating_add(1);

        if state.fail_count >= self.config.failure_threshold {
            state.cooldown_until = Some(Instant::now() + self.config.cooldown);
            warn!(
                provider = %provider,
                fail_count = state.fail_count,
                cooldown_secs = self.config.cooldown.as_secs(),
                "Circuit opened"
            );
        } else {
            debug!(
                provider = %provider,
                fail_count = state.fail_count,
                threshold = self.config.failure_threshold,
                "Breakable failure recorded"
            );
        }
    }

    /// Returns the current state of every provider with a record.
    ///
    /// Providers that never failed (or succeeded since) have no record and are
    /// closed.
    pub fn snapshot(&self) -> BTreeMap<ProviderId, BreakerSnapshot> {
        let now = Instant::now();
        self.states
            .iter()
            .map(|entry| {
                let state = match entry.cooldown_until {
                    Some(until) if until > now => CircuitState::Open {
                        remaining: until - now,
                    },
                    _ => CircuitState::Closed,
                };
                (
                    entry.key().clone(),
                    BreakerSnapshot {
                        fail_count: entry.fail_count,
                        state,
                    },
                )
            })
            .collect()
    }
}

/// Message reported for calls rejected by an open circuit.
pub fn cooldown_message(remaining: Duration) -> String {
    format!("Circuit open; retry in {}s", remaining.as_secs())
}

fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_secs())
}
