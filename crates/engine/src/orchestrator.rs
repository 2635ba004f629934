//! Request boundary: one query in, one [`OrchestrationResult`] out.
//!
//! The [`Orchestrator`] owns the process-lifetime state (breaker, cache,
//! registry) and is constructed once at startup, then shared by reference
//! across requests. Authentication, quota checks and persistence of the
//! returned result belong to the caller.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use domain::{
    CacheEntry, ChorusError, ErrorNormalizer, OrchestrationResult, ProviderErrorSummary,
    ProviderId, ProviderResult, QueryFingerprint, RequestId, ResponseCache, SynthesisOutcome,
    Timestamp, UserId,
};
use tracing::{debug, field, info, instrument, warn, Span};

use crate::breaker::CircuitBreaker;
use crate::config::{EngineConfig, NO_SUCCESS_MESSAGE};
use crate::coordinator::{FanOutCoordinator, Partition};
use crate::registry::ProviderRegistry;
use crate::retry::RetryExecutor;
use crate::synthesis::ResponseSynthesizer;

/// Input accepted from the request-handling layer.
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestrationRequest {
    pub user_id: UserId,
    pub query_text: String,
    pub providers: Vec<ProviderId>,
    /// Per-attempt timeout; `None` uses the configured default.
    pub per_call_timeout: Option<Duration>,
}

impl OrchestrationRequest {
    pub fn new(user_id: UserId, query_text: impl Into<String>, providers: Vec<ProviderId>) -> Self {
        Self {
            user_id,
            query_text: query_text.into(),
            providers,
            per_call_timeout: None,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, per_call_timeout: Duration) -> Self {
        self.per_call_timeout = Some(per_call_timeout);
        self
    }
}

/// The multi-provider orchestration engine.
pub struct Orchestrator {
    config: EngineConfig,
    registry: Arc<ProviderRegistry>,
    breaker: Arc<CircuitBreaker>,
    cache: Arc<dyn ResponseCache>,
    coordinator: FanOutCoordinator,
    synthesizer: ResponseSynthesizer,
    normalizer: ErrorNormalizer,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Wires the engine components together.
    pub fn new(
        config: EngineConfig,
        registry: ProviderRegistry,
        cache: Arc<dyn ResponseCache>,
    ) -> Result<Self, ChorusError> {
        config.validate()?;

        let registry = Arc::new(registry);
        let breaker = Arc::new(CircuitBreaker::new(config.breaker.clone()));
        let executor = RetryExecutor::new(breaker.clone(), config.retry.clone());
        let coordinator = FanOutCoordinator::new(
            registry.clone(),
            breaker.clone(),
            executor,
            config.fan_out.clone(),
        );

        Ok(Self {
            synthesizer: ResponseSynthesizer::new(config.synthesis.clone()),
            normalizer: ErrorNormalizer::new(config.error_max_chars),
            config,
            registry,
            breaker,
            cache,
            coordinator,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Runs one request end to end.
    ///
    /// Returns `Err` only for a zero per-call timeout. A blank query or an
    /// empty provider list yields the no-success sentinel without dispatching;
    /// every provider, cache and synthesis failure is reported inside the
    /// result.
    #[instrument(
        name = "orchestrate",
        skip_all,
        fields(request_id = tracing::field::Empty, user = %request.user_id, providers = request.providers.len())
    )]
    pub async fn orchestrate(
        &self,
        request: OrchestrationRequest,
    ) -> Result<OrchestrationResult, ChorusError> {
        let per_call_timeout = request
            .per_call_timeout
            .unwrap_or(self.config.fan_out.default_per_call_timeout);
        if per_call_timeout.is_zero() {
            return Err(ChorusError::InvalidRequest {
                reason: "per-call timeout must be positive".to_string(),
            });
        }

        let request_id = RequestId::new_random();
        Span::current().record("request_id", field::display(&request_id));

        let query = request.query_text.trim();
        if query.is_empty() || request.providers.is_empty() {
            warn!(blank_query = query.is_empty(), "Nothing to dispatch");
            return Ok(self.empty_result(request_id, &request.user_id, query));
        }

        let requested = dedup(&request.providers);
        let fingerprint = QueryFingerprint::compute(&request.user_id, query, &requested);
        let partition = self.coordinator.partition(&requested);

        // Cache hits leave the dispatch set; lookup failures count as misses.
        let mut results: BTreeMap<ProviderId, ProviderResult> = BTreeMap::new();
        let mut to_run: Vec<ProviderId> = Vec::new();
        for id in &partition.available {
            match self.cache.lookup(&fingerprint, id, &request.user_id).await {
                Ok(Some(text)) => {
                    debug!(provider = %id, "Serving cached answer");
                    let mut cached = ProviderResult::cached(id.clone(), text);
                    if let Some(capability) = self.registry.capability(id) {
                        cached = cached.with_model(capability.model_name().clone());
                    }
                    results.insert(id.clone(), cached);
                }
                Ok(None) => to_run.push(id.clone()),
                Err(e) => {
                    warn!(provider = %id, error = %e, "Cache lookup failed, dispatching");
                    to_run.push(id.clone());
                }
            }
        }
        to_run.extend(partition.skipped.iter().cloned());

        let fresh = self.coordinator.dispatch(&to_run, query, per_call_timeout).await;

        for (id, result) in &fresh {
            let Some(text) = result.text.as_ref().filter(|_| result.is_success()) else {
                continue;
            };
            let entry = CacheEntry {
                fingerprint: fingerprint.clone(),
                provider_id: id.clone(),
                user_id: request.user_id.clone(),
                text: text.clone(),
                created_at: Timestamp::now(),
            };
            if let Err(e) = self.cache.store(entry).await {
                warn!(provider = %id, error = %e, "Cache store failed, skipping");
            }
        }

        results.extend(
            fresh
                .into_iter()
                .map(|(id, result)| (id, result.normalized(&self.normalizer))),
        );

        let errors: Vec<ProviderErrorSummary> = requested
            .iter()
            .filter_map(|id| results.get(id))
            .filter_map(|r| {
                Some(ProviderErrorSummary {
                    provider_id: r.provider_id.clone(),
                    error_type: r.error_type?,
                    error_message: r.error_message.clone().unwrap_or_default(),
                })
            })
            .collect();

        let (final_answer, synthesis) = self
            .synthesizer
            .synthesize(query, &requested, &results, &self.registry, per_call_timeout)
            .await;
        let metadata =
            self.synthesizer
                .summarize(&requested, &partition, fingerprint, &results, synthesis);

        info!(
            succeeded = metadata.succeeded,
            failed = metadata.failed,
            cached = metadata.cached_count,
            avg_latency_ms = metadata.avg_latency_ms,
            "Orchestration complete"
        );

        Ok(OrchestrationResult {
            request_id,
            final_answer,
            per_provider_results: results,
            errors,
            metadata,
        })
    }

    fn empty_result(&self, request_id: RequestId, user: &UserId, query: &str) -> OrchestrationResult {
        let fingerprint = QueryFingerprint::compute(user, query, std::iter::empty());
        let results = BTreeMap::new();
        let metadata = self.synthesizer.summarize(
            &[],
            &Partition::default(),
            fingerprint,
            &results,
            SynthesisOutcome::NoSuccess,
        );
        OrchestrationResult {
            request_id,
            final_answer: NO_SUCCESS_MESSAGE.to_string(),
            per_provider_results: results,
            errors: Vec::new(),
            metadata,
        }
    }
}

fn dedup(ids: &[ProviderId]) -> Vec<ProviderId> {
    let mut seen = HashSet::new();
    ids.iter().filter(|id| seen.insert(*id)).cloned().collect()
}
