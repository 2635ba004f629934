//! Per-provider outcomes and the aggregate orchestration result.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    ErrorCategory, ErrorNormalizer, LatencyMs, ModelName, ProviderFailure, ProviderId,
    ProviderReply, QueryFingerprint, RequestId, TokenCount,
};

// ---------------------------------------------------------------------------
// Provider results
// ---------------------------------------------------------------------------

/// Whether a provider produced an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    /// The provider answered (freshly or from cache).
    Success,
    /// The provider failed; see `error_type`.
    Error,
}

/// Outcome of one provider within one request.
///
/// Success results carry `text`; error results carry `error_type` and
/// `error_message`. Build them with the constructors so that pairing holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderResult {
    /// The provider this outcome belongs to.
    pub provider_id: ProviderId,
    /// Success or error.
    pub status: ResultStatus,
    /// The answer text; present on success only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Duration of the final attempt; zero when no call was made.
    pub latency_ms: LatencyMs,
    /// Reported by the provider, or estimated from the answer's words.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_count: Option<TokenCount>,
    /// Failure category; present on error only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<ErrorCategory>,
    /// Normalized, length-bounded failure description; present on error only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Provider-suggested wait before retrying, from the last failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
    /// Network attempts made; `0` for cache hits, open circuits and
    /// uninitialized providers.
    pub attempt: u32,
    /// `true` when the answer came from the response cache.
    pub cached: bool,
    /// Model that served (or was meant to serve) the call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_used: Option<ModelName>,
}

impl ProviderResult {
    /// A fresh successful answer.
    pub fn success(
        provider_id: ProviderId,
        reply: ProviderReply,
        latency: LatencyMs,
        attempt: u32,
    ) -> Self {
        let token_count = reply
            .token_count
            .unwrap_or_else(|| TokenCount::estimate(&reply.text));
        Self {
            provider_id,
            status: ResultStatus::Success,
            text: Some(reply.text),
            latency_ms: latency,
            token_count: Some(token_count),
            error_type: None,
            error_message: None,
            retry_after_ms: None,
            attempt,
            cached: false,
            model_used: None,
        }
    }

    /// An answer served from the response cache.
    pub fn cached(provider_id: ProviderId, text: String) -> Self {
        Self {
            provider_id,
            status: ResultStatus::Success,
            text: Some(text),
            latency_ms: LatencyMs::ZERO,
            token_count: None,
            error_type: None,
            error_message: None,
            retry_after_ms: None,
            attempt: 0,
            cached: true,
            model_used: None,
        }
    }

    /// A failed outcome.
    pub fn failure(
        provider_id: ProviderId,
        failure: ProviderFailure,
        latency: LatencyMs,
        attempt: u32,
    ) -> Self {
        Self {
            provider_id,
            status: ResultStatus::Error,
            text: None,
            latency_ms: latency,
            token_count: None,
            error_type: Some(failure.category),
            error_message: Some(failure.message),
            retry_after_ms: failure.retry_after.map(|d| LatencyMs::from_duration(d).as_millis()),
            attempt,
            cached: false,
            model_used: None,
        }
    }

    /// Records the model that served (or was meant to serve) this result.
    #[must_use]
    pub fn with_model(mut self, model: ModelName) -> Self {
        self.model_used = Some(model);
        self
    }

    /// Rewrites the error message through `normalizer`. No-op on success.
    #[must_use]
    pub fn normalized(mut self, normalizer: &ErrorNormalizer) -> Self {
        if let Some(message) = self.error_message.take() {
            self.error_message = Some(normalizer.normalize(&message));
        }
        self
    }

    /// Returns `true` if the provider answered.
    pub fn is_success(&self) -> bool {
        self.status == ResultStatus::Success
    }

    /// Returns the answer text of a success with non-blank text.
    pub fn answer(&self) -> Option<&str> {
        match (&self.status, self.text.as_deref()) {
            (ResultStatus::Success, Some(text)) if !text.trim().is_empty() => Some(text.trim()),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Aggregate result
// ---------------------------------------------------------------------------

/// Compact description of one failed provider, for quick display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderErrorSummary {
    /// The failed provider.
    pub provider_id: ProviderId,
    /// Category of its final failure.
    pub error_type: ErrorCategory,
    /// The normalized failure message.
    pub error_message: String,
}

/// Which path produced the final answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum SynthesisOutcome {
    /// `provider` merged all successful answers into one.
    Merged { provider: ProviderId },
    /// The raw answer of `provider` was used.
    Selected { provider: ProviderId },
    /// Nothing succeeded; the final answer is the sentinel.
    NoSuccess,
}

/// Counts and statistics describing one orchestration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestrationMetadata {
    /// Requested providers, de-duplicated, in request order.
    pub requested_providers: Vec<ProviderId>,
    /// The requested providers that were configured and dispatchable.
    pub available_providers: Vec<ProviderId>,
    /// The requested providers reported as `not_initialized`.
    pub skipped_providers: Vec<ProviderId>,
    /// Length of `requested_providers`.
    pub total_requested: usize,
    /// Length of `available_providers`.
    pub total_available: usize,
    /// Length of `skipped_providers`.
    pub total_skipped: usize,
    /// Providers with an answer, cached ones included.
    pub succeeded: usize,
    /// Providers that ended in an error.
    pub failed: usize,
    /// Successes served from the cache.
    pub cached_count: usize,
    /// `succeeded / (succeeded + failed)`, `0.0` when nothing ran.
    pub success_rate: f64,
    /// Mean latency of fresh (non-cached) successes; `0.0` when there are none.
    pub avg_latency_ms: f64,
    /// Cache key of this request.
    pub fingerprint: QueryFingerprint,
    /// How the final answer was produced.
    pub synthesis: SynthesisOutcome,
}

/// Everything the caller receives for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestrationResult {
    /// Correlates this result with the request's tracing span.
    pub request_id: RequestId,
    /// The synthesized or selected answer, or the no-success sentinel.
    pub final_answer: String,
    /// Exactly one outcome per requested provider.
    pub per_provider_results: BTreeMap<ProviderId, ProviderResult>,
    /// One entry per failed provider, in request order.
    pub errors: Vec<ProviderErrorSummary>,
    /// Counts and statistics for the request.
    pub metadata: OrchestrationMetadata,
}

impl OrchestrationResult {
    /// Looks up the result for one provider by name.
    pub fn result_for(&self, provider: &str) -> Option<&ProviderResult> {
        self.per_provider_results.get(provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn pid(s: &str) -> ProviderId {
        ProviderId::new(s).unwrap()
    }

    #[test]
    fn test_success_estimates_tokens_when_unreported() {
        let r = ProviderResult::success(pid("p1"), ProviderReply::new("a b c"), LatencyMs::new(5), 1);
        assert!(r.is_success());
        assert_eq!(r.token_count, Some(TokenCount::new(3)));
        assert_eq!(r.answer(), Some("a b c"));
    }

    #[test]
    fn test_failure_carries_category_and_hint() {
        let failure = ProviderFailure::new(ErrorCategory::RateLimited, "slow")
            .with_retry_after(Duration::from_millis(1500));
        let r = ProviderResult::failure(pid("p1"), failure, LatencyMs::new(3), 2);
        assert!(!r.is_success());
        assert_eq!(r.error_type, Some(ErrorCategory::RateLimited));
        assert_eq!(r.retry_after_ms, Some(1500));
        assert_eq!(r.attempt, 2);
        assert_eq!(r.answer(), None);
    }

    #[test]
    fn test_blank_success_has_no_answer() {
        let r = ProviderResult::cached(pid("p1"), "   ".to_string());
        assert!(r.is_success());
        assert_eq!(r.answer(), None);
    }

    #[test]
    fn test_normalized_rewrites_error_message() {
        let failure = ProviderFailure::new(ErrorCategory::BadRequest, "HTTP 400: {\"message\":\"nope\"}");
        let r = ProviderResult::failure(pid("p1"), failure, LatencyMs::ZERO, 1)
            .normalized(&ErrorNormalizer::default());
        assert_eq!(r.error_message.as_deref(), Some("nope"));
    }

    #[test]
    fn test_serialized_result_omits_absent_fields() {
        let r = ProviderResult::cached(pid("p1"), "A".to_string());
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["cached"], true);
        assert!(json.get("error_type").is_none());
    }
}
