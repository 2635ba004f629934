//! Reduction of N provider answers to one final answer.
//!
//! Selection order: the configured primary provider, then the configured
//! priority list, then request order. When merging is enabled the selected
//! provider is asked to combine every successful answer; any failure of that
//! step falls back to the selected provider's own text.

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use domain::{
    OrchestrationMetadata, ProviderId, ProviderResult, QueryFingerprint, SynthesisOutcome,
};
use futures::FutureExt;
use tracing::{debug, info, warn};

use crate::config::{SynthesisConfig, NO_SUCCESS_MESSAGE};
use crate::coordinator::Partition;
use crate::registry::ProviderRegistry;

/// Picks or produces the final answer and computes aggregate statistics.
#[derive(Debug, Clone)]
pub struct ResponseSynthesizer {
    config: SynthesisConfig,
}

impl ResponseSynthesizer {
    pub fn new(config: SynthesisConfig) -> Self {
        Self { config }
    }

    /// Returns the preferred provider among those with a usable answer.
    pub fn choose(
        &self,
        request_order: &[ProviderId],
        results: &BTreeMap<ProviderId, ProviderResult>,
    ) -> Option<ProviderId> {
        let answered = |id: &ProviderId| results.get(id).and_then(ProviderResult::answer).is_some();

        self.config
            .primary_provider
            .iter()
            .chain(self.config.provider_priority.iter())
            .chain(request_order.iter())
            .chain(results.keys())
            .find(|&id| answered(id))
            .cloned()
    }

    /// Builds the merge prompt from every usable answer, in request order.
    pub fn merge_prompt(
        &self,
        query: &str,
        request_order: &[ProviderId],
        results: &BTreeMap<ProviderId, ProviderResult>,
    ) -> String {
        let blocks: Vec<String> = request_order
            .iter()
            .filter_map(|id| {
                let answer = results.get(id)?.answer()?;
                let clipped: String = answer.chars().take(self.config.max_chars_per_answer).collect();
                Some(format!("[{id}]\n{clipped}"))
            })
            .collect();

        format!(
            "Several assistants answered the question below. Write the single best answer.\n\
             - Combine the strongest points and drop repetition.\n\
             - Where the answers disagree, pick the best-supported view and note the uncertainty briefly.\n\
             - Add nothing that none of the answers support.\n\
             - Be concise.\n\n\
             Question:\n{query}\n\n\
             Answers:\n{}\n\n\
             Best answer:",
            blocks.join("\n\n")
        )
    }

    /// Produces the final answer.
    ///
    /// Never fails: with no successful provider the sentinel message is
    /// returned, and every merge failure falls back to the selected text.
    pub async fn synthesize(
        &self,
        query: &str,
        request_order: &[ProviderId],
        results: &BTreeMap<ProviderId, ProviderResult>,
        registry: &ProviderRegistry,
        per_call_timeout: Duration,
    ) -> (String, SynthesisOutcome) {
        let Some(chosen) = self.choose(request_order, results) else {
            info!("No provider succeeded");
            return (NO_SUCCESS_MESSAGE.to_string(), SynthesisOutcome::NoSuccess);
        };
        let selected_text = results
            .get(&chosen)
            .and_then(ProviderResult::answer)
            .unwrap_or_default()
            .to_string();

        if !self.config.enabled {
            return (selected_text, SynthesisOutcome::Selected { provider: chosen });
        }
        let Some(capability) = registry.capability(&chosen) else {
            debug!(provider = %chosen, "Selected provider cannot merge, using its answer");
            return (selected_text, SynthesisOutcome::Selected { provider: chosen });
        };

        let prompt = self.merge_prompt(query, request_order, results);
        let timeout = self.config.timeout.min(per_call_timeout);
        let call = AssertUnwindSafe(capability.query(&prompt, timeout)).catch_unwind();

        match tokio::time::timeout(timeout, call).await {
            Ok(Ok(Ok(reply))) if !reply.text.trim().is_empty() => {
                debug!(provider = %chosen, "Answers merged");
                (reply.text.trim().to_string(), SynthesisOutcome::Merged { provider: chosen })
            }
            Ok(Ok(Ok(_))) => {
                warn!(provider = %chosen, "Merge returned empty text, using selected answer");
                (selected_text, SynthesisOutcome::Selected { provider: chosen })
            }
            Ok(Ok(Err(failure))) => {
                warn!(provider = %chosen, category = %failure.category, "Merge failed, using selected answer");
                (selected_text, SynthesisOutcome::Selected { provider: chosen })
            }
            Ok(Err(_)) => {
                warn!(provider = %chosen, "Merge panicked, using selected answer");
                (selected_text, SynthesisOutcome::Selected { provider: chosen })
            }
            Err(_) => {
                warn!(provider = %chosen, timeout_secs = timeout.as_secs(), "Merge timed out, using selected answer");
                (selected_text, SynthesisOutcome::Selected { provider: chosen })
            }
        }
    }

    /// Computes the counts and statistics reported with the result.
    pub fn summarize(
        &self,
        requested: &[ProviderId],
        partition: &Partition,
        fingerprint: QueryFingerprint,
        results: &BTreeMap<ProviderId, ProviderResult>,
        synthesis: SynthesisOutcome,
    ) -> OrchestrationMetadata {
        let succeeded = results.values().filter(|r| r.is_success()).count();
        let failed = results.len() - succeeded;
        let cached_count = results.values().filter(|r| r.cached).count();

        let fresh: Vec<u64> = results
            .values()
            .filter(|r| r.is_success() && !r.cached)
            .map(|r| r.latency_ms.as_millis())
            .collect();
        let avg_latency_ms = if fresh.is_empty() {
            0.0
        } else {
            fresh.iter().sum::<u64>() as f64 / fresh.len() as f64
        };
        let success_rate = if results.is_empty() {
            0.0
        } else {
            succeeded as f64 / results.len() as f64
        };

        OrchestrationMetadata {
            requested_providers: requested.to_vec(),
            available_providers: partition.available.clone(),
            skipped_providers: partition.skipped.clone(),
            total_requested: requested.len(),
            total_available: partition.available.len(),
            total_skipped: partition.skipped.len(),
            succeeded,
            failed,
            cached_count,
            success_rate,
            avg_latency_ms,
            fingerprint,
            synthesis,
        }
    }
}
