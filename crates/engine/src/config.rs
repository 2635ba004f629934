//! Engine configuration.
//!
//! Every knob has a documented default ([`EngineConfig::default`]) and an
//! environment variable override ([`EngineConfig::from_env`]). The engine
//! refuses to start with a configuration that fails [`EngineConfig::validate`].

use std::collections::BTreeSet;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use domain::{ChorusError, ErrorCategory, ProviderFailure, ProviderId, RetryPolicy, DEFAULT_ERROR_MAX_CHARS};

/// Final answer returned when no provider succeeded.
pub const NO_SUCCESS_MESSAGE: &str = "No provider succeeded. Try again.";

// ---------------------------------------------------------------------------
// Component configs
// ---------------------------------------------------------------------------

/// Circuit breaker thresholds.
#[derive(Debug, Clone, PartialEq)]
pub struct BreakerConfig {
    /// Consecutive breakable failures that open the circuit.
    pub failure_threshold: u32,
    /// How long an open circuit rejects calls.
    pub cooldown: Duration,
    /// Categories that count towards the threshold.
    pub breakable: BTreeSet<ErrorCategory>,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown: Duration::from_secs(60),
            breakable: ErrorCategory::TRANSIENT.into_iter().collect(),
        }
    }
}

/// Per-provider retry schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// First unhinted back-off; doubles after every unhinted wait.
    pub base_delay: Duration,
    /// Upper bound for the doubled back-off.
    pub max_delay: Duration,
    /// Categories worth another attempt.
    pub retryable: BTreeSet<ErrorCategory>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(600),
            max_delay: Duration::from_secs(10),
            retryable: ErrorCategory::TRANSIENT.into_iter().collect(),
        }
    }
}

impl RetryConfig {
    /// Derives the retry decision for one failure.
    pub fn policy_for(&self, failure: &ProviderFailure) -> RetryPolicy {
        if self.retryable.contains(&failure.category) {
            RetryPolicy::Retryable {
                after: failure.retry_after,
            }
        } else {
            RetryPolicy::NonRetryable
        }
    }
}

/// Fan-out deadlines.
#[derive(Debug, Clone, PartialEq)]
pub struct FanOutConfig {
    /// Added to the per-call timeout to form each provider's outer deadline.
    pub hard_deadline_buffer: Duration,
    /// Per-call timeout used when a request does not specify one.
    pub default_per_call_timeout: Duration,
}

impl Default for FanOutConfig {
    fn default() -> Self {
        Self {
            hard_deadline_buffer: Duration::from_secs(10),
            default_per_call_timeout: Duration::from_secs(30),
        }
    }
}

/// Final-answer selection and merge step.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisConfig {
    /// Whether a provider is asked to merge all successful answers.
    pub enabled: bool,
    /// Preferred provider for both selection and merging.
    pub primary_provider: Option<ProviderId>,
    /// Fallback order when the primary did not succeed; unlisted providers
    /// follow in request order.
    pub provider_priority: Vec<ProviderId>,
    /// Upper bound for the merge call (further capped by the request's
    /// per-call timeout).
    pub timeout: Duration,
    /// Characters of each answer included in the merge prompt.
    pub max_chars_per_answer: usize,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            primary_provider: None,
            provider_priority: Vec::new(),
            timeout: Duration::from_secs(30),
            max_chars_per_answer: 1800,
        }
    }
}

// ---------------------------------------------------------------------------
// Engine config
// ---------------------------------------------------------------------------

/// Complete engine configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub breaker: BreakerConfig,
    pub retry: RetryConfig,
    pub fan_out: FanOutConfig,
    pub synthesis: SynthesisConfig,
    /// Character budget for normalized error messages.
    pub error_max_chars: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            breaker: BreakerConfig::default(),
            retry: RetryConfig::default(),
            fan_out: FanOutConfig::default(),
            synthesis: SynthesisConfig::default(),
            error_max_chars: DEFAULT_ERROR_MAX_CHARS,
        }
    }
}

impl EngineConfig {
    /// Builds a configuration from process environment variables.
    ///
    /// Unset variables keep their defaults; unparsable ones are an error.
    pub fn from_env() -> Result<Self, ChorusError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ChorusError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = parse_var::<u32, _>(&lookup, "CIRCUIT_FAILS")? {
            config.breaker.failure_threshold = v;
        }
        if let Some(v) = parse_var::<u64, _>(&lookup, "COOLDOWN_SECONDS")? {
            config.breaker.cooldown = Duration::from_secs(v);
        }
        if let Some(v) = parse_var::<u32, _>(&lookup, "PROVIDER_MAX_RETRIES")? {
            config.retry.max_retries = v;
        }
        if let Some(v) = parse_var::<u64, _>(&lookup, "RETRY_BASE_DELAY_MS")? {
            config.retry.base_delay = Duration::from_millis(v);
        }
        if let Some(v) = parse_var::<u64, _>(&lookup, "HARD_DEADLINE_BUFFER_S")? {
            config.fan_out.hard_deadline_buffer = Duration::from_secs(v);
        }
        if let Some(v) = parse_var::<bool, _>(&lookup, "SYNTH_ENABLED")? {
            config.synthesis.enabled = v;
        }
        if let Some(v) = lookup("SYNTH_PRIMARY_PROVIDER") {
            config.synthesis.primary_provider = ProviderId::new(v);
        }
        if let Some(v) = lookup("SYNTH_PROVIDER_PRIORITY") {
            config.synthesis.provider_priority = parse_provider_list(&v);
        }
        if let Some(v) = parse_var::<u64, _>(&lookup, "SYNTH_TIMEOUT_S")? {
            config.synthesis.timeout = Duration::from_secs(v);
        }
        if let Some(v) = parse_var::<usize, _>(&lookup, "SYNTH_MAX_CHARS_PER_PROVIDER")? {
            config.synthesis.max_chars_per_answer = v;
        }
        if let Some(v) = parse_var::<usize, _>(&lookup, "ERROR_MAX_CHARS")? {
            config.error_max_chars = v;
        }

        config.validate()?;
        Ok(config)
    }

    /// Rejects configurations the engine cannot run with.
    pub fn validate(&self) -> Result<(), ChorusError> {
        if self.breaker.failure_threshold == 0 {
            return Err(config_error("CIRCUIT_FAILS must be at least 1"));
        }
        if self.error_max_chars == 0 {
            return Err(config_error("ERROR_MAX_CHARS must be at least 1"));
        }
        if self.retry.base_delay > self.retry.max_delay {
            return Err(config_error("retry base delay exceeds the maximum delay"));
        }
        if self.synthesis.max_chars_per_answer == 0 {
            return Err(config_error("SYNTH_MAX_CHARS_PER_PROVIDER must be at least 1"));
        }
        Ok(())
    }
}

/// Parses a comma-separated provider list, dropping blanks.
pub fn parse_provider_list(raw: &str) -> Vec<ProviderId> {
    raw.split(',').filter_map(ProviderId::new).collect()
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>, ChorusError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| config_error(format!("{key}={raw:?} is invalid: {e}"))),
    }
}

fn config_error(message: impl Into<String>) -> ChorusError {
    ChorusError::ConfigurationError {
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.breaker.failure_threshold, 3);
        assert_eq!(config.breaker.cooldown, Duration::from_secs(60));
        assert_eq!(config.retry.max_retries, 2);
        assert_eq!(config.retry.base_delay, Duration::from_millis(600));
        assert_eq!(config.fan_out.hard_deadline_buffer, Duration::from_secs(10));
        assert_eq!(config.synthesis.max_chars_per_answer, 1800);
        assert_eq!(config.error_max_chars, 140);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let config = EngineConfig::from_lookup(lookup_from(&[
            ("CIRCUIT_FAILS", "5"),
            ("COOLDOWN_SECONDS", "120"),
            ("PROVIDER_MAX_RETRIES", "0"),
            ("SYNTH_ENABLED", "false"),
            ("SYNTH_PRIMARY_PROVIDER", "groq"),
            ("SYNTH_PROVIDER_PRIORITY", "groq, mistral,,cerebras"),
            ("ERROR_MAX_CHARS", "80"),
        ]))
        .unwrap();

        assert_eq!(config.breaker.failure_threshold, 5);
        assert_eq!(config.breaker.cooldown, Duration::from_secs(120));
        assert_eq!(config.retry.max_retries, 0);
        assert!(!config.synthesis.enabled);
        assert_eq!(config.synthesis.primary_provider.as_ref().map(|p| p.as_str()), Some("groq"));
        let priority: Vec<&str> = config.synthesis.provider_priority.iter().map(|p| p.as_str()).collect();
        assert_eq!(priority, vec!["groq", "mistral", "cerebras"]);
        assert_eq!(config.error_max_chars, 80);
    }

    #[test]
    fn test_unparsable_value_is_a_configuration_error() {
        let err = EngineConfig::from_lookup(lookup_from(&[("CIRCUIT_FAILS", "three")])).unwrap_err();
        assert!(matches!(err, ChorusError::ConfigurationError { .. }));
        assert!(err.to_string().contains("CIRCUIT_FAILS"));
    }

    #[test]
    fn test_zero_threshold_is_rejected() {
        let err = EngineConfig::from_lookup(lookup_from(&[("CIRCUIT_FAILS", "0")])).unwrap_err();
        assert!(err.to_string().contains("CIRCUIT_FAILS"));
    }

    #[test]
    fn test_retry_policy_follows_retryable_set() {
        let retry = RetryConfig::default();
        let hinted = ProviderFailure::new(ErrorCategory::RateLimited, "slow")
            .with_retry_after(Duration::from_secs(2));
        assert_eq!(
            retry.policy_for(&hinted),
            RetryPolicy::Retryable {
                after: Some(Duration::from_secs(2))
            }
        );
        let categorical = ProviderFailure::new(ErrorCategory::AuthError, "denied");
        assert_eq!(retry.policy_for(&categorical), RetryPolicy::NonRetryable);
    }
}
