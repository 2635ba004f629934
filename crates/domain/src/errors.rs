//! Error taxonomy, provider failures, and retry-policy types.
//!
//! Provider failures are *data*: every provider call returns a tagged
//! `Result<ProviderReply, ProviderFailure>` and the engine folds failures into
//! [`crate::ProviderResult`] values instead of propagating them. [`ChorusError`]
//! covers the remaining conditions that the caller must handle as a `Result`
//! (invalid configuration, malformed requests).
//!
//! [`RetryPolicy`] is a cross-cutting concern: the retry executor derives one
//! from every failure to decide whether to re-invoke the provider.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Retry semantics
// ---------------------------------------------------------------------------

/// Whether an error condition is safe to retry and, if so, after what delay.
///
/// - `Retryable` errors: timeouts, rate limiting, provider outages.
/// - `NonRetryable` errors: bad requests, authentication failures, unknown
///   models, uninitialized providers and unclassified faults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// The operation may be retried.
    ///
    /// `after` optionally specifies the delay before retrying (e.g. derived
    /// from a `Retry-After` response header).
    Retryable {
        /// Minimum back-off before the next attempt. `None` means apply the
        /// caller's own back-off schedule.
        after: Option<Duration>,
    },
    /// The operation must not be retried.
    NonRetryable,
}

// ---------------------------------------------------------------------------
// Error taxonomy
// ---------------------------------------------------------------------------

/// The closed set of categories every provider failure is mapped into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// An attempt or the whole dispatch exceeded its deadline.
    Timeout,
    /// The provider asked the caller to slow down.
    RateLimited,
    /// The provider is unreachable, failing server-side, or its circuit is open.
    ProviderDown,
    /// Credentials were rejected.
    AuthError,
    /// The provider rejected the request payload.
    BadRequest,
    /// The configured model does not exist at the provider.
    ModelNotFound,
    /// The provider was requested but is not configured in this process.
    NotInitialized,
    /// Anything that could not be classified.
    Unknown,
}

impl ErrorCategory {
    /// Transient categories: retrying or waiting can help.
    pub const TRANSIENT: [ErrorCategory; 3] = [
        ErrorCategory::Timeout,
        ErrorCategory::RateLimited,
        ErrorCategory::ProviderDown,
    ];

    /// Returns the wire name (`"rate_limited"`, ...).
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::RateLimited => "rate_limited",
            ErrorCategory::ProviderDown => "provider_down",
            ErrorCategory::AuthError => "auth_error",
            ErrorCategory::BadRequest => "bad_request",
            ErrorCategory::ModelNotFound => "model_not_found",
            ErrorCategory::NotInitialized => "not_initialized",
            ErrorCategory::Unknown => "unknown",
        }
    }

    /// Returns `true` for [`ErrorCategory::TRANSIENT`] members.
    pub fn is_transient(self) -> bool {
        Self::TRANSIENT.contains(&self)
    }

    /// Maps an HTTP status code returned by a provider into the taxonomy.
    pub fn from_http_status(status: u16) -> Self {
        match status {
            408 | 504 => ErrorCategory::Timeout,
            429 => ErrorCategory::RateLimited,
            500 | 502 | 503 => ErrorCategory::ProviderDown,
            401 | 403 => ErrorCategory::AuthError,
            404 => ErrorCategory::ModelNotFound,
            400 | 422 => ErrorCategory::BadRequest,
            _ => ErrorCategory::Unknown,
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ErrorCategory {
    type Err = ChorusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "timeout" => Ok(ErrorCategory::Timeout),
            "rate_limited" => Ok(ErrorCategory::RateLimited),
            "provider_down" => Ok(ErrorCategory::ProviderDown),
            "auth_error" => Ok(ErrorCategory::AuthError),
            "bad_request" => Ok(ErrorCategory::BadRequest),
            "model_not_found" => Ok(ErrorCategory::ModelNotFound),
            "not_initialized" => Ok(ErrorCategory::NotInitialized),
            "unknown" => Ok(ErrorCategory::Unknown),
            other => Err(ChorusError::ConfigurationError {
                message: format!("unknown error category '{other}'"),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Provider failures
// ---------------------------------------------------------------------------

/// A classified failure reported by a provider capability.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{category}: {message}")]
pub struct ProviderFailure {
    /// Taxonomy category.
    pub category: ErrorCategory,
    /// Raw provider message; normalized before it leaves the engine.
    pub message: String,
    /// Provider-supplied wait hint (e.g. from `Retry-After`).
    pub retry_after: Option<Duration>,
}

impl ProviderFailure {
    /// Creates a failure without a retry hint.
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            retry_after: None,
        }
    }

    /// Attaches a retry hint. A zero duration is treated as "no hint".
    #[must_use]
    pub fn with_retry_after(mut self, after: Duration) -> Self {
        self.retry_after = (!after.is_zero()).then_some(after);
        self
    }

    /// A timeout failure for a call bounded by `limit`.
    ///
    /// Whole seconds print as `3s`; anything else uses milliseconds.
    pub fn timeout(limit: Duration) -> Self {
        let limit = if limit.subsec_nanos() == 0 {
            format!("{}s", limit.as_secs())
        } else {
            format!("{}ms", limit.as_millis())
        };
        Self::new(ErrorCategory::Timeout, format!("Timed out after {limit}"))
    }
}

// ---------------------------------------------------------------------------
// Caller-facing errors
// ---------------------------------------------------------------------------

/// Errors returned to the caller as `Err`.
///
/// Provider failures never appear here; they are reported inside
/// [`crate::OrchestrationResult`].
#[derive(Debug, Error, Serialize, Deserialize)]
pub enum ChorusError {
    /// The engine or provider configuration is invalid.
    ///
    /// Produced at load time; the engine never starts with an invalid config.
    #[error("Configuration error: {message}")]
    ConfigurationError {
        /// Description of the configuration problem.
        message: String,
    },

    /// The request cannot be orchestrated as given.
    #[error("Invalid request: {reason}")]
    InvalidRequest {
        /// Why the request was rejected.
        reason: String,
    },
}
