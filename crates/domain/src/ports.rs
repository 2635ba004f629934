//! Port traits the engine consumes.
//!
//! Infrastructure crates implement these; the engine sees only the traits.
//!
//! | Port | Implemented by |
//! |------|----------------|
//! | [`ProviderCapability`] | `llm::OpenAiCompatibleProvider`, test fakes |
//! | [`ResponseCache`] | `engine::InMemoryResponseCache`, external stores |

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{ModelName, ProviderFailure, ProviderId, QueryFingerprint, Timestamp, TokenCount, UserId};

// ---------------------------------------------------------------------------
// Provider capability
// ---------------------------------------------------------------------------

/// A successful answer from one provider call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderReply {
    /// Answer text.
    pub text: String,
    /// Tokens consumed, when the provider reports usage.
    pub token_count: Option<TokenCount>,
}

impl ProviderReply {
    /// Creates a reply without usage data.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            token_count: None,
        }
    }

    /// Attaches a token count.
    #[must_use]
    pub fn with_tokens(mut self, tokens: TokenCount) -> Self {
        self.token_count = Some(tokens);
        self
    }
}

/// The uniform unit of work: "answer this prompt within this deadline".
///
/// Implementations classify their own failures into the taxonomy and never
/// panic on provider errors. The engine still bounds every call with its own
/// timeout and converts panics into `unknown` results.
#[async_trait]
pub trait ProviderCapability: Send + Sync {
    /// Queries the provider once.
    async fn query(&self, prompt: &str, timeout: Duration) -> Result<ProviderReply, ProviderFailure>;

    /// Checks that the configured credentials are accepted.
    async fn validate_key(&self) -> bool;

    /// The model this capability sends prompts to.
    fn model_name(&self) -> &ModelName;
}

// ---------------------------------------------------------------------------
// Response cache
// ---------------------------------------------------------------------------

/// A cached successful answer. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Request fingerprint the answer belongs to.
    pub fingerprint: QueryFingerprint,
    /// Provider that produced the answer.
    pub provider_id: ProviderId,
    /// Owner of the answer.
    pub user_id: UserId,
    /// Answer text.
    pub text: String,
    /// When the entry was created.
    pub created_at: Timestamp,
}

/// Errors raised by a [`ResponseCache`] backend.
///
/// The engine never fails a request because of these; lookups degrade to a
/// miss and stores are skipped.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// The backing store could not be reached.
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),

    /// The backing store rejected the operation.
    #[error("cache operation failed: {0}")]
    Backend(String),
}

/// User-scoped, fingerprint-keyed storage of successful answers.
///
/// Retention is the backend's concern; the engine neither expires nor
/// invalidates entries.
#[async_trait]
pub trait ResponseCache: Send + Sync {
    /// Returns the cached text for `(fingerprint, provider, user)`, if any.
    async fn lookup(
        &self,
        fingerprint: &QueryFingerprint,
        provider_id: &ProviderId,
        user_id: &UserId,
    ) -> Result<Option<String>, CacheError>;

    /// Stores an entry. Storing the same key twice is harmless.
    async fn store(&self, entry: CacheEntry) -> Result<(), CacheError>;
}
