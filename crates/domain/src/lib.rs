//! Orchestration domain for Chorus.
//!
//! This crate contains every domain concept, newtype identifier, value type,
//! error category and port trait used by the multi-provider engine.
//! Infrastructure crates implement the traits defined here; they never add
//! domain rules.
//!
//! ## Architectural Layer
//!
//! **Business types + port definitions.** This crate has no I/O dependencies.
//! It defines *what* is needed; the `engine` crate sequences it and the `llm`
//! crate supplies providers.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`ProviderId`, `UserId`, `RequestId`, ...) |
//! | [`types`] | Value types (`TokenCount`, `LatencyMs`, `Timestamp`) |
//! | [`errors`] | Error taxonomy, `ProviderFailure`, `RetryPolicy`, `ChorusError` |
//! | [`fingerprint`] | User-scoped query fingerprints |
//! | [`normalize`] | Error message normalization |
//! | [`ports`] | `ProviderCapability` and `ResponseCache` traits |
//! | [`result`] | `ProviderResult` and `OrchestrationResult` |

pub mod errors;
pub mod fingerprint;
pub mod identifiers;
pub mod normalize;
pub mod ports;
pub mod result;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use errors::{ChorusError, ErrorCategory, ProviderFailure, RetryPolicy};
pub use fingerprint::{normalize_query, QueryFingerprint};
pub use identifiers::{ModelName, ProviderId, RequestId, UserId};
pub use normalize::{ErrorNormalizer, DEFAULT_ERROR_MAX_CHARS};
pub use ports::{CacheEntry, CacheError, ProviderCapability, ProviderReply, ResponseCache};
pub use result::{
    OrchestrationMetadata, OrchestrationResult, ProviderErrorSummary, ProviderResult,
    ResultStatus, SynthesisOutcome,
};
pub use types::{LatencyMs, Timestamp, TokenCount};
