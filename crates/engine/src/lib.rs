//! Multi-provider orchestration engine for Chorus.
//!
//! This crate fans one user query out to several LLM providers, protects each
//! provider with a circuit breaker and a bounded retry schedule, serves
//! repeated queries from a user-scoped cache, and reduces the answers to one
//! final response.
//!
//! ## Architectural Layer
//!
//! **Orchestration layer.** The engine sequences calls between the business
//! types in the [`domain`] crate and the port implementations supplied by the
//! composition root (providers from `llm`, caches from here or elsewhere). It
//! performs no network I/O of its own.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`config`] | `EngineConfig` and its environment overrides |
//! | [`breaker`] | Per-provider circuit breaker |
//! | [`retry`] | Back-off schedule and the per-provider retry executor |
//! | [`registry`] | Configured providers and their status |
//! | [`cache`] | In-memory `ResponseCache` |
//! | [`coordinator`] | Concurrent dispatch under an outer deadline |
//! | [`synthesis`] | Final-answer selection, merging and statistics |
//! | [`orchestrator`] | The request boundary tying everything together |

pub mod breaker;
pub mod cache;
pub mod config;
pub mod coordinator;
pub mod orchestrator;
pub mod registry;
pub mod retry;
pub mod synthesis;

pub use breaker::{cooldown_message, Admission, BreakerSnapshot, CircuitBreaker, CircuitState};
pub use cache::{CacheStats, InMemoryResponseCache};
pub use config::{
    parse_provider_list, BreakerConfig, EngineConfig, FanOutConfig, RetryConfig, SynthesisConfig,
    NO_SUCCESS_MESSAGE,
};
pub use coordinator::{FanOutCoordinator, Partition, NOT_INITIALIZED_MESSAGE};
pub use orchestrator::{OrchestrationRequest, Orchestrator};
pub use registry::{ProviderDescriptor, ProviderInfo, ProviderRegistry, ProviderStatus};
pub use retry::{Backoff, RetryExecutor};
pub use synthesis::ResponseSynthesizer;
