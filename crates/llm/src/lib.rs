//! Chorus LLM provider infrastructure adapter.
//!
//! Implements the [`domain::ProviderCapability`] trait for any vendor that
//! exposes an OpenAI-compatible chat-completions API, and knows how to build
//! the engine's [`engine::ProviderRegistry`] from the built-in vendor
//! catalogue. Vendors with a different wire format are added as new
//! `ProviderCapability` implementations in this crate without any changes to
//! `domain` or `engine`.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** All HTTP transport, request formatting, response
//! parsing and status classification live here. The engine sees only
//! [`domain::ProviderCapability`] and the [`domain::ProviderFailure`] values it
//! returns.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`openai`] | `OpenAiCompatibleProvider` and the HTTP → category mapping |
//! | [`catalogue`] | Built-in vendors and `build_registry` |
//! | [`error`] | `LlmError` for adapter construction |

pub mod catalogue;
pub mod error;
pub mod openai;

pub use catalogue::{build_registry, build_registry_from_env, VendorSpec, ENABLED_PROVIDERS_VAR, VENDORS};
pub use error::LlmError;
pub use openai::{ClientSettings, OpenAiCompatibleProvider};
