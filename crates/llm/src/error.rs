//! Errors raised while constructing provider adapters.
//!
//! Runtime call failures are not errors: they are reported as
//! [`domain::ProviderFailure`] values.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    /// The configured base URL cannot be used.
    #[error("Invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    /// The API key is empty.
    #[error("API key for '{provider}' is empty")]
    EmptyApiKey { provider: String },

    /// The configured model name is blank.
    #[error("Model name for '{provider}' is empty")]
    EmptyModel { provider: String },

    /// The HTTP client could not be built.
    #[error("HTTP client construction failed: {0}")]
    Client(#[from] reqwest::Error),
}
