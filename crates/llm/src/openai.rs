//! OpenAI-compatible chat-completions adapter.
//!
//! Groq, Mistral and Cerebras all accept the same request shape:
//! `POST {base}/chat/completions` with a bearer key, answering with
//! `choices[0].message.content` and an optional `usage` block. Credential
//! checks use `GET {base}/models`, which costs no tokens.

use std::time::Duration;

use async_trait::async_trait;
use domain::{ErrorCategory, ModelName, ProviderCapability, ProviderFailure, ProviderReply, TokenCount};
use reqwest::header::RETRY_AFTER;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::error::LlmError;

const SYSTEM_PROMPT: &str = "You are a helpful assistant. Provide concise, accurate responses.";

/// Characters of an error body kept in the failure message.
const MAX_ERROR_BODY_CHARS: usize = 300;

const VALIDATE_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Everything needed to construct one adapter.
#[derive(Clone, PartialEq)]
pub struct ClientSettings {
    /// Provider identifier, used in logs and construction errors.
    pub provider: String,
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub connect_timeout: Duration,
}

impl ClientSettings {
    /// Settings with the default sampling parameters.
    pub fn new(
        provider: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            max_tokens: 1024,
            temperature: 0.7,
            top_p: 0.9,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl std::fmt::Debug for ClientSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSettings")
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize, Default)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

/// [`ProviderCapability`] over an OpenAI-compatible HTTP API.
pub struct OpenAiCompatibleProvider {
    provider: String,
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: ModelName,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
}

impl std::fmt::Debug for OpenAiCompatibleProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatibleProvider")
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl OpenAiCompatibleProvider {
    /// Validates `settings` and builds the HTTP client.
    pub fn new(settings: ClientSettings) -> Result<Self, LlmError> {
        let base_url = settings.base_url.trim().trim_end_matches('/').to_string();
        if !(base_url.starts_with("https://") || base_url.starts_with("http://")) {
            return Err(LlmError::InvalidBaseUrl {
                url: settings.base_url,
                reason: "expected an http(s) URL".to_string(),
            });
        }

        let api_key = settings.api_key.trim().to_string();
        if api_key.is_empty() {
            return Err(LlmError::EmptyApiKey {
                provider: settings.provider,
            });
        }

        let Some(model) = ModelName::new(settings.model) else {
            return Err(LlmError::EmptyModel {
                provider: settings.provider,
            });
        };

        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .build()?;

        Ok(Self {
            provider: settings.provider,
            client,
            base_url,
            api_key,
            model,
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
            top_p: settings.top_p,
        })
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn models_url(&self) -> String {
        format!("{}/models", self.base_url)
    }
}

#[async_trait]
impl ProviderCapability for OpenAiCompatibleProvider {
    #[instrument(name = "llm_query", skip_all, fields(provider = %self.provider, model = %self.model))]
    async fn query(&self, prompt: &str, timeout: Duration) -> Result<ProviderReply, ProviderFailure> {
        let body = ChatRequest {
            model: self.model.as_str(),
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            top_p: self.top_p,
        };

        let response = self
            .client
            .post(self.chat_url())
            .bearer_auth(&self.api_key)
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_failure(&e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            let text = response.text().await.unwrap_or_default();
            let failure = failure_from_status(status.as_u16(), &text, retry_after);
            debug!(status = status.as_u16(), category = %failure.category, "Provider returned an error status");
            return Err(failure);
        }

        let text = response
            .text()
            .await
            .map_err(|e| transport_failure(&e, timeout))?;
        parse_completion(&text)
    }

    async fn validate_key(&self) -> bool {
        let outcome = self
            .client
            .get(self.models_url())
            .bearer_auth(&self.api_key)
            .timeout(VALIDATE_TIMEOUT)
            .send()
            .await;

        match outcome {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                warn!(provider = %self.provider, status = response.status().as_u16(), "API key rejected");
                false
            }
            Err(e) => {
                warn!(provider = %self.provider, error = %e, "API key check failed");
                false
            }
        }
    }

    fn model_name(&self) -> &ModelName {
        &self.model
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Maps a non-success HTTP response to a failure.
pub(crate) fn failure_from_status(
    status: u16,
    body: &str,
    retry_after: Option<Duration>,
) -> ProviderFailure {
    let clipped: String = body.trim().chars().take(MAX_ERROR_BODY_CHARS).collect();
    let failure = ProviderFailure::new(
        ErrorCategory::from_http_status(status),
        format!("HTTP {status}: {clipped}"),
    );
    match retry_after {
        Some(after) => failure.with_retry_after(after),
        None => failure,
    }
}

/// Maps a transport-level error to a failure.
fn transport_failure(e: &reqwest::Error, timeout: Duration) -> ProviderFailure {
    if e.is_timeout() {
        ProviderFailure::timeout(timeout)
    } else if e.is_connect() {
        ProviderFailure::new(ErrorCategory::ProviderDown, format!("Connection failed: {e}"))
    } else if e.is_decode() || e.is_body() {
        ProviderFailure::new(ErrorCategory::Unknown, format!("Malformed response: {e}"))
    } else {
        ProviderFailure::new(ErrorCategory::Unknown, format!("Request failed: {e}"))
    }
}

/// Parses a `Retry-After` value given in (possibly fractional) seconds.
///
/// The HTTP-date form is not supported and yields `None`.
pub(crate) fn parse_retry_after(raw: &str) -> Option<Duration> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && *secs > 0.0)
        .map(Duration::from_secs_f64)
}

/// Extracts the answer text and usage from a chat-completions body.
pub(crate) fn parse_completion(body: &str) -> Result<ProviderReply, ProviderFailure> {
    let parsed: ChatResponse = serde_json::from_str(body).map_err(|e| {
        ProviderFailure::new(ErrorCategory::Unknown, format!("Malformed completion: {e}"))
    })?;

    let text = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|text| !text.trim().is_empty())
        .ok_or_else(|| ProviderFailure::new(ErrorCategory::Unknown, "Completion contained no text"))?;

    let usage = parsed.usage.unwrap_or_default();
    let total = usage.prompt_tokens + usage.completion_tokens;
    let reply = ProviderReply::new(text);
    Ok(if total > 0 {
        reply.with_tokens(TokenCount::new(total))
    } else {
        reply
    })
}
