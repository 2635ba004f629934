//! The chat-completions adapter against a local mock server.

use std::time::Duration;

use domain::{ErrorCategory, ProviderCapability, TokenCount};
use llm::{ClientSettings, OpenAiCompatibleProvider};
use mockito::Matcher;
use pretty_assertions::assert_eq;
use serde_json::json;

const TIMEOUT: Duration = Duration::from_secs(5);

fn provider(server: &mockito::Server) -> OpenAiCompatibleProvider {
    OpenAiCompatibleProvider::new(ClientSettings::new("groq", server.url(), "test-key", "llama-test")).unwrap()
}

#[tokio::test]
async fn test_successful_completion() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .match_header("authorization", "Bearer test-key")
        .match_body(Matcher::AllOf(vec![
            Matcher::PartialJson(json!({"model": "llama-test", "max_tokens": 1024})),
            Matcher::Regex(r#""content":"Capital of France\?""#.to_string()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "choices": [{"message": {"role": "assistant", "content": "Paris"}}],
                "usage": {"prompt_tokens": 20, "completion_tokens": 1}
            })
            .to_string(),
        )
        .create_async()
        .await;

    let reply = provider(&server).query("Capital of France?", TIMEOUT).await.unwrap();

    assert_eq!(reply.text, "Paris");
    assert_eq!(reply.token_count, Some(TokenCount::new(21)));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_rate_limit_carries_retry_after() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/chat/completions")
        .with_status(429)
        .with_header("retry-after", "7")
        .with_body(r#"{"error":{"message":"Rate limit reached"}}"#)
        .create_async()
        .await;

    let failure = provider(&server).query("q", TIMEOUT).await.unwrap_err();

    assert_eq!(failure.category, ErrorCategory::RateLimited);
    assert_eq!(failure.retry_after, Some(Duration::from_secs(7)));
    assert!(failure.message.starts_with("HTTP 429: "));
}

#[tokio::test]
async fn test_error_statuses_are_classified() {
    let cases = [
        (401, ErrorCategory::AuthError),
        (404, ErrorCategory::ModelNotFound),
        (400, ErrorCategory::BadRequest),
        (503, ErrorCategory::ProviderDown),
        (504, ErrorCategory::Timeout),
    ];

    for (status, expected) in cases {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(status)
            .with_body("nope")
            .create_async()
            .await;

        let failure = provider(&server).query("q", TIMEOUT).await.unwrap_err();
        assert_eq!(failure.category, expected, "status {status}");
        assert_eq!(failure.message, format!("HTTP {status}: nope"));
    }
}

#[tokio::test]
async fn test_malformed_body_is_unknown() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_body("<html>gateway</html>")
        .create_async()
        .await;

    let failure = provider(&server).query("q", TIMEOUT).await.unwrap_err();
    assert_eq!(failure.category, ErrorCategory::Unknown);
}

#[tokio::test]
async fn test_unreachable_host_is_provider_down() {
    let p = OpenAiCompatibleProvider::new(ClientSettings::new("groq", "http://127.0.0.1:1", "k", "m")).unwrap();
    let failure = p.query("q", TIMEOUT).await.unwrap_err();
    assert_eq!(failure.category, ErrorCategory::ProviderDown);
}

#[tokio::test]
async fn test_validate_key_uses_models_endpoint() {
    let mut server = mockito::Server::new_async().await;
    let ok = server
        .mock("GET", "/models")
        .match_header("authorization", "Bearer test-key")
        .with_status(200)
        .with_body(r#"{"data":[]}"#)
        .create_async()
        .await;

    assert!(provider(&server).validate_key().await);
    ok.assert_async().await;

    let mut rejecting = mockito::Server::new_async().await;
    rejecting
        .mock("GET", "/models")
        .with_status(401)
        .create_async()
        .await;
    assert!(!provider(&rejecting).validate_key().await);
}
