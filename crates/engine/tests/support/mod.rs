//! Scripted providers and engine wiring shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use domain::{
    CacheEntry, CacheError, ErrorCategory, ModelName, ProviderCapability, ProviderFailure, ProviderId,
    ProviderReply, QueryFingerprint, ResponseCache, UserId,
};
use engine::{
    EngineConfig, InMemoryResponseCache, OrchestrationRequest, Orchestrator, ProviderDescriptor,
    ProviderRegistry, ProviderStatus,
};
use tokio::time::Instant;

/// One scripted provider behaviour.
#[derive(Debug, Clone)]
pub enum Step {
    Reply(&'static str),
    Delayed(Duration, &'static str),
    Fail(ErrorCategory, &'static str),
    RateLimited(Duration),
    Hang,
    Panic,
}

/// Provider that plays back a script; the last step repeats forever.
pub struct ScriptedProvider {
    model: ModelName,
    steps: Mutex<VecDeque<Step>>,
    calls: AtomicU32,
    call_times: Mutex<Vec<Instant>>,
}

impl ScriptedProvider {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Arc<Self> {
        Arc::new(Self {
            model: ModelName::new("scripted-1").unwrap(),
            steps: Mutex::new(steps.into_iter().collect()),
            calls: AtomicU32::new(0),
            call_times: Mutex::new(Vec::new()),
        })
    }

    pub fn always(step: Step) -> Arc<Self> {
        Self::new([step])
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.call_times.lock().unwrap().clone()
    }

    fn next_step(&self) -> Step {
        let mut steps = self.steps.lock().unwrap();
        if steps.len() > 1 {
            steps.pop_front().unwrap()
        } else {
            steps.front().cloned().unwrap_or(Step::Hang)
        }
    }
}

#[async_trait]
impl ProviderCapability for ScriptedProvider {
    async fn query(&self, _prompt: &str, _timeout: Duration) -> Result<ProviderReply, ProviderFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.call_times.lock().unwrap().push(Instant::now());

        match self.next_step() {
            Step::Reply(text) => Ok(ProviderReply::new(text)),
            Step::Delayed(delay, text) => {
                tokio::time::sleep(delay).await;
                Ok(ProviderReply::new(text))
            }
            Step::Fail(category, message) => Err(ProviderFailure::new(category, message)),
            Step::RateLimited(after) => Err(ProviderFailure::new(
                ErrorCategory::RateLimited,
                "HTTP 429: slow down",
            )
            .with_retry_after(after)),
            Step::Hang => std::future::pending().await,
            Step::Panic => panic!("scripted provider fault"),
        }
    }

    async fn validate_key(&self) -> bool {
        true
    }

    fn model_name(&self) -> &ModelName {
        &self.model
    }
}

pub fn pid(s: &str) -> ProviderId {
    ProviderId::new(s).unwrap()
}

pub fn user(s: &str) -> UserId {
    UserId::new(s).unwrap()
}

/// Default configuration with merging turned off, so call counts only
/// reflect dispatch.
pub fn selecting_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.synthesis.enabled = false;
    config
}

/// Cache backend that is always down.
pub struct BrokenCache;

#[async_trait]
impl ResponseCache for BrokenCache {
    async fn lookup(
        &self,
        _fingerprint: &QueryFingerprint,
        _provider_id: &ProviderId,
        _user_id: &UserId,
    ) -> Result<Option<String>, CacheError> {
        Err(CacheError::Unavailable("connection refused".to_string()))
    }

    async fn store(&self, _entry: CacheEntry) -> Result<(), CacheError> {
        Err(CacheError::Backend("disk full".to_string()))
    }
}

/// An engine over the given scripted providers plus unavailable ones.
pub fn engine(
    config: EngineConfig,
    ready: &[(&str, Arc<ScriptedProvider>)],
    unavailable: &[&str],
) -> (Orchestrator, Arc<InMemoryResponseCache>) {
    let cache = Arc::new(InMemoryResponseCache::new());
    let orchestrator = engine_with_cache(config, ready, unavailable, cache.clone());
    (orchestrator, cache)
}

pub fn engine_with_cache(
    config: EngineConfig,
    ready: &[(&str, Arc<ScriptedProvider>)],
    unavailable: &[&str],
    cache: Arc<dyn ResponseCache>,
) -> Orchestrator {
    let mut registry = ProviderRegistry::new();
    for (id, provider) in ready {
        registry.register(pid(id), descriptor(id), provider.clone());
    }
    for id in unavailable {
        registry.register_unavailable(pid(id), descriptor(id), ProviderStatus::MissingApiKey, None);
    }
    Orchestrator::new(config, registry, cache).unwrap()
}

pub fn request(user_id: &str, query: &str, providers: &[&str]) -> OrchestrationRequest {
    OrchestrationRequest::new(user(user_id), query, providers.iter().map(|p| pid(p)).collect())
        .with_timeout(Duration::from_secs(2))
}

fn descriptor(id: &str) -> ProviderDescriptor {
    ProviderDescriptor {
        display_name: id.to_uppercase(),
        default_model: ModelName::new("scripted-1").unwrap(),
    }
}
