//! Provider registry: identifier → capability, plus configuration status.
//!
//! Built once at startup by the composition root. Providers that are
//! configured but not usable (disabled, missing credentials, failed
//! construction) are still registered so that requests naming them get a
//! `not_initialized` result and `info()` can explain why.

use std::collections::BTreeMap;
use std::sync::Arc;

use domain::{ModelName, ProviderCapability, ProviderId};
use futures::future::join_all;
use serde::Serialize;
use tracing::{info, warn};

/// Why a configured provider is or is not dispatchable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderStatus {
    Ready,
    DisabledByConfig,
    MissingApiKey,
    InitFailed,
}

/// Static description of a configured provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderDescriptor {
    pub display_name: String,
    pub default_model: ModelName,
}

/// Reported view of one provider, as returned by [`ProviderRegistry::info`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderInfo {
    pub display_name: String,
    pub enabled: bool,
    pub initialized: bool,
    pub default_model: ModelName,
    pub status: ProviderStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

struct Registration {
    descriptor: ProviderDescriptor,
    status: ProviderStatus,
    error: Option<String>,
    capability: Option<Arc<dyn ProviderCapability>>,
}

/// Registry of every configured provider.
#[derive(Default)]
pub struct ProviderRegistry {
    entries: BTreeMap<ProviderId, Registration>,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(id, r)| (id, r.status)))
            .finish()
    }
}

impl ProviderRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a ready provider, replacing any previous registration.
    pub fn register(
        &mut self,
        id: ProviderId,
        descriptor: ProviderDescriptor,
        capability: Arc<dyn ProviderCapability>,
    ) {
        info!(provider = %id, model = %capability.model_name(), "Provider registered");
        self.entries.insert(
            id,
            Registration {
                descriptor,
                status: ProviderStatus::Ready,
                error: None,
                capability: Some(capability),
            },
        );
    }

    /// Registers a configured provider that cannot be dispatched.
    ///
    /// `status` should not be [`ProviderStatus::Ready`]; such a registration
    /// is still treated as unavailable because it has no capability.
    pub fn register_unavailable(
        &mut self,
        id: ProviderId,
        descriptor: ProviderDescriptor,
        status: ProviderStatus,
        error: Option<String>,
    ) {
        warn!(provider = %id, ?status, error = error.as_deref().unwrap_or(""), "Provider unavailable");
        self.entries.insert(
            id,
            Registration {
                descriptor,
                status,
                error,
                capability: None,
            },
        );
    }

    /// Returns the capability for a dispatchable provider.
    pub fn capability(&self, id: &ProviderId) -> Option<Arc<dyn ProviderCapability>> {
        self.entries.get(id).and_then(|r| r.capability.clone())
    }

    /// Returns `true` if `id` is registered and initialized.
    pub fn is_available(&self, id: &ProviderId) -> bool {
        self.entries
            .get(id)
            .is_some_and(|r| r.capability.is_some())
    }

    /// Identifiers of every dispatchable provider, sorted.
    pub fn available_ids(&self) -> Vec<ProviderId> {
        self.entries
            .iter()
            .filter(|(_, r)| r.capability.is_some())
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Describes every registered provider.
    pub fn info(&self) -> BTreeMap<ProviderId, ProviderInfo> {
        self.entries
            .iter()
            .map(|(id, r)| {
                (
                    id.clone(),
                    ProviderInfo {
                        display_name: r.descriptor.display_name.clone(),
                        enabled: r.status != ProviderStatus::DisabledByConfig,
                        initialized: r.capability.is_some(),
                        default_model: r.descriptor.default_model.clone(),
                        status: r.status,
                        error: r.error.clone(),
                    },
                )
            })
            .collect()
    }

    /// Validates the credentials of every dispatchable provider concurrently.
    ///
    /// A check that panics is reported as `false`.
    pub async fn validate_all(&self) -> BTreeMap<ProviderId, bool> {
        let handles: Vec<_> = self
            .entries
            .iter()
            .filter_map(|(id, r)| r.capability.clone().map(|c| (id.clone(), c)))
            .map(|(id, capability)| {
                let handle = tokio::spawn(async move { capability.validate_key().await });
                (id, handle)
            })
            .collect();

        let (ids, handles): (Vec<_>, Vec<_>) = handles.into_iter().unzip();
        let outcomes = join_all(handles).await;

        ids.into_iter()
            .zip(outcomes)
            .map(|(id, outcome)| {
                let valid = outcome.unwrap_or_else(|e| {
                    warn!(provider = %id, error = %e, "Key validation task failed");
                    false
                });
                (id, valid)
            })
            .collect()
    }
}
