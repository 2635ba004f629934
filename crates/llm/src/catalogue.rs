//! Built-in vendor catalogue and registry construction.
//!
//! Every catalogued vendor is registered: dispatchable when enabled and
//! keyed, otherwise with a status that explains why it is not.

use std::collections::BTreeSet;
use std::sync::Arc;

use domain::{ModelName, ProviderId};
use engine::{parse_provider_list, ProviderDescriptor, ProviderRegistry, ProviderStatus};
use tracing::{info, warn};

use crate::openai::{ClientSettings, OpenAiCompatibleProvider};

/// Comma-separated allow-list of vendor identifiers; unset enables all.
pub const ENABLED_PROVIDERS_VAR: &str = "ENABLED_PROVIDERS";

/// Static description of one OpenAI-compatible vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VendorSpec {
    pub id: &'static str,
    pub display_name: &'static str,
    pub base_url: &'static str,
    pub default_model: &'static str,
    /// Variable holding the API key.
    pub key_var: &'static str,
    /// Variable overriding the model.
    pub model_var: &'static str,
    /// Variable overriding the base URL.
    pub base_url_var: &'static str,
}

pub const VENDORS: &[VendorSpec] = &[
    VendorSpec {
        id: "groq",
        display_name: "Groq",
        base_url: "https://api.groq.com/openai/v1",
        default_model: "llama-3.3-70b-versatile",
        key_var: "GROQ_API_KEY",
        model_var: "GROQ_MODEL",
        base_url_var: "GROQ_BASE_URL",
    },
    VendorSpec {
        id: "mistral",
        display_name: "Mistral AI",
        base_url: "https://api.mistral.ai/v1",
        default_model: "mistral-large-latest",
        key_var: "MISTRAL_API_KEY",
        model_var: "MISTRAL_MODEL",
        base_url_var: "MISTRAL_BASE_URL",
    },
    VendorSpec {
        id: "cerebras",
        display_name: "Cerebras",
        base_url: "https://api.cerebras.ai/v1",
        default_model: "llama-3.1-70b",
        key_var: "CEREBRAS_API_KEY",
        model_var: "CEREBRAS_MODEL",
        base_url_var: "CEREBRAS_BASE_URL",
    },
];

/// Builds the registry from process environment variables.
pub fn build_registry_from_env() -> ProviderRegistry {
    build_registry(|key| std::env::var(key).ok())
}

/// Builds the registry, reading configuration through `lookup`.
///
/// Blank values are treated as unset.
pub fn build_registry<F>(lookup: F) -> ProviderRegistry
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    let enabled: Option<BTreeSet<ProviderId>> = get(ENABLED_PROVIDERS_VAR)
        .map(|raw| parse_provider_list(&raw).into_iter().collect());
    if let Some(enabled) = &enabled {
        for id in enabled {
            if !VENDORS.iter().any(|v| v.id == id.as_str()) {
                warn!(provider = %id, "Enabled provider is not in the catalogue");
            }
        }
    }

    let mut registry = ProviderRegistry::new();
    for vendor in VENDORS {
        let Some(id) = ProviderId::new(vendor.id) else {
            continue;
        };
        let model = get(vendor.model_var).unwrap_or_else(|| vendor.default_model.to_string());
        let Some(default_model) = ModelName::new(model.as_str()) else {
            continue;
        };
        let descriptor = ProviderDescriptor {
            display_name: vendor.display_name.to_string(),
            default_model,
        };

        if enabled.as_ref().is_some_and(|set| !set.contains(&id)) {
            registry.register_unavailable(id, descriptor, ProviderStatus::DisabledByConfig, None);
            continue;
        }
        let Some(api_key) = get(vendor.key_var) else {
            registry.register_unavailable(
                id,
                descriptor,
                ProviderStatus::MissingApiKey,
                Some(format!("{} is not set", vendor.key_var)),
            );
            continue;
        };

        let base_url = get(vendor.base_url_var).unwrap_or_else(|| vendor.base_url.to_string());
        match OpenAiCompatibleProvider::new(ClientSettings::new(vendor.id, base_url, api_key, model)) {
            Ok(provider) => registry.register(id, descriptor, Arc::new(provider)),
            Err(e) => registry.register_unavailable(
                id,
                descriptor,
                ProviderStatus::InitFailed,
                Some(e.to_string()),
            ),
        }
    }

    info!(available = registry.available_ids().len(), "Provider registry built");
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn pid(s: &str) -> ProviderId {
        ProviderId::new(s).unwrap()
    }

    #[test]
    fn test_every_vendor_is_listed_without_keys() {
        let registry = build_registry(lookup(&[]));
        let info = registry.info();

        assert_eq!(info.len(), VENDORS.len());
        assert!(registry.available_ids().is_empty());
        for vendor in VENDORS {
            let entry = &info[&pid(vendor.id)];
            assert_eq!(entry.status, ProviderStatus::MissingApiKey);
            assert!(entry.enabled);
            assert!(!entry.initialized);
            assert_eq!(entry.default_model.as_str(), vendor.default_model);
        }
    }

    #[test]
    fn test_keyed_vendor_is_ready_with_model_override() {
        let registry = build_registry(lookup(&[
            ("GROQ_API_KEY", "gsk-test"),
            ("GROQ_MODEL", "llama-3.1-8b-instant"),
        ]));

        assert_eq!(registry.available_ids(), vec![pid("groq")]);
        let capability = registry.capability(&pid("groq")).unwrap();
        assert_eq!(capability.model_name().as_str(), "llama-3.1-8b-instant");
        assert_eq!(registry.info()[&pid("groq")].status, ProviderStatus::Ready);
    }

    #[test]
    fn test_allow_list_disables_other_vendors() {
        let registry = build_registry(lookup(&[
            ("ENABLED_PROVIDERS", "mistral, cohere"),
            ("GROQ_API_KEY", "gsk-test"),
            ("MISTRAL_API_KEY", "mk-test"),
        ]));

        let info = registry.info();
        assert_eq!(info[&pid("groq")].status, ProviderStatus::DisabledByConfig);
        assert!(!info[&pid("groq")].enabled);
        assert_eq!(info[&pid("mistral")].status, ProviderStatus::Ready);
        assert_eq!(info[&pid("cerebras")].status, ProviderStatus::DisabledByConfig);
        assert!(!info.contains_key(&pid("cohere")));
    }

    #[test]
    fn test_bad_base_url_is_init_failure() {
        let registry = build_registry(lookup(&[
            ("CEREBRAS_API_KEY", "ck-test"),
            ("CEREBRAS_BASE_URL", "api.cerebras.ai"),
        ]));

        let entry = &registry.info()[&pid("cerebras")];
        assert_eq!(entry.status, ProviderStatus::InitFailed);
        assert!(entry.error.as_deref().unwrap().contains("Invalid base URL"));
        assert!(!registry.is_available(&pid("cerebras")));
    }

    #[test]
    fn test_blank_key_counts_as_missing() {
        let registry = build_registry(lookup(&[("MISTRAL_API_KEY", "   ")]));
        assert_eq!(registry.info()[&pid("mistral")].status, ProviderStatus::MissingApiKey);
    }
}
