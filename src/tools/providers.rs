use std::collections::BTreeMap;

use serde::Serialize;

use crate::dispatch::registry::Registry;

/// Usable providers and the models each one exposes.
#[derive(Debug, Serialize)]
pub struct ProvidersResponse {
    pub default_provider: String,
    pub providers: Vec<String>,
    pub models_by_provider: BTreeMap<String, Vec<String>>,
}

impl From<&Registry> for ProvidersResponse {
    fn from(registry: &Registry) -> Self {
        let providers: Vec<String> = registry.available_providers().into_iter().collect();
        let models_by_provider = providers
            .iter()
            .map(|name| (name.clone(), registry.provider_models(name)))
            .collect();
        Self {
            default_provider: registry.default_provider().to_string(),
            providers,
            models_by_provider,
        }
    }
}
