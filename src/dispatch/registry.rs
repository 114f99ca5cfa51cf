use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

use reqwest::Client;

use crate::config::{AppIdentity, Config, ProviderConfig, ProviderKind};
use crate::dispatch::Provider;
use crate::dispatch::anthropic::AnthropicProvider;
use crate::dispatch::http::build_client;
use crate::dispatch::openai::OpenAiProvider;
use crate::dispatch::openrouter::OpenRouterProvider;
use crate::error::CodesmithError;

/// Resolves provider names to adapters.
///
/// Adapters are built on first use and cached for the life of the registry,
/// so every caller asking for the same name shares one instance (and the
/// connection pool behind it).
pub struct Registry {
    default_provider: String,
    providers: HashMap<String, ProviderConfig>,
    app: AppIdentity,
    client: Client,
    cache: Mutex<HashMap<String, Arc<dyn Provider>>>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("default_provider", &self.default_provider)
            .field("providers", &self.providers)
            .finish_non_exhaustive()
    }
}

impl Registry {
    pub fn from_config(config: &Config) -> Result<Self, CodesmithError> {
        let client = build_client(&config.generation)?;
        Ok(Self {
            default_provider: config.default_provider.clone(),
            providers: config.providers.clone(),
            app: config.app.clone(),
            client,
            cache: Mutex::new(HashMap::new()),
        })
    }

    pub fn default_provider(&self) -> &str {
        &self.default_provider
    }

    /// Resolve `name` (or the configured default) to its adapter.
    ///
    /// Fails with a configuration error when the name is unknown or its
    /// credential is empty.
    pub fn get_provider(&self, name: Option<&str>) -> Result<Arc<dyn Provider>, CodesmithError> {
        let name = match name {
            Some(n) if !n.trim().is_empty() => n,
            _ => self.default_provider.as_str(),
        };

        // Construction is cheap and side-effect free, but holding the lock
        // across it still guarantees one instance per name.
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(provider) = cache.get(name) {
            return Ok(provider.clone());
        }

        let config = self.providers.get(name).ok_or_else(|| {
            CodesmithError::Configuration(format!("Provider '{name}' not found in configuration"))
        })?;
        if !config.has_credential() {
            return Err(CodesmithError::Configuration(format!(
                "API key not configured for provider '{name}'"
            )));
        }

        let provider = self.build(name, config);
        tracing::info!(
            "initialized {} provider '{name}' (default model {})",
            config.name,
            config.default_model
        );
        cache.insert(name.to_string(), provider.clone());
        Ok(provider)
    }

    fn build(&self, name: &str, config: &ProviderConfig) -> Arc<dyn Provider> {
        let client = self.client.clone();
        match config.kind {
            ProviderKind::OpenRouter => {
                Arc::new(OpenRouterProvider::new(name, config, client, &self.app))
            }
            ProviderKind::Anthropic => Arc::new(AnthropicProvider::new(name, config, client)),
            ProviderKind::OpenAi => Arc::new(OpenAiProvider::new(name, config, client)),
        }
    }

    /// Names of providers that have a credential configured.
    /// Reflects configuration, not which adapters have been built.
    pub fn available_providers(&self) -> BTreeSet<String> {
        self.providers
            .iter()
            .filter(|(_, config)| config.has_credential())
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Configured model list for `name`; empty when the name is unknown.
    pub fn provider_models(&self, name: &str) -> Vec<String> {
        self.providers
            .get(name)
            .map(|config| config.models.clone())
            .unwrap_or_default()
    }

    /// Number of adapters built so far.
    pub fn cached_count(&self) -> usize {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
