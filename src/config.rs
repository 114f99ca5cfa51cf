use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::CodesmithError;

pub const DEFAULT_PROVIDER: &str = "openrouter";

/// Default config file looked up in the working directory.
const CONFIG_FILE_NAME: &str = "codesmith.toml";

/// Which adapter speaks to a provider's API.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenRouter chat completions (OpenAI wire format plus attribution headers).
    OpenRouter,
    /// Anthropic Messages API (x-api-key auth, top-level system prompt).
    Anthropic,
    /// Any OpenAI-compatible chat completions endpoint.
    OpenAi,
}

impl ProviderKind {
    /// Adapter kind implied by one of the built-in provider names.
    pub fn for_name(name: &str) -> Option<Self> {
        match name {
            "openrouter" => Some(Self::OpenRouter),
            "anthropic" => Some(Self::Anthropic),
            "openai" => Some(Self::OpenAi),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct ProviderConfig {
    /// Display name ("OpenRouter", "Anthropic", ...).
    pub name: String,
    pub kind: ProviderKind,
    /// Empty when no credential is configured; such providers are unusable.
    pub api_key: String,
    pub base_url: String,
    pub default_model: String,
    pub models: Vec<String>,
}

impl ProviderConfig {
    pub fn has_credential(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("base_url", &self.base_url)
            .field("default_model", &self.default_model)
            .field("models", &self.models)
            .field(
                "api_key",
                &if self.has_credential() { "[REDACTED]" } else { "[EMPTY]" },
            )
            .finish()
    }
}

/// Knobs for the generation orchestrator and the HTTP transport.
#[derive(Clone, Debug)]
pub struct GenerationConfig {
    /// max_tokens sent by the orchestrator on both generation paths.
    pub max_tokens: u32,
    /// Sampling temperature; None lets each adapter apply its own default.
    pub temperature: Option<f64>,
    /// Prompts longer than this are rejected before any vendor call.
    pub max_prompt_chars: usize,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_tokens: 500,
            temperature: None,
            max_prompt_chars: 5000,
            request_timeout_secs: 300,
            connect_timeout_secs: 10,
        }
    }
}

/// Attribution sent to OpenRouter as `HTTP-Referer` / `X-Title`.
#[derive(Clone, Debug)]
pub struct AppIdentity {
    pub url: String,
    pub name: String,
}

impl Default for AppIdentity {
    fn default() -> Self {
        Self {
            url: "http://localhost:3000".to_string(),
            name: "AI Code Generator".to_string(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub default_provider: String,
    pub providers: HashMap<String, ProviderConfig>,
    pub generation: GenerationConfig,
    pub app: AppIdentity,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl Config {
    /// Environment defaults, then `codesmith.toml` (or `$CODESMITH_CONFIG`) on top.
    /// A broken config file is logged and skipped rather than aborting startup.
    pub fn load() -> Self {
        let mut config = Self::from_env();

        let path = env::var("CODESMITH_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(CONFIG_FILE_NAME));

        if path.exists() {
            match config.apply_file(&path) {
                Ok(()) => tracing::info!("loaded config overrides from {}", path.display()),
                Err(e) => tracing::warn!("ignoring config file {}: {e}", path.display()),
            }
        }

        for (key, provider) in &config.providers {
            if !provider.has_credential() {
                tracing::warn!("no API key for {key}, provider unavailable");
            }
        }
        if !config.providers.values().any(ProviderConfig::has_credential) {
            tracing::error!("no provider credentials configured, generation will fail");
        }

        config
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the built-in provider table, reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let key = |var: &str| lookup(var).unwrap_or_default();

        let mut providers = HashMap::new();

        providers.insert(
            "openrouter".to_string(),
            ProviderConfig {
                name: "OpenRouter".to_string(),
                kind: ProviderKind::OpenRouter,
                api_key: key("OPENROUTER_API_KEY"),
                base_url: "https://openrouter.ai/api/v1".to_string(),
                default_model: "anthropic/claude-3.5-sonnet".to_string(),
                models: strings(&[
                    "anthropic/claude-3.5-sonnet",
                    "anthropic/claude-3-haiku",
                    "openai/gpt-4-turbo",
                    "openai/gpt-3.5-turbo",
                    "meta-llama/llama-3.1-70b-instruct",
                ]),
            },
        );

        providers.insert(
            "anthropic".to_string(),
            ProviderConfig {
                name: "Anthropic".to_string(),
                kind: ProviderKind::Anthropic,
                api_key: key("ANTHROPIC_API_KEY"),
                base_url: "https://api.anthropic.com/v1".to_string(),
                default_model: "claude-sonnet-4-20250514".to_string(),
                models: strings(&[
                    "claude-sonnet-4-20250514",
                    "claude-haiku-4-5-20251001",
                    "claude-opus-4-20250514",
                ]),
            },
        );

        providers.insert(
            "openai".to_string(),
            ProviderConfig {
                name: "OpenAI".to_string(),
                kind: ProviderKind::OpenAi,
                api_key: key("OPENAI_API_KEY"),
                base_url: "https://api.openai.com/v1".to_string(),
                default_model: "gpt-4-turbo-preview".to_string(),
                models: strings(&["gpt-4-turbo-preview", "gpt-4", "gpt-3.5-turbo"]),
            },
        );

        let mut app = AppIdentity::default();
        if let Some(url) = lookup("APP_URL").filter(|s| !s.is_empty()) {
            app.url = url;
        }
        if let Some(name) = lookup("APP_NAME").filter(|s| !s.is_empty()) {
            app.name = name;
        }

        Config {
            default_provider: lookup("CODESMITH_DEFAULT_PROVIDER")
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_PROVIDER.to_string()),
            providers,
            generation: GenerationConfig::default(),
            app,
        }
    }

    pub fn apply_file(&mut self, path: &Path) -> Result<(), CodesmithError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            CodesmithError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        self.apply_toml(&text)
    }

    /// Overlay a TOML document. Unset fields keep their current values;
    /// unknown provider names add new providers. A rejected document
    /// leaves `self` untouched.
    pub fn apply_toml(&mut self, text: &str) -> Result<(), CodesmithError> {
        let file: FileConfig = toml::from_str(text)
            .map_err(|e| CodesmithError::Configuration(format!("invalid config TOML: {e}")))?;

        let mut next = self.clone();
        next.merge_file(file)?;
        *self = next;
        Ok(())
    }

    fn merge_file(&mut self, file: FileConfig) -> Result<(), CodesmithError> {
        if let Some(default_provider) = file.default_provider {
            self.default_provider = default_provider;
        }

        if let Some(generation) = file.generation {
            let g = &mut self.generation;
            if let Some(v) = generation.max_tokens {
                if v == 0 {
                    return Err(CodesmithError::Configuration(
                        "generation.max_tokens must be positive".to_string(),
                    ));
                }
                g.max_tokens = v;
            }
            if let Some(v) = generation.temperature {
                g.temperature = Some(v);
            }
            if let Some(v) = generation.max_prompt_chars {
                g.max_prompt_chars = v;
            }
            if let Some(v) = generation.request_timeout_secs {
                g.request_timeout_secs = v;
            }
            if let Some(v) = generation.connect_timeout_secs {
                g.connect_timeout_secs = v;
            }
        }

        if let Some(app) = file.app {
            if let Some(url) = app.url {
                self.app.url = url;
            }
            if let Some(name) = app.name {
                self.app.name = name;
            }
        }

        for (key, overlay) in file.providers {
            match self.providers.get_mut(&key) {
                Some(existing) => overlay.merge_into(existing),
                None => {
                    let provider = overlay.into_new(&key)?;
                    self.providers.insert(key, provider);
                }
            }
        }

        Ok(())
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[derive(Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    default_provider: Option<String>,
    generation: Option<FileGeneration>,
    app: Option<FileApp>,
    #[serde(default)]
    providers: HashMap<String, FileProvider>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct FileGeneration {
    max_tokens: Option<u32>,
    temperature: Option<f64>,
    max_prompt_chars: Option<usize>,
    request_timeout_secs: Option<u64>,
    connect_timeout_secs: Option<u64>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct FileApp {
    url: Option<String>,
    name: Option<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct FileProvider {
    name: Option<String>,
    kind: Option<ProviderKind>,
    api_key: Option<String>,
    base_url: Option<String>,
    default_model: Option<String>,
    models: Option<Vec<String>>,
}

impl FileProvider {
    fn merge_into(self, existing: &mut ProviderConfig) {
        if let Some(v) = self.name {
            existing.name = v;
        }
        if let Some(v) = self.kind {
            existing.kind = v;
        }
        if let Some(v) = self.api_key {
            existing.api_key = v;
        }
        if let Some(v) = self.base_url {
            existing.base_url = v;
        }
        if let Some(v) = self.default_model {
            existing.default_model = v;
        }
        if let Some(v) = self.models {
            existing.models = v;
        }
    }

    fn into_new(self, key: &str) -> Result<ProviderConfig, CodesmithError> {
        let base_url = self.base_url.ok_or_else(|| {
            CodesmithError::Configuration(format!("provider '{key}' needs a base_url"))
        })?;
        let default_model = self.default_model.ok_or_else(|| {
            CodesmithError::Configuration(format!("provider '{key}' needs a default_model"))
        })?;
        let models = self.models.unwrap_or_else(|| vec![default_model.clone()]);

        Ok(ProviderConfig {
            name: self.name.unwrap_or_else(|| key.to_string()),
            kind: self
                .kind
                .or_else(|| ProviderKind::for_name(key))
                .unwrap_or(ProviderKind::OpenAi),
            api_key: self.api_key.unwrap_or_default(),
            base_url,
            default_model,
            models,
        })
    }
}
