use schemars::JsonSchema;
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct GenerateCodeRequest {
    /// What to build, in plain language. Must be non-empty.
    pub prompt: String,
    /// Extra material (existing code, constraints) appended under a "Context:" heading.
    pub context: Option<String>,
    /// Model name from `list_providers`. Defaults to the provider's default model.
    pub model: Option<String>,
    /// Provider name from `list_providers` ("openrouter", "anthropic", "openai").
    /// Defaults to the server's configured default provider.
    pub provider: Option<String>,
}

impl GenerateCodeRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    /// User message content: the prompt, plus a labelled context section when given.
    pub fn user_content(&self) -> String {
        match self.context.as_deref().filter(|c| !c.trim().is_empty()) {
            Some(context) => format!("{}\n\nContext:\n{context}", self.prompt),
            None => self.prompt.clone(),
        }
    }
}
