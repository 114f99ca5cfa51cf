use async_trait::async_trait;
use reqwest::Client;

use crate::config::{AppIdentity, ProviderConfig};
use crate::dispatch::openai::ChatEndpoint;
use crate::dispatch::{GenerateOptions, LlmResult, Message, Provider, TextStream};
use crate::error::CodesmithError;

/// Adapter for OpenRouter: OpenAI wire format, plus the attribution headers
/// OpenRouter uses to identify the calling app.
pub struct OpenRouterProvider {
    endpoint: ChatEndpoint,
}

impl OpenRouterProvider {
    pub fn new(key: &str, config: &ProviderConfig, client: Client, app: &AppIdentity) -> Self {
        let mut endpoint = ChatEndpoint::from_config(key, "OpenRouter", config, client);
        endpoint.extra_headers = vec![
            ("HTTP-Referer", app.url.clone()),
            ("X-Title", app.name.clone()),
        ];
        endpoint.explicit_stream_flag = true;
        Self { endpoint }
    }
}

#[async_trait]
impl Provider for OpenRouterProvider {
    fn name(&self) -> &str {
        &self.endpoint.provider
    }

    fn default_model(&self) -> &str {
        &self.endpoint.default_model
    }

    async fn generate(
        &self,
        messages: &[Message],
        options: &GenerateOptions,
    ) -> Result<LlmResult, CodesmithError> {
        self.endpoint.complete(messages, options).await
    }

    async fn generate_stream(
        &self,
        messages: &[Message],
        options: &GenerateOptions,
    ) -> Result<TextStream, CodesmithError> {
        self.endpoint.stream(messages, options).await
    }
}
