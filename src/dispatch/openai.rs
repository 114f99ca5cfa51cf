use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::config::ProviderConfig;
use crate::dispatch::http::{self, endpoint};
use crate::dispatch::sse::{decode_text_stream, parse_chat_delta};
use crate::dispatch::{
    DEFAULT_TEMPERATURE, GenerateOptions, LlmResult, Message, Provider, TextStream, Usage,
    split_system,
};
use crate::error::CodesmithError;

#[derive(Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
    model: Option<String>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

/// A `/chat/completions` endpoint in the OpenAI wire format.
///
/// Shared by the OpenAI-compatible and OpenRouter adapters; they differ only
/// in extra headers and how explicit they are about the stream flag.
pub(crate) struct ChatEndpoint {
    pub provider: String,
    pub label: &'static str,
    pub client: Client,
    pub base_url: String,
    pub api_key: String,
    pub default_model: String,
    pub extra_headers: Vec<(&'static str, String)>,
    /// Send `"stream": false` on buffered calls instead of omitting the flag.
    pub explicit_stream_flag: bool,
}

impl ChatEndpoint {
    pub fn from_config(
        key: &str,
        label: &'static str,
        config: &ProviderConfig,
        client: Client,
    ) -> Self {
        Self {
            provider: key.to_string(),
            label,
            client,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            default_model: config.default_model.clone(),
            extra_headers: Vec::new(),
            explicit_stream_flag: false,
        }
    }

    fn model_for(&self, requested: Option<&str>) -> String {
        match requested {
            Some(model) if !model.is_empty() => model.to_string(),
            _ => self.default_model.clone(),
        }
    }

    /// Request body. The system message stays inline in `messages`.
    pub fn body(
        &self,
        messages: &[Message],
        options: &GenerateOptions,
        stream: bool,
    ) -> Result<serde_json::Value, CodesmithError> {
        // Validates shape only; chat-completions accepts the system role inline.
        split_system(messages)?;

        let mut body = serde_json::json!({
            "model": self.model_for(options.model.as_deref()),
            "messages": messages,
            "max_tokens": options.max_tokens_or_default(),
            "temperature": options.temperature.unwrap_or(DEFAULT_TEMPERATURE),
        });
        if stream {
            body["stream"] = serde_json::Value::Bool(true);
        } else if self.explicit_stream_flag {
            body["stream"] = serde_json::Value::Bool(false);
        }
        Ok(body)
    }

    fn request(&self, body: &serde_json::Value) -> reqwest::RequestBuilder {
        let mut request = self
            .client
            .post(endpoint(&self.base_url, "chat/completions"))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json");
        for (name, value) in &self.extra_headers {
            request = request.header(*name, value);
        }
        request.json(body)
    }

    pub async fn complete(
        &self,
        messages: &[Message],
        options: &GenerateOptions,
    ) -> Result<LlmResult, CodesmithError> {
        let body = self.body(messages, options, false)?;
        let requested_model = body["model"].as_str().unwrap_or_default().to_string();

        let response = http::send(self.request(&body), &self.provider, self.label).await?;
        let completion: ChatCompletion = http::read_json(response, &self.provider).await?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| CodesmithError::Upstream {
                provider: self.provider.clone(),
                message: format!("{} API error: empty choices or null content", self.label),
                status: None,
            })?;

        Ok(LlmResult {
            content,
            model: completion.model.unwrap_or(requested_model),
            usage: completion.usage.map(|u| Usage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            }),
        })
    }

    pub async fn stream(
        &self,
        messages: &[Message],
        options: &GenerateOptions,
    ) -> Result<TextStream, CodesmithError> {
        let body = self.body(messages, options, true)?;
        let response = http::send(self.request(&body), &self.provider, self.label).await?;
        Ok(decode_text_stream(
            response.bytes_stream(),
            &self.provider,
            self.label,
            parse_chat_delta,
        ))
    }
}

/// Adapter for OpenAI and any OpenAI-compatible chat completions API.
pub struct OpenAiProvider {
    endpoint: ChatEndpoint,
}

impl OpenAiProvider {
    pub fn new(key: &str, config: &ProviderConfig, client: Client) -> Self {
        Self {
            endpoint: ChatEndpoint::from_config(key, "OpenAI", config, client),
        }
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
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
