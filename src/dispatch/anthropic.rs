use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::config::ProviderConfig;
use crate::dispatch::http::{self, endpoint};
use crate::dispatch::sse::{decode_text_stream, parse_anthropic_event};
use crate::dispatch::{GenerateOptions, LlmResult, Message, Provider, TextStream, Usage, split_system};
use crate::error::CodesmithError;

pub const ANTHROPIC_VERSION: &str = "2023-06-01";

const LABEL: &str = "Anthropic";

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    model: Option<String>,
    usage: Option<MessagesUsage>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct MessagesUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

/// Adapter for the Anthropic Messages API.
///
/// The system message travels as the top-level `system` field, never inside
/// `messages`; auth is `x-api-key` rather than a bearer token.
pub struct AnthropicProvider {
    provider: String,
    client: Client,
    base_url: String,
    api_key: String,
    default_model: String,
}

impl AnthropicProvider {
    pub fn new(key: &str, config: &ProviderConfig, client: Client) -> Self {
        Self {
            provider: key.to_string(),
            client,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            default_model: config.default_model.clone(),
        }
    }

    pub fn body(
        &self,
        messages: &[Message],
        options: &GenerateOptions,
        stream: bool,
    ) -> Result<serde_json::Value, CodesmithError> {
        let (system, rest) = split_system(messages)?;
        if rest.is_empty() {
            return Err(CodesmithError::Validation(
                "Anthropic requires at least one user or assistant message".to_string(),
            ));
        }

        let mut body = serde_json::json!({
            "model": self.model_for(options.model.as_deref()),
            "max_tokens": options.max_tokens_or_default(),
            "messages": rest,
        });
        if let Some(system) = system {
            body["system"] = serde_json::Value::String(system.to_string());
        }
        if let Some(temperature) = options.temperature {
            body["temperature"] = serde_json::json!(temperature);
        }
        if stream {
            body["stream"] = serde_json::Value::Bool(true);
        }
        Ok(body)
    }

    fn request(&self, body: &serde_json::Value) -> reqwest::RequestBuilder {
        self.client
            .post(endpoint(&self.base_url, "messages"))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(body)
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        &self.provider
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    async fn generate(
        &self,
        messages: &[Message],
        options: &GenerateOptions,
    ) -> Result<LlmResult, CodesmithError> {
        let body = self.body(messages, options, false)?;
        let requested_model = body["model"].as_str().unwrap_or_default().to_string();

        let response = http::send(self.request(&body), &self.provider, LABEL).await?;
        let parsed: MessagesResponse = http::read_json(response, &self.provider).await?;

        let text = match parsed.content.into_iter().next() {
            Some(ContentBlock::Text { text }) => text,
            _ => {
                return Err(CodesmithError::Upstream {
                    provider: self.provider.clone(),
                    message: "Unexpected response type from Anthropic".to_string(),
                    status: None,
                });
            }
        };

        Ok(LlmResult {
            content: text,
            model: parsed.model.unwrap_or(requested_model),
            usage: parsed.usage.map(|u| Usage {
                input_tokens: u.input_tokens,
                output_tokens: u.output_tokens,
            }),
        })
    }

    async fn generate_stream(
        &self,
        messages: &[Message],
        options: &GenerateOptions,
    ) -> Result<TextStream, CodesmithError> {
        let body = self.body(messages, options, true)?;
        let response = http::send(self.request(&body), &self.provider, LABEL).await?;
        Ok(decode_text_stream(
            response.bytes_stream(),
            &self.provider,
            LABEL,
            parse_anthropic_event,
        ))
    }
}
