pub mod anthropic;
pub mod http;
pub mod openai;
pub mod openrouter;
pub mod registry;
pub mod sse;

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;
use serde::{Deserialize, Serialize};

use crate::error::CodesmithError;

/// max_tokens sent when the caller leaves it unset.
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Temperature sent by chat-completions adapters when the caller leaves it unset.
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Per-call generation knobs. Unset fields fall back to adapter defaults.
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
    /// Informational; `generate_stream` always streams and `generate` never does.
    pub stream: Option<bool>,
}

impl GenerateOptions {
    pub fn max_tokens_or_default(&self) -> u32 {
        self.max_tokens.filter(|n| *n > 0).unwrap_or(DEFAULT_MAX_TOKENS)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Result of one buffered generation.
#[derive(Debug, Clone)]
pub struct LlmResult {
    pub content: String,
    /// Model actually used, as reported by the vendor.
    pub model: String,
    pub usage: Option<Usage>,
}

/// Lazy, forward-only sequence of text fragments from one streaming call.
/// Dropping it releases the underlying connection. After an `Err` item the
/// stream ends.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, CodesmithError>> + Send>>;

/// Uniform interface over one vendor's chat API.
///
/// Implementations hold only read-only configuration and a shared HTTP client,
/// so one instance serves any number of concurrent requests.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Registry key for this provider ("anthropic", "openai", ...).
    fn name(&self) -> &str;

    fn default_model(&self) -> &str;

    /// `requested` if non-empty, else the configured default model.
    fn model_for(&self, requested: Option<&str>) -> String {
        match requested {
            Some(model) if !model.is_empty() => model.to_string(),
            _ => self.default_model().to_string(),
        }
    }

    /// One buffered request → one complete result.
    async fn generate(
        &self,
        messages: &[Message],
        options: &GenerateOptions,
    ) -> Result<LlmResult, CodesmithError>;

    /// One streaming request → text fragments in vendor order.
    async fn generate_stream(
        &self,
        messages: &[Message],
        options: &GenerateOptions,
    ) -> Result<TextStream, CodesmithError>;
}

/// Check the message list and pull out the (single) system message.
/// Returns the system content, if any, and the remaining messages in order.
pub fn split_system(
    messages: &[Message],
) -> Result<(Option<&str>, Vec<&Message>), CodesmithError> {
    if messages.is_empty() {
        return Err(CodesmithError::Validation(
            "at least one message is required".to_string(),
        ));
    }

    let mut system = None;
    let mut rest = Vec::with_capacity(messages.len());
    for message in messages {
        if message.role == Role::System {
            if system.is_some() {
                return Err(CodesmithError::Validation(
                    "at most one system message is allowed".to_string(),
                ));
            }
            system = Some(message.content.as_str());
        } else {
            rest.push(message);
        }
    }

    Ok((system, rest))
}
