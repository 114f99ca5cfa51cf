use std::sync::Arc;
use std::time::Instant;

use futures_util::StreamExt;
use serde::Serialize;

use crate::config::GenerationConfig;
use crate::dispatch::registry::Registry;
use crate::dispatch::{GenerateOptions, Message, TextStream, Usage};
use crate::error::CodesmithError;
use crate::parsers::{self, ParsedFile};
use crate::tools::generate::GenerateCodeRequest;

/// System prompt for both generation paths.
pub const SYSTEM_PROMPT: &str = "You are an expert web developer. Generate clean, modern, and functional code based on user requirements.

Rules:
1. Always provide complete, working code
2. Use modern best practices
3. Include proper HTML structure with DOCTYPE
4. Use semantic HTML5 elements
5. Include responsive CSS
6. Write clean, commented JavaScript
7. Format code blocks with language tags and filenames like: ```html // index.html
8. For web apps, always start with HTML structure
9. Make the UI visually appealing with good UX

Return code in markdown code blocks with filenames.";

#[derive(Debug, Clone, Serialize)]
pub struct GenerationMetadata {
    /// Model reported by the vendor.
    pub model: String,
    /// Provider the request was routed to.
    pub provider: String,
    pub usage: Option<Usage>,
    pub generation_time_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneratedCode {
    /// Raw completion text.
    pub code: String,
    pub files: Vec<ParsedFile>,
    pub explanation: Option<String>,
    pub metadata: GenerationMetadata,
}

/// Turns a prompt into generated code via whichever provider the request names.
pub struct Generator {
    registry: Arc<Registry>,
    max_tokens: u32,
    temperature: Option<f64>,
}

impl Generator {
    pub fn new(registry: Arc<Registry>, settings: &GenerationConfig) -> Self {
        Self {
            registry,
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// System prompt + user message (prompt, with context appended when given).
    pub fn build_messages(request: &GenerateCodeRequest) -> Vec<Message> {
        vec![
            Message::system(SYSTEM_PROMPT),
            Message::user(request.user_content()),
        ]
    }

    fn options(&self, request: &GenerateCodeRequest, stream: bool) -> GenerateOptions {
        GenerateOptions {
            model: request.model.clone(),
            max_tokens: Some(self.max_tokens),
            temperature: self.temperature,
            stream: Some(stream),
        }
    }

    fn provider_name(&self, request: &GenerateCodeRequest) -> String {
        request
            .provider
            .clone()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| self.registry.default_provider().to_string())
    }

    /// Buffered path: one vendor call, then split the completion into files.
    /// Any failure comes back as a single generation error; there is no
    /// partial result.
    pub async fn generate_code(
        &self,
        request: &GenerateCodeRequest,
    ) -> Result<GeneratedCode, CodesmithError> {
        let start = Instant::now();
        let provider_name = self.provider_name(request);

        let provider = self
            .registry
            .get_provider(Some(&provider_name))
            .map_err(CodesmithError::generation)?;

        let messages = Self::build_messages(request);
        let result = provider
            .generate(&messages, &self.options(request, false))
            .await
            .map_err(CodesmithError::generation)?;

        let generation_time_ms = start.elapsed().as_millis() as u64;
        let files = parsers::parse_generated_code(&result.content);
        let explanation = parsers::explanation(&result.content);

        tracing::info!(
            "generated {} file(s) with {provider_name}/{} in {generation_time_ms}ms",
            files.len(),
            result.model
        );

        Ok(GeneratedCode {
            files,
            explanation,
            metadata: GenerationMetadata {
                model: result.model,
                provider: provider_name,
                usage: result.usage,
                generation_time_ms,
            },
            code: result.content,
        })
    }

    /// Streaming path: raw fragments straight from the provider, no file
    /// parsing. Errors (before or during the stream) carry the stream prefix;
    /// a mid-stream error is the last item.
    pub async fn generate_code_stream(
        &self,
        request: &GenerateCodeRequest,
    ) -> Result<TextStream, CodesmithError> {
        let provider = self
            .registry
            .get_provider(request.provider.as_deref())
            .map_err(CodesmithError::stream)?;

        let messages = Self::build_messages(request);
        let fragments = provider
            .generate_stream(&messages, &self.options(request, true))
            .await
            .map_err(CodesmithError::stream)?;

        Ok(Box::pin(
            fragments.map(|item| item.map_err(CodesmithError::stream)),
        ))
    }
}

/// Drain a fragment stream into one string.
/// Returns the text and the number of fragments received.
pub async fn collect_stream(mut stream: TextStream) -> Result<(String, usize), CodesmithError> {
    let mut text = String::new();
    let mut count = 0;
    while let Some(fragment) = stream.next().await {
        text.push_str(&fragment?);
        count += 1;
    }
    Ok((text, count))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_without_context() {
        let messages = Generator::build_messages(&GenerateCodeRequest::new("a todo app"));
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], Message::system(SYSTEM_PROMPT));
        assert_eq!(messages[1], Message::user("a todo app"));
    }

    #[test]
    fn messages_with_context() {
        let request = GenerateCodeRequest {
            context: Some("use tailwind".to_string()),
            ..GenerateCodeRequest::new("a todo app")
        };
        let messages = Generator::build_messages(&request);
        assert_eq!(messages[1].content, "a todo app\n\nContext:\nuse tailwind");
    }

    #[test]
    fn blank_context_is_ignored() {
        let request = GenerateCodeRequest {
            context: Some("   ".to_string()),
            ..GenerateCodeRequest::new("p")
        };
        assert_eq!(request.user_content(), "p");
    }
}
