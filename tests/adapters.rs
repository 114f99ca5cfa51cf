//! Buffered (non-streaming) vendor calls against raw TCP mock vendors.

use codesmith::config::{Config, ProviderConfig};
use codesmith::dispatch::anthropic::AnthropicProvider;
use codesmith::dispatch::http::build_client;
use codesmith::dispatch::openai::OpenAiProvider;
use codesmith::dispatch::openrouter::OpenRouterProvider;
use codesmith::dispatch::{GenerateOptions, Message, Provider, Usage};
use codesmith::error::CodesmithError;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

async fn mock_listener() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

async fn read_request(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        let text = String::from_utf8_lossy(&buf);
        if let Some(end) = text.find("\r\n\r\n") {
            let content_length = text[..end]
                .lines()
                .find_map(|l| {
                    let (name, value) = l.split_once(':')?;
                    if name.eq_ignore_ascii_case("content-length") {
                        value.trim().parse::<usize>().ok()
                    } else {
                        None
                    }
                })
                .unwrap_or(0);
            if buf.len() >= end + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).to_string()
}

fn http_response(status_line: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    )
}

/// Serve exactly one request with a canned response; yields the request text.
fn serve_once(
    listener: TcpListener,
    status_line: &'static str,
    body: String,
) -> tokio::task::JoinHandle<String> {
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = read_request(&mut socket).await;
        socket
            .write_all(http_response(status_line, &body).as_bytes())
            .await
            .unwrap();
        request
    })
}

fn mock_config(name: &str, port: u16) -> ProviderConfig {
    let mut config = Config::default().providers[name].clone();
    config.api_key = "sk-test".to_string();
    config.base_url = format!("http://127.0.0.1:{port}/v1");
    config
}

fn client() -> reqwest::Client {
    build_client(&Config::default().generation).unwrap()
}

fn messages() -> Vec<Message> {
    vec![Message::system("sys"), Message::user("make a page")]
}

fn request_body(request: &str) -> serde_json::Value {
    let body = &request[request.find("\r\n\r\n").unwrap() + 4..];
    serde_json::from_str(body).unwrap()
}

// ---------------------------------------------------------------------------
// OpenAI-compatible
// ---------------------------------------------------------------------------

#[tokio::test]
async fn openai_generate_returns_content_model_and_usage() {
    let (listener, port) = mock_listener().await;
    let body = serde_json::json!({
        "model": "gpt-4-0125-preview",
        "choices": [{"message": {"role": "assistant", "content": "<html></html>"}}],
        "usage": {"prompt_tokens": 12, "completion_tokens": 34, "total_tokens": 46}
    });
    let server = serve_once(listener, "200 OK", body.to_string());

    let provider = OpenAiProvider::new("openai", &mock_config("openai", port), client());
    let result = provider
        .generate(&messages(), &GenerateOptions::default())
        .await
        .unwrap();

    assert_eq!(result.content, "<html></html>");
    assert_eq!(result.model, "gpt-4-0125-preview");
    assert_eq!(
        result.usage,
        Some(Usage {
            input_tokens: 12,
            output_tokens: 34
        })
    );

    let request = server.await.unwrap();
    let sent = request_body(&request);
    assert_eq!(sent["model"], "gpt-4-turbo-preview");
    assert_eq!(sent["max_tokens"], 4096);
    assert_eq!(sent["temperature"], 0.7);
    assert!(sent.get("stream").is_none());
    assert_eq!(sent["messages"][0]["role"], "system");
    assert_eq!(sent["messages"][1]["content"], "make a page");
}

#[tokio::test]
async fn openai_generate_honours_options() {
    let (listener, port) = mock_listener().await;
    let body = serde_json::json!({
        "choices": [{"message": {"content": "ok"}}]
    });
    let server = serve_once(listener, "200 OK", body.to_string());

    let provider = OpenAiProvider::new("openai", &mock_config("openai", port), client());
    let options = GenerateOptions {
        model: Some("gpt-4".to_string()),
        max_tokens: Some(500),
        temperature: Some(0.2),
        stream: Some(false),
    };
    let result = provider.generate(&messages(), &options).await.unwrap();

    // No model echoed and no usage reported
    assert_eq!(result.model, "gpt-4");
    assert_eq!(result.usage, None);

    let sent = request_body(&server.await.unwrap());
    assert_eq!(sent["model"], "gpt-4");
    assert_eq!(sent["max_tokens"], 500);
    assert_eq!(sent["temperature"], 0.2);
}

#[tokio::test]
async fn openai_error_status_uses_vendor_message() {
    let (listener, port) = mock_listener().await;
    let body = r#"{"error":{"message":"The model `gpt-9` does not exist","type":"invalid_request_error"}}"#;
    let server = serve_once(listener, "404 Not Found", body.to_string());

    let provider = OpenAiProvider::new("openai", &mock_config("openai", port), client());
    let err = provider
        .generate(&messages(), &GenerateOptions::default())
        .await
        .unwrap_err();

    match err {
        CodesmithError::Upstream {
            provider,
            message,
            status,
        } => {
            assert_eq!(provider, "openai");
            assert_eq!(message, "OpenAI API error: The model `gpt-9` does not exist");
            assert_eq!(status, Some(404));
        }
        other => panic!("expected Upstream, got {other:?}"),
    }
    server.await.unwrap();
}

#[tokio::test]
async fn openai_error_without_body_falls_back_to_status_text() {
    let (listener, port) = mock_listener().await;
    let server = serve_once(listener, "500 Internal Server Error", "<html>oops</html>".into());

    let provider = OpenAiProvider::new("openai", &mock_config("openai", port), client());
    let err = provider
        .generate(&messages(), &GenerateOptions::default())
        .await
        .unwrap_err();

    assert_eq!(err.user_message(), "OpenAI API error: Internal Server Error");
    server.await.unwrap();
}

#[tokio::test]
async fn openai_empty_choices_is_an_error() {
    let (listener, port) = mock_listener().await;
    let server = serve_once(listener, "200 OK", r#"{"choices":[]}"#.to_string());

    let provider = OpenAiProvider::new("openai", &mock_config("openai", port), client());
    let err = provider
        .generate(&messages(), &GenerateOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, CodesmithError::Upstream { .. }));
    server.await.unwrap();
}

#[tokio::test]
async fn malformed_json_is_schema_parse_error() {
    let (listener, port) = mock_listener().await;
    let server = serve_once(listener, "200 OK", "{not json".to_string());

    let provider = OpenAiProvider::new("openai", &mock_config("openai", port), client());
    let err = provider
        .generate(&messages(), &GenerateOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, CodesmithError::SchemaParse(_)));
    assert_eq!(err.user_message(), "failed to parse provider response");
    server.await.unwrap();
}

// ---------------------------------------------------------------------------
// OpenRouter
// ---------------------------------------------------------------------------

#[tokio::test]
async fn openrouter_sends_explicit_stream_false() {
    let (listener, port) = mock_listener().await;
    let body = serde_json::json!({
        "model": "anthropic/claude-3.5-sonnet",
        "choices": [{"message": {"content": "hi"}}]
    });
    let server = serve_once(listener, "200 OK", body.to_string());

    let config = Config::default();
    let provider = OpenRouterProvider::new(
        "openrouter",
        &mock_config("openrouter", port),
        client(),
        &config.app,
    );
    let result = provider
        .generate(&messages(), &GenerateOptions::default())
        .await
        .unwrap();
    assert_eq!(result.content, "hi");

    let request = server.await.unwrap();
    let lower = request.to_lowercase();
    assert!(lower.contains("http-referer: http://localhost:3000"));
    assert!(lower.contains("x-title: ai code generator"));
    assert_eq!(request_body(&request)["stream"], false);
}

// ---------------------------------------------------------------------------
// Anthropic
// ---------------------------------------------------------------------------

#[tokio::test]
async fn anthropic_generate_reads_first_text_block() {
    let (listener, port) = mock_listener().await;
    let body = serde_json::json!({
        "id": "msg_01",
        "type": "message",
        "model": "claude-sonnet-4-20250514",
        "content": [{"type": "text", "text": "```html\n<p>hi</p>\n```"}],
        "usage": {"input_tokens": 5, "output_tokens": 9}
    });
    let server = serve_once(listener, "200 OK", body.to_string());

    let provider = AnthropicProvider::new("anthropic", &mock_config("anthropic", port), client());
    let result = provider
        .generate(&messages(), &GenerateOptions::default())
        .await
        .unwrap();

    assert_eq!(result.content, "```html\n<p>hi</p>\n```");
    assert_eq!(result.model, "claude-sonnet-4-20250514");
    assert_eq!(
        result.usage,
        Some(Usage {
            input_tokens: 5,
            output_tokens: 9
        })
    );

    let request = server.await.unwrap();
    assert!(request.to_lowercase().contains("x-api-key: sk-test"));
    let sent = request_body(&request);
    assert_eq!(sent["system"], "sys");
    assert_eq!(sent["messages"].as_array().unwrap().len(), 1);
    assert_eq!(sent["max_tokens"], 4096);
}

#[tokio::test]
async fn anthropic_non_text_block_is_rejected() {
    let (listener, port) = mock_listener().await;
    let body = serde_json::json!({
        "content": [{"type": "tool_use", "id": "t1", "name": "x", "input": {}}]
    });
    let server = serve_once(listener, "200 OK", body.to_string());

    let provider = AnthropicProvider::new("anthropic", &mock_config("anthropic", port), client());
    let err = provider
        .generate(&messages(), &GenerateOptions::default())
        .await
        .unwrap_err();

    assert_eq!(err.user_message(), "Unexpected response type from Anthropic");
    server.await.unwrap();
}

#[tokio::test]
async fn anthropic_error_status_uses_vendor_message() {
    let (listener, port) = mock_listener().await;
    let body = r#"{"type":"error","error":{"type":"authentication_error","message":"invalid x-api-key"}}"#;
    let server = serve_once(listener, "401 Unauthorized", body.to_string());

    let provider = AnthropicProvider::new("anthropic", &mock_config("anthropic", port), client());
    let err = provider
        .generate(&messages(), &GenerateOptions::default())
        .await
        .unwrap_err();

    assert_eq!(err.user_message(), "Anthropic API error: invalid x-api-key");
    assert_eq!(err.provider(), Some("anthropic"));
    server.await.unwrap();
}
