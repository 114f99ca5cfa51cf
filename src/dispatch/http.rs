use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::config::GenerationConfig;
use crate::error::CodesmithError;

pub const MAX_RESPONSE_BYTES: usize = 2 * 1024 * 1024; // 2MB

/// Build the process-wide HTTP client shared by every adapter.
/// The client owns the connection pool; adapters hold cheap clones.
pub fn build_client(settings: &GenerationConfig) -> Result<Client, CodesmithError> {
    let client = Client::builder()
        .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
        .timeout(Duration::from_secs(settings.request_timeout_secs))
        .pool_idle_timeout(Duration::from_secs(90))
        .pool_max_idle_per_host(4)
        .build()?;
    Ok(client)
}

/// Vendor error envelope: `{"error": {"message": "..."}}` (OpenAI, OpenRouter, Anthropic).
#[derive(Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorBody>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Pull the vendor's own message out of an error body, if it has one.
pub fn vendor_error_message(body: &[u8]) -> Option<String> {
    serde_json::from_slice::<ErrorEnvelope>(body)
        .ok()
        .and_then(|e| e.error)
        .and_then(|e| e.message)
        .filter(|m| !m.trim().is_empty())
}

/// Send a request and fail on any non-success status.
///
/// Error messages read `"{label} API error: {vendor message}"`, falling back
/// to the HTTP status text when the body carries no message.
pub async fn send(
    request: RequestBuilder,
    provider: &str,
    label: &str,
) -> Result<Response, CodesmithError> {
    let response = request.send().await?;
    let status = response.status();

    if status.is_success() {
        return Ok(response);
    }

    // Cap error body reads to MAX_RESPONSE_BYTES to prevent memory exhaustion
    let error_bytes = response.bytes().await.unwrap_or_default();
    let truncated = &error_bytes[..error_bytes.len().min(MAX_RESPONSE_BYTES)];
    let detail = vendor_error_message(truncated).unwrap_or_else(|| {
        status
            .canonical_reason()
            .map(str::to_string)
            .unwrap_or_else(|| status.to_string())
    });

    tracing::debug!("{provider} returned {status}: {detail}");

    Err(CodesmithError::Upstream {
        provider: provider.to_string(),
        message: format!("{label} API error: {detail}"),
        status: Some(status.as_u16()),
    })
}

/// Read a successful response body (size-capped) and decode it as JSON.
pub async fn read_json<T: DeserializeOwned>(
    response: Response,
    provider: &str,
) -> Result<T, CodesmithError> {
    if let Some(len) = response.content_length()
        && len as usize > MAX_RESPONSE_BYTES
    {
        return Err(too_large(provider, len as usize));
    }

    let bytes = response.bytes().await.map_err(|e| CodesmithError::Upstream {
        provider: provider.to_string(),
        message: format!("failed to read response body: {e}"),
        status: None,
    })?;

    if bytes.len() > MAX_RESPONSE_BYTES {
        return Err(too_large(provider, bytes.len()));
    }

    serde_json::from_slice(&bytes).map_err(|e| {
        CodesmithError::SchemaParse(format!("failed to parse {provider} response: {e}"))
    })
}

fn too_large(provider: &str, len: usize) -> CodesmithError {
    CodesmithError::Upstream {
        provider: provider.to_string(),
        message: format!("response too large: {len} bytes (max {MAX_RESPONSE_BYTES})"),
        status: None,
    }
}

/// Join a base URL and a path without doubling the slash.
pub fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}
