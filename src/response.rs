use rmcp::model::{CallToolResult, Content};
use serde::Serialize;

/// Tool response envelope. Every tool returns `Content::text(json_string)`
/// of this shape; the payload itself is JSON-encoded into `content`.
#[derive(Debug, Serialize)]
pub struct ToolResponse {
    pub status: &'static str,
    pub content: String,
    pub content_type: &'static str,
    pub metadata: ToolMetadata,
}

#[derive(Debug, Serialize)]
pub struct ToolMetadata {
    pub tool_name: String,
    pub model_used: String,
    pub provider_used: String,
    #[serde(serialize_with = "serialize_finite_f64")]
    pub duration_seconds: f64,
}

impl ToolMetadata {
    pub fn new(tool_name: &str, duration_seconds: f64) -> Self {
        Self {
            tool_name: tool_name.to_string(),
            model_used: "none".to_string(),
            provider_used: "none".to_string(),
            duration_seconds,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>, provider: impl Into<String>) -> Self {
        self.model_used = model.into();
        self.provider_used = provider.into();
        self
    }
}

/// Serialize f64, clamping non-finite values (NaN, Inf) to 0.0.
fn serialize_finite_f64<S: serde::Serializer>(v: &f64, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(if v.is_finite() { *v } else { 0.0 })
}

impl ToolResponse {
    pub fn success(content: String, metadata: ToolMetadata) -> Self {
        Self {
            status: "success",
            content,
            content_type: "text",
            metadata,
        }
    }

    /// Success with a structured payload serialized into `content`.
    pub fn json<T: Serialize>(payload: &T, metadata: ToolMetadata) -> Self {
        match serde_json::to_string(payload) {
            Ok(content) => Self {
                status: "success",
                content,
                content_type: "json",
                metadata,
            },
            Err(e) => Self::error(format!("serialization failed: {e}"), metadata),
        }
    }

    pub fn error(message: String, metadata: ToolMetadata) -> Self {
        Self {
            status: "error",
            content: message,
            content_type: "text",
            metadata,
        }
    }

    /// Convert to MCP CallToolResult.
    /// Always a transport-level success; failures are reported in the JSON
    /// payload (`"status": "error"`).
    pub fn into_call_tool_result(self) -> CallToolResult {
        match serde_json::to_string(&self) {
            Ok(json) => CallToolResult::success(vec![Content::text(json)]),
            Err(e) => {
                let escaped = e.to_string().replace('\\', "\\\\").replace('"', "\\\"");
                CallToolResult::success(vec![Content::text(format!(
                    r#"{{"status":"error","content":"serialization failed: {escaped}","content_type":"text","metadata":{{}}}}"#
                ))])
            }
        }
    }
}
