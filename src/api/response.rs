use crate::api::models::WireToolCall;
use crate::api::Completion;
use crate::error::{AgentError, Result};
use crate::models::ToolCall;
use serde_json::Value;

fn first_message(response_json: &Value) -> Result<&Value> {
    let choices = response_json
        .get("choices")
        .and_then(|c| c.as_array())
        .ok_or_else(|| AgentError::Other("No choices in response".to_string()))?;

    let first_choice = choices
        .first()
        .ok_or_else(|| AgentError::Other("Empty choices array".to_string()))?;

    first_choice
        .get("message")
        .ok_or_else(|| AgentError::Other("No message in response".to_string()))
}

/// Parse a non-streaming API response and extract tool calls if present
pub fn parse_tool_calls(response_json: &Value) -> Result<Vec<ToolCall>> {
    let message = first_message(response_json)?;

    let Some(raw_calls) = message.get("tool_calls").and_then(|tc| tc.as_array()) else {
        return Ok(Vec::new());
    };

    raw_calls
        .iter()
        .map(|raw| {
            serde_json::from_value::<WireToolCall>(raw.clone())
                .map(ToolCall::from)
                .map_err(|e| AgentError::Other(format!("Malformed tool call in response: {}", e)))
        })
        .collect()
}

/// Extract content from a non-streaming response
pub fn extract_content(response_json: &Value) -> Result<Option<String>> {
    let message = first_message(response_json)?;
    Ok(message
        .get("content")
        .and_then(|c| c.as_str())
        .map(|s| s.to_string()))
}

pub fn parse_completion(response_json: &Value) -> Result<Completion> {
    Ok(Completion {
        content: extract_content(response_json)?.unwrap_or_default(),
        tool_calls: parse_tool_calls(response_json)?,
    })
}

/// Condense a provider error body into one line.
///
/// Understands the common `{"error": {"message", "type", "param", "code"}}`
/// shape and falls back to the raw body.
pub fn format_api_error(status: u16, body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let Some(error) = parsed.as_ref().and_then(|v| v.get("error")) else {
        let trimmed = body.trim();
        return if trimmed.is_empty() {
            format!("status {}: empty error response from provider", status)
        } else {
            format!("status {}: {}", status, trimmed)
        };
    };

    if let Some(text) = error.as_str() {
        return format!("status {}: {}", status, text);
    }

    let mut parts = vec![format!("status {}", status)];
    if let Some(message) = error.get("message").and_then(|v| v.as_str()) {
        parts.push(message.to_string());
    }
    if let Some(kind) = error.get("type").and_then(|v| v.as_str()) {
        parts.push(format!("type={}", kind));
    }
    if let Some(param) = error.get("param").and_then(|v| v.as_str()) {
        if !param.is_empty() {
            parts.push(format!("param={}", param));
        }
    }
    match error.get("code") {
        Some(Value::Null) | None => {}
        Some(Value::String(code)) => parts.push(format!("code={}", code)),
        Some(code) => parts.push(format!("code={}", code)),
    }
    parts.join(", ")
}
