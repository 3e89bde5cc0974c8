pub mod client;
pub mod models;
pub mod response;

use crate::error::Result;
use crate::models::{Message, ToolCall, ToolChoice, ToolDefinition};
use async_trait::async_trait;

pub use client::ChatClient;
pub use models::RequestBody;

/// What the completion endpoint returned for one request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
}

impl Completion {
    pub fn text(content: &str) -> Self {
        Self {
            content: content.to_string(),
            ..Self::default()
        }
    }

    pub fn with_tool_calls(content: &str, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            content: content.to_string(),
            tool_calls,
        }
    }
}

/// Transport to a chat-completion endpoint.
///
/// `tool_choice` is ignored by implementations when `tools` is empty.
#[async_trait]
pub trait CompletionTransport: Send + Sync {
    async fn send(
        &self,
        model: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
        tool_choice: &ToolChoice,
    ) -> Result<Completion>;
}
