//! Ordered conversation history.
//!
//! Index 0 always holds the active system prompt. It is set once when the
//! conversation is created and only changes through [`Conversation::replace`].

use crate::error::{AgentError, Result};
use crate::models::{Message, Role};

/// Characters per token for the context-usage estimate.
///
/// This is a crude, model-independent approximation. The compaction
/// threshold is tuned against it; change both together.
pub const APPROX_CHARS_PER_TOKEN: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    messages: Vec<Message>,
}

/// Derived context-usage figures. Never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConversationStats {
    pub message_count: usize,
    pub tool_call_count: usize,
    pub char_count: usize,
    pub approx_tokens: usize,
}

impl Conversation {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::system(system_prompt)],
        }
    }

    /// Rebuild a conversation from a system prompt and the messages that
    /// follow it.
    pub fn from_parts(system_prompt: impl Into<String>, tail: Vec<Message>) -> Self {
        let mut messages = Vec::with_capacity(tail.len() + 1);
        messages.push(Message::system(system_prompt));
        messages.extend(tail);
        Self { messages }
    }

    pub fn system_prompt(&self) -> &str {
        &self.messages[0].content
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Everything after the system prompt.
    pub fn tail(&self) -> &[Message] {
        &self.messages[1..]
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.len() <= 1
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Drop everything but the system prompt.
    pub fn reset(&mut self) {
        self.messages.truncate(1);
    }

    /// Shorten the history to `len` messages. The system prompt is never
    /// removed.
    pub fn truncate(&mut self, len: usize) {
        self.messages.truncate(len.max(1));
    }

    /// Replace the whole history. The first message must be a system message.
    pub fn replace(&mut self, messages: Vec<Message>) -> Result<()> {
        match messages.first() {
            Some(first) if first.role == Role::System => {
                self.messages = messages;
                Ok(())
            }
            Some(first) => Err(AgentError::InvalidHistory(format!(
                "first message must be a system prompt, got '{}'",
                first.role
            ))),
            None => Err(AgentError::InvalidHistory(
                "history cannot be empty".to_string(),
            )),
        }
    }

    /// Append extra context as a system message. Blank content is ignored.
    pub fn add_context(&mut self, label: &str, content: &str) {
        let content = content.trim();
        if content.is_empty() {
            return;
        }
        self.messages.push(Message::system(format!(
            "<context source={:?}>\n{}\n</context>",
            label, content
        )));
    }

    pub fn stats(&self) -> ConversationStats {
        let mut stats = ConversationStats {
            message_count: self.messages.len(),
            ..ConversationStats::default()
        };

        for message in &self.messages {
            stats.char_count += message.content.chars().count();
            stats.tool_call_count += message.tool_calls.len();
            for call in &message.tool_calls {
                stats.char_count += call.name.chars().count();
                stats.char_count += call.arguments.chars().count();
            }
        }

        stats.approx_tokens = stats.char_count / APPROX_CHARS_PER_TOKEN;
        stats
    }
}
