//! Context compaction.
//!
//! Older history is rendered to a transcript, summarized by the model and
//! replaced by a single summary message. The caller archives the transcript
//! and persists the result; [`compact`] itself mutates nothing.

use crate::conversation::{Conversation, ConversationStats};
use crate::error::{AgentError, Result};
use crate::models::Message;
use async_trait::async_trait;

pub const DEFAULT_CONTEXT_BUDGET_TOKENS: usize = 200_000;
pub const DEFAULT_THRESHOLD: f64 = 0.9;
pub const DEFAULT_KEEP_RECENT: usize = 6;

pub const SUMMARY_INSTRUCTION: &str = "Summarize the conversation content into a concise, structured summary. \
Preserve key requirements, decisions, file paths, commands, and open questions. \
Use bullets where helpful.";

/// Produces a summary of a transcript.
#[async_trait]
pub trait Summarize: Send + Sync {
    async fn summarize(&self, transcript: &str) -> Result<String>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompactionPolicy {
    pub context_budget_tokens: usize,
    pub threshold: f64,
    pub keep_recent: usize,
}

impl Default for CompactionPolicy {
    fn default() -> Self {
        Self {
            context_budget_tokens: DEFAULT_CONTEXT_BUDGET_TOKENS,
            threshold: DEFAULT_THRESHOLD,
            keep_recent: DEFAULT_KEEP_RECENT,
        }
    }
}

impl CompactionPolicy {
    /// Token count at which compaction kicks in.
    pub fn limit(&self) -> usize {
        (self.context_budget_tokens as f64 * self.threshold) as usize
    }

    pub fn should_compact(&self, stats: &ConversationStats) -> bool {
        should_compact(stats, self.limit())
    }
}

pub fn should_compact(stats: &ConversationStats, limit: usize) -> bool {
    limit > 0 && stats.approx_tokens >= limit
}

/// Result of a successful compaction, not yet applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactionOutcome {
    /// System prompt, summary message, then the retained tail.
    pub messages: Vec<Message>,
    /// Rendered older segment, destined for the archive.
    pub transcript: String,
    pub summary: String,
}

/// Render messages as role-tagged blocks separated by blank lines.
pub fn build_transcript(messages: &[Message]) -> String {
    let mut out = String::new();
    for message in messages {
        out.push_str(&format!("[{}]\n", message.role));
        if !message.content.is_empty() {
            out.push_str(&message.content);
            out.push('\n');
        }
        for call in &message.tool_calls {
            out.push_str(&format!("tool_call: {} {}\n", call.name, call.arguments));
        }
        out.push('\n');
    }
    out.trim().to_string()
}

pub fn summary_message(summary: &str, archive_hint: &str) -> Message {
    Message::assistant(format!(
        "<summary>\n{}\n</summary>\n<archive>\n{}\nUse session_search to look up details.\n</archive>",
        summary.trim(),
        archive_hint
    ))
}

/// Summarize everything between the system prompt and the last
/// `policy.keep_recent` messages.
///
/// Refused with [`AgentError::NotEnoughHistory`] unless the conversation holds
/// at least `keep_recent + 2` messages.
pub async fn compact(
    conversation: &Conversation,
    summarizer: &dyn Summarize,
    policy: &CompactionPolicy,
    archive_hint: &str,
) -> Result<CompactionOutcome> {
    let messages = conversation.messages();
    let keep = policy.keep_recent;
    if messages.len() < keep + 2 {
        return Err(AgentError::NotEnoughHistory {
            needed: keep + 1,
            have: messages.len(),
        });
    }

    let split = messages.len() - keep;
    let older = &messages[1..split];
    let recent = &messages[split..];

    let transcript = build_transcript(older);
    if transcript.is_empty() {
        return Err(AgentError::NothingToCompact);
    }

    let summary = summarizer.summarize(&transcript).await?;

    let mut compacted = Vec::with_capacity(keep + 2);
    compacted.push(messages[0].clone());
    compacted.push(summary_message(&summary, archive_hint));
    compacted.extend_from_slice(recent);

    Ok(CompactionOutcome {
        messages: compacted,
        transcript,
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ToolCall;

    #[test]
    fn test_policy_limit() {
        let policy = CompactionPolicy::default();
        assert_eq!(policy.limit(), 180_000);

        let below = ConversationStats {
            approx_tokens: 179_999,
            ..Default::default()
        };
        let at = ConversationStats {
            approx_tokens: 180_000,
            ..Default::default()
        };
        assert!(!policy.should_compact(&below));
        assert!(policy.should_compact(&at));
        assert!(!should_compact(&at, 0));
    }

    #[test]
    fn test_build_transcript() {
        let messages = vec![
            Message::user("find the parser"),
            Message::assistant_with_tool_calls(
                "",
                vec![ToolCall::new("c1", "find_symbol", r#"{"name":"Parser"}"#)],
            ),
            Message::tool_result("c1", "src/parser.rs:10"),
        ];

        assert_eq!(
            build_transcript(&messages),
            "[user]\nfind the parser\n\n[assistant]\ntool_call: find_symbol {\"name\":\"Parser\"}\n\n[tool]\nsrc/parser.rs:10"
        );
    }

    #[test]
    fn test_summary_message() {
        let message = summary_message("  - decided X\n", "/tmp/a_archive.txt");
        assert_eq!(
            message.content,
            "<summary>\n- decided X\n</summary>\n<archive>\n/tmp/a_archive.txt\nUse session_search to look up details.\n</archive>"
        );
    }
}
