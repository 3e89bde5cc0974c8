use crate::conversation::Conversation;
use crate::models::Message;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_SESSION_NAME: &str = "default";

/// Persisted form of a conversation.
///
/// `messages` excludes the system prompt, which is stored separately in
/// `system_prompt`. `archive_file` and `summary_file` are file names relative
/// to the session directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub name: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_file: Option<String>,
}

impl SessionRecord {
    /// Fresh record with side-file names derived from the sanitized name.
    pub fn new(name: &str, model: &str, system_prompt: &str) -> Self {
        let name = sanitize_name(name);
        Self {
            archive_file: Some(archive_file_name(&name)),
            summary_file: Some(summary_file_name(&name)),
            name,
            created_at: None,
            updated_at: None,
            model: model.to_string(),
            system_prompt: system_prompt.to_string(),
            messages: Vec::new(),
        }
    }

    /// Snapshot the conversation into this record.
    pub fn update_from(&mut self, conversation: &Conversation, model: &str) {
        self.model = model.to_string();
        self.system_prompt = conversation.system_prompt().to_string();
        self.messages = conversation.tail().to_vec();
    }

    /// Rebuild a conversation. The stored system prompt is used when present,
    /// otherwise `fallback_prompt`.
    pub fn to_conversation(&self, fallback_prompt: &str) -> Conversation {
        let prompt = if self.system_prompt.trim().is_empty() {
            fallback_prompt
        } else {
            &self.system_prompt
        };
        Conversation::from_parts(prompt, self.messages.clone())
    }
}

pub fn archive_file_name(slug: &str) -> String {
    format!("{}_archive.txt", slug)
}

pub fn summary_file_name(slug: &str) -> String {
    format!("{}_summary.md", slug)
}

/// Reduce a session name to a lowercase filesystem-safe slug.
///
/// Spaces become `-`; anything other than `a-z`, `0-9`, `-`, `_` and `.` is
/// dropped. An empty result falls back to `default`.
pub fn sanitize_name(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return DEFAULT_SESSION_NAME.to_string();
    }

    let slug: String = trimmed
        .to_lowercase()
        .replace(' ', "-")
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '_' | '.'))
        .collect();

    if slug.is_empty() {
        DEFAULT_SESSION_NAME.to_string()
    } else {
        slug
    }
}
