use once_cell::sync::Lazy;
use regex::Regex;

pub const ARGS_PREVIEW_CHARS: usize = 160;
pub const RESULT_PREVIEW_CHARS: usize = 200;

static THINK_TAG_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<think>.*?</think>").unwrap());

/// Wrap user input in the task envelope sent to the model.
pub fn wrap_user_task(user_text: &str) -> String {
    let trimmed = user_text.trim();
    if trimmed.is_empty() {
        return "<task></task>".to_string();
    }
    format!("<task>\n<request>\n{}\n</request>\n</task>", trimmed)
}

/// Remove `<think>...</think>` reasoning segments and trim what remains.
pub fn strip_think_tags(content: &str) -> String {
    if content.is_empty() {
        return String::new();
    }
    THINK_TAG_PATTERN.replace_all(content, "").trim().to_string()
}

/// Truncate to at most `max_chars` characters, appending `...` when cut.
pub fn truncate_preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        None => text.to_string(),
    }
}

/// Single-line preview of raw tool-call arguments.
pub fn format_tool_args(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let one_line = trimmed.replace(['\n', '\r'], " ");
    truncate_preview(&one_line, ARGS_PREVIEW_CHARS)
}
