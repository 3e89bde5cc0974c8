use crate::conversation::ConversationStats;
use crate::session::SessionRecord;
use chrono::Local;
use colored::*;
use std::path::Path;

/// Display the assistant's final answer
pub fn display_response(content: &str) {
    println!("{}", content.trim_end());
}

pub fn display_error(message: &str) {
    eprintln!("{} {}", "Error:".red().bold(), message);
}

pub fn display_notice(message: &str) {
    println!("{}", message.yellow());
}

pub fn display_models(models: &[String], current: &str) {
    println!("Available models:");
    for (i, model) in models.iter().enumerate() {
        let marker = if model == current { "*" } else { " " };
        println!("{} {}) {}", marker, i + 1, model);
    }
    println!("Current: {}", current.bold());
    println!("Use /model <number|name> to switch.");
}

pub fn display_sessions(sessions: &[SessionRecord], active: &str) {
    if sessions.is_empty() {
        println!("No sessions found.");
        return;
    }
    println!("Sessions:");
    for session in sessions {
        let marker = if session.name == active { "*" } else { " " };
        println!(
            "{} {} (updated {})",
            marker,
            session.name,
            format_timestamp(session.updated_at)
        );
    }
}

pub fn display_session_info(record: &SessionRecord, archive: &Path, summary: &Path) {
    println!("Session: {}", record.name.bold());
    println!("Model: {}", record.model);
    println!("Messages: {}", record.messages.len());
    println!("Updated: {}", format_timestamp(record.updated_at));
    println!("Archive: {}", archive.display());
    println!("Summary: {}", summary.display());
}

pub fn display_stats(stats: &ConversationStats, limit: usize) {
    let percent = if limit == 0 {
        0.0
    } else {
        stats.approx_tokens as f64 * 100.0 / limit as f64
    };
    println!(
        "Messages: {}  Tool calls: {}  Chars: {}",
        stats.message_count, stats.tool_call_count, stats.char_count
    );
    println!(
        "Approx tokens: {} / {} ({:.1}% of compaction threshold)",
        stats.approx_tokens, limit, percent
    );
}

fn format_timestamp(timestamp: Option<chrono::DateTime<chrono::Utc>>) -> String {
    timestamp
        .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "never".to_string())
}
