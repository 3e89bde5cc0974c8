pub mod output;

use crate::orchestrator::AgentEvent;
use colored::*;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

/// Render advisory events on stderr until the sending side is dropped.
pub fn spawn_presenter(mut events: UnboundedReceiver<AgentEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            eprintln!("{}", format_event(&event));
        }
    })
}

pub fn format_event(event: &AgentEvent) -> String {
    match event {
        AgentEvent::Status { model } => {
            format!("… thinking (model={})", model).dimmed().to_string()
        }
        AgentEvent::ToolStart { name, args_preview } => {
            if args_preview.is_empty() {
                format!("{} {}", "→".cyan(), name.cyan().bold())
            } else {
                format!("{} {} {}", "→".cyan(), name.cyan().bold(), args_preview.dimmed())
            }
        }
        AgentEvent::ToolEnd {
            name,
            result_preview,
            is_error,
        } => {
            let first_line = result_preview.lines().next().unwrap_or_default();
            if *is_error {
                format!("{} {} {}", "✗".red(), name.red(), first_line.red())
            } else {
                format!("{} {} {}", "✓".green(), name.green(), first_line.dimmed())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_event_plain() {
        colored::control::set_override(false);

        let start = AgentEvent::ToolStart {
            name: "list_dir".to_string(),
            args_preview: "{\"path\": \".\"}".to_string(),
        };
        assert_eq!(format_event(&start), "→ list_dir {\"path\": \".\"}");

        let end = AgentEvent::ToolEnd {
            name: "list_dir".to_string(),
            result_preview: "Error: boom\nmore".to_string(),
            is_error: true,
        };
        assert_eq!(format_event(&end), "✗ list_dir Error: boom");
    }
}
