use super::registry::{local_handler, LocalHandler};
use crate::models::ToolDefinition;
use serde_json::{json, Value};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

pub const SESSION_SEARCH_TOOL: &str = "session_search";
pub const DEFAULT_MAX_RESULTS: usize = 10;

/// Archive file of whichever session is currently active.
///
/// Shared between the session manager (which repoints it on switch) and the
/// `session_search` handler.
#[derive(Debug, Clone, Default)]
pub struct ActiveArchive(Arc<RwLock<Option<PathBuf>>>);

impl ActiveArchive {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self(Arc::new(RwLock::new(path)))
    }

    pub fn set(&self, path: Option<PathBuf>) {
        if let Ok(mut guard) = self.0.write() {
            *guard = path;
        }
    }

    pub fn get(&self) -> Option<PathBuf> {
        self.0.read().ok().and_then(|guard| guard.clone())
    }
}

pub fn session_search_definition() -> ToolDefinition {
    ToolDefinition::new(
        SESSION_SEARCH_TOOL,
        "Searches the compacted session archive for a query and returns matching lines.",
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Substring to search for in the session archive."
                },
                "max_results": {
                    "type": "integer",
                    "description": "Maximum number of matching lines to return."
                }
            },
            "required": ["query"]
        }),
    )
}

pub fn session_search_handler(archive: ActiveArchive) -> LocalHandler {
    local_handler(move |args: Value| {
        let archive = archive.clone();
        async move {
            let query = args
                .get("query")
                .and_then(|q| q.as_str())
                .unwrap_or_default()
                .to_string();
            let max_results = parse_max_results(args.get("max_results"));
            search_archive(archive.get().as_deref(), &query, max_results)
                .await
                .map_err(|e| format!("archive search failed: {}", e))
        }
    })
}

fn parse_max_results(raw: Option<&Value>) -> usize {
    let parsed = match raw {
        Some(Value::Number(n)) => n.as_f64().map(|f| f as i64),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    match parsed {
        Some(n) if n > 0 => n as usize,
        _ => DEFAULT_MAX_RESULTS,
    }
}

/// Case-insensitive line search. Matches are rendered as `<line_no>: <line>`.
pub async fn search_archive(
    path: Option<&Path>,
    query: &str,
    max_results: usize,
) -> std::io::Result<String> {
    let Some(path) = path else {
        return Ok("No archive file for this session.".to_string());
    };

    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Ok("No archive content yet.".to_string());
        }
        Err(e) => return Err(e),
    };

    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return Ok("Query is empty.".to_string());
    }
    let limit = if max_results == 0 {
        DEFAULT_MAX_RESULTS
    } else {
        max_results
    };

    let matches: Vec<String> = contents
        .lines()
        .enumerate()
        .filter(|(_, line)| line.to_lowercase().contains(&needle))
        .take(limit)
        .map(|(idx, line)| format!("{}: {}", idx + 1, line))
        .collect();

    if matches.is_empty() {
        return Ok("No matches found in session archive.".to_string());
    }
    Ok(matches.join("\n"))
}
