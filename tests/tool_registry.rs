use mcpilot::mcp::McpToolResult;
use mcpilot::models::ToolDefinition;
use mcpilot::tools::{
    flatten_tool_result, local_handler, session_search_definition, session_search_handler,
    validate_arguments, ActiveArchive, ToolKind, ToolRegistry, SESSION_SEARCH_TOOL,
};
use serde_json::{json, Value};
use std::fs;
use tempfile::TempDir;

fn remote(name: &str) -> ToolDefinition {
    ToolDefinition::new(name, "remote tool", json!({"type": "object"}))
}

fn echo_handler() -> mcpilot::tools::LocalHandler {
    local_handler(|args: Value| async move { Ok(args.to_string()) })
}

#[test]
fn test_registry_keeps_registration_order() {
    let mut registry = ToolRegistry::new();
    registry.register_remote(vec![remote("b"), remote("a"), remote("c")]);

    let names: Vec<String> = registry.advertise().into_iter().map(|t| t.name).collect();
    assert_eq!(names, vec!["b", "a", "c"]);
    assert_eq!(registry.len(), 3);
    assert!(registry.resolve("a").is_some());
    assert!(registry.resolve("missing").is_none());
}

#[test]
fn test_local_tool_wins_over_remote() {
    let mut registry = ToolRegistry::new();
    registry.register_remote(vec![remote("search"), remote("list_dir")]);
    registry.register_local(
        ToolDefinition::new("search", "local search", json!({"type": "object"})),
        echo_handler(),
    );
    // Rediscovery must not displace the local handler
    registry.register_remote(vec![remote("search")]);

    let tool = registry.resolve("search").unwrap();
    assert!(matches!(tool.kind, ToolKind::Local(_)));
    assert_eq!(tool.definition.description, "local search");
    assert_eq!(registry.names().to_vec(), vec!["search", "list_dir"]);
}

#[tokio::test]
async fn test_local_handler_runs() {
    let handler = echo_handler();
    let output = handler(json!({"a": 1})).await.unwrap();
    assert_eq!(output, r#"{"a":1}"#);
}

#[test]
fn test_validate_arguments() {
    let definition = session_search_definition();

    assert!(validate_arguments(&definition, &json!({"query": "parser"})).is_ok());

    let missing = validate_arguments(&definition, &json!({})).unwrap_err();
    assert!(missing.contains("query"));

    let wrong_type = validate_arguments(&definition, &json!({"query": 5})).unwrap_err();
    assert!(wrong_type.contains("/query"));
}

#[tokio::test]
async fn test_session_search_follows_active_archive() {
    let temp_dir = TempDir::new().unwrap();
    let first = temp_dir.path().join("first_archive.txt");
    let second = temp_dir.path().join("second_archive.txt");
    fs::write(&first, "[user]\nFix the Parser\n[assistant]\nparser fixed\n").unwrap();
    fs::write(&second, "nothing relevant\n").unwrap();

    let archive = ActiveArchive::new(Some(first));
    let handler = session_search_handler(archive.clone());
    assert_eq!(session_search_definition().name, SESSION_SEARCH_TOOL);

    let output = handler(json!({"query": "PARSER"})).await.unwrap();
    assert_eq!(output, "2: Fix the Parser\n4: parser fixed");

    let output = handler(json!({"query": "parser", "max_results": "1"}))
        .await
        .unwrap();
    assert_eq!(output, "2: Fix the Parser");

    archive.set(Some(second));
    let output = handler(json!({"query": "parser"})).await.unwrap();
    assert_eq!(output, "No matches found in session archive.");

    archive.set(None);
    let output = handler(json!({"query": "parser"})).await.unwrap();
    assert_eq!(output, "No archive file for this session.");
}

#[test]
fn test_flatten_wire_result() {
    let result: McpToolResult = serde_json::from_value(json!({
        "content": [
            { "type": "text", "text": "Found 2 files" },
            { "type": "image", "data": "aGk=", "mimeType": "image/png" },
            { "type": "audio", "data": "..." }
        ],
        "isError": false
    }))
    .unwrap();
    assert_eq!(
        flatten_tool_result(&result),
        "Found 2 files[Image: image/png][Unsupported content]"
    );

    let failed: McpToolResult = serde_json::from_value(json!({
        "content": [{ "type": "text", "text": "no such file" }],
        "isError": true
    }))
    .unwrap();
    assert_eq!(flatten_tool_result(&failed), "Error: no such file");

    let empty: McpToolResult = serde_json::from_value(json!({})).unwrap();
    assert_eq!(flatten_tool_result(&empty), "");
}
