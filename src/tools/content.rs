use crate::mcp::{McpToolResult, ToolContent};

/// Flatten a remote tool result into the text handed back to the model.
///
/// Text blocks are concatenated in order; anything else becomes a short
/// bracketed placeholder. An error-flagged result keeps its content but gains
/// a leading `Error: ` marker.
pub fn flatten_tool_result(result: &McpToolResult) -> String {
    let mut output = String::new();

    for block in &result.content {
        match block {
            ToolContent::Text { text } => output.push_str(text),
            ToolContent::Image { mime_type, .. } => {
                output.push_str(&format!("[Image: {}]", mime_type));
            }
            ToolContent::Resource { resource } => match &resource.text {
                Some(text) => output.push_str(text),
                None => output.push_str(&format!("[Resource: {}]", resource.uri)),
            },
            ToolContent::Unsupported => output.push_str("[Unsupported content]"),
        }
    }

    if result.is_error {
        format!("Error: {}", output)
    } else {
        output
    }
}
