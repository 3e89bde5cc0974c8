use super::defaults::{default_mcp_command, default_mcp_context, default_timeout_secs};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How to launch the MCP tool server.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct McpConfig {
    pub command: String,
    /// Base arguments; the built-in server invocation is used when empty.
    pub args: Vec<String>,
    /// Values may reference `${VAR}`; expanded at launch.
    pub env: HashMap<String, String>,
    pub context: String,
    pub project_path: Option<String>,
    pub enable_web_dashboard: bool,
    pub enable_gui_log_window: bool,
    /// Per tool invocation; 0 disables the timeout.
    pub tool_timeout_secs: u64,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            command: default_mcp_command(),
            args: Vec::new(),
            env: HashMap::new(),
            context: default_mcp_context(),
            project_path: None,
            enable_web_dashboard: false,
            enable_gui_log_window: false,
            tool_timeout_secs: default_timeout_secs(),
        }
    }
}
