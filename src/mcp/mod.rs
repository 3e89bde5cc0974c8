pub mod client;
pub mod launch;
pub mod types;

use crate::error::Result;
use crate::models::ToolDefinition;
use async_trait::async_trait;
use serde_json::{Map, Value};

pub use client::McpClient;
pub use launch::{build_command_args, normalize_context};
pub use types::{McpToolResult, ResourceContents, ToolContent};

/// Tool-execution backend: a process that lists and runs tools.
#[async_trait]
pub trait ToolTransport: Send + Sync {
    /// Starts the backend and returns its instructions text (may be empty).
    async fn connect(&self) -> Result<String>;

    async fn list_tools(&self) -> Result<Vec<ToolDefinition>>;

    /// Runs one tool. `Err` means the transport itself failed; a tool that
    /// ran and reported failure comes back as `Ok` with `is_error` set.
    async fn invoke(&self, name: &str, arguments: Map<String, Value>) -> Result<McpToolResult>;

    async fn close(&self) -> Result<()>;
}
