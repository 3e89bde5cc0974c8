use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, trace, warn};

use super::types::{InitializeResult, McpToolResult, ToolListResponse};
use super::ToolTransport;
use crate::error::{AgentError, Result};
use crate::models::ToolDefinition;

// MCP Protocol constants
const MCP_PROTOCOL_VERSION: &str = "2024-11-05";
const CLIENT_NAME: &str = env!("CARGO_PKG_NAME");
const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// MCP client speaking newline-delimited JSON-RPC over a child process's
/// stdio.
pub struct McpClient {
    command: String,
    args: Vec<String>,
    env: HashMap<String, String>,
    connection: Mutex<Option<McpConnection>>,
}

struct McpConnection {
    process: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    next_id: u64,
}

impl McpClient {
    pub fn new(command: &str, args: Vec<String>, env: HashMap<String, String>) -> Self {
        Self {
            command: command.to_string(),
            args,
            env,
            connection: Mutex::new(None),
        }
    }

    fn spawn(&self) -> Result<McpConnection> {
        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        // Values are never logged
        for (key, value) in &self.env {
            debug!(key = %key, "setting MCP server env var");
            cmd.env(key, value);
        }

        let mut process = cmd.spawn().map_err(|e| {
            AgentError::ToolTransport(format!(
                "failed to start MCP server '{}': {}",
                self.command, e
            ))
        })?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| AgentError::ToolTransport("MCP server stdin unavailable".into()))?;
        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| AgentError::ToolTransport("MCP server stdout unavailable".into()))?;

        Ok(McpConnection {
            process,
            stdin,
            stdout: BufReader::new(stdout).lines(),
            next_id: 1,
        })
    }

    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let mut guard = self.connection.lock().await;
        let connection = guard
            .as_mut()
            .ok_or_else(|| AgentError::ToolTransport("MCP server is not connected".into()))?;
        connection.send_request(method, params).await
    }
}

impl McpConnection {
    async fn write_message(&mut self, message: &Value) -> Result<()> {
        let line = serde_json::to_string(message)?;
        self.stdin
            .write_all(line.as_bytes())
            .await
            .map_err(transport_io)?;
        self.stdin.write_all(b"\n").await.map_err(transport_io)?;
        self.stdin.flush().await.map_err(transport_io)?;
        Ok(())
    }

    async fn send_request(&mut self, method: &str, params: Option<Value>) -> Result<Value> {
        let id = self.next_id;
        self.next_id += 1;

        let request = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params.unwrap_or(json!({}))
        });
        self.write_message(&request).await?;

        // Responses to abandoned (timed out) requests may still be in the
        // pipe; anything whose id does not match is skipped.
        while let Some(line) = self.stdout.next_line().await.map_err(transport_io)? {
            if line.trim().is_empty() {
                continue;
            }

            let message: Value = match serde_json::from_str(&line) {
                Ok(value) => value,
                Err(_) => {
                    trace!(line = %line, "ignoring non-JSON output from MCP server");
                    continue;
                }
            };

            if let Some(server_method) = message.get("method").and_then(|m| m.as_str()) {
                self.answer_server_message(server_method, &message).await?;
                continue;
            }

            if message.get("id") != Some(&json!(id)) {
                trace!(expected = id, "skipping unrelated MCP response");
                continue;
            }

            if let Some(result) = message.get("result") {
                return Ok(result.clone());
            }
            if let Some(error) = message.get("error") {
                return Err(AgentError::ToolTransport(format!(
                    "MCP error on '{}': {}",
                    method, error
                )));
            }
            return Err(AgentError::ToolTransport(format!(
                "MCP response to '{}' carried neither result nor error",
                method
            )));
        }

        Err(AgentError::ToolTransport(
            "MCP server closed the connection".to_string(),
        ))
    }

    async fn send_notification(&mut self, method: &str, params: Option<Value>) -> Result<()> {
        let notification = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params.unwrap_or(json!({}))
        });
        self.write_message(&notification).await
    }

    /// Server-to-client traffic: notifications are dropped, `ping` is
    /// answered, and any other request is refused.
    async fn answer_server_message(&mut self, method: &str, message: &Value) -> Result<()> {
        let Some(id) = message.get("id").cloned() else {
            trace!(method, "MCP notification");
            return Ok(());
        };

        let reply = if method == "ping" {
            json!({ "jsonrpc": "2.0", "id": id, "result": {} })
        } else {
            json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": { "code": -32601, "message": format!("method not supported: {}", method) }
            })
        };
        self.write_message(&reply).await
    }
}

fn transport_io(err: std::io::Error) -> AgentError {
    AgentError::ToolTransport(format!("MCP stdio failure: {}", err))
}

#[async_trait]
impl ToolTransport for McpClient {
    async fn connect(&self) -> Result<String> {
        let mut connection = self.spawn()?;

        let init_params = json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": CLIENT_NAME,
                "version": CLIENT_VERSION
            }
        });

        let response = connection
            .send_request("initialize", Some(init_params))
            .await
            .map_err(|e| AgentError::ToolTransport(format!("MCP initialization failed: {}", e)))?;
        let init_result: InitializeResult = serde_json::from_value(response)?;

        info!(
            server = %init_result.server_info.name,
            version = %init_result.server_info.version,
            protocol = %init_result.protocol_version,
            "connected to MCP server"
        );
        if init_result.capabilities.tools.is_none() {
            warn!("MCP server did not advertise the tools capability");
        }

        connection
            .send_notification("notifications/initialized", None)
            .await?;

        *self.connection.lock().await = Some(connection);

        Ok(init_result.instructions.unwrap_or_default())
    }

    async fn list_tools(&self) -> Result<Vec<ToolDefinition>> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let params = cursor.as_ref().map(|c| json!({ "cursor": c }));
            let response = self.request("tools/list", params).await?;
            let page: ToolListResponse = serde_json::from_value(response)?;

            for tool in page.tools {
                debug!(
                    tool = %tool.name,
                    description = tool.description.as_deref().unwrap_or(""),
                    "discovered MCP tool"
                );
                tools.push(ToolDefinition::from(tool));
            }

            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        Ok(tools)
    }

    async fn invoke(&self, name: &str, arguments: Map<String, Value>) -> Result<McpToolResult> {
        let params = json!({
            "name": name,
            "arguments": arguments,
        });

        let response = self
            .request("tools/call", Some(params))
            .await
            .map_err(|e| AgentError::ToolTransport(format!("failed to call tool {}: {}", name, e)))?;
        let result: McpToolResult = serde_json::from_value(response)?;
        Ok(result)
    }

    async fn close(&self) -> Result<()> {
        let Some(mut connection) = self.connection.lock().await.take() else {
            return Ok(());
        };

        // Closing stdin lets well-behaved servers exit on their own
        let _ = connection.stdin.shutdown().await;
        drop(connection.stdin);
        if let Err(e) = connection.process.kill().await {
            debug!(error = %e, "MCP server already exited");
        }
        Ok(())
    }
}
