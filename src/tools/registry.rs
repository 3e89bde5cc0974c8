use crate::models::ToolDefinition;
use futures::future::BoxFuture;
use jsonschema::{Draft, JSONSchema};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

/// Handler for a tool implemented in-process. Receives the parsed argument
/// object and returns the result text, or an error message for the model.
pub type LocalHandler =
    Arc<dyn Fn(Value) -> BoxFuture<'static, std::result::Result<String, String>> + Send + Sync>;

/// Wrap an async closure as a [`LocalHandler`].
pub fn local_handler<F, Fut>(handler: F) -> LocalHandler
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<String, String>> + Send + 'static,
{
    Arc::new(move |args| Box::pin(handler(args)))
}

#[derive(Clone)]
pub enum ToolKind {
    Local(LocalHandler),
    Remote,
}

#[derive(Clone)]
pub struct RegisteredTool {
    pub definition: ToolDefinition,
    pub kind: ToolKind,
}

impl RegisteredTool {
    pub fn is_local(&self) -> bool {
        matches!(self.kind, ToolKind::Local(_))
    }
}

impl std::fmt::Debug for RegisteredTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredTool")
            .field("name", &self.definition.name)
            .field("local", &self.is_local())
            .finish()
    }
}

/// Name-keyed tool table that remembers first-registration order.
///
/// Registering a name that already exists replaces its entry in place, so a
/// local tool registered after discovery shadows the remote tool of the same
/// name without changing where it is advertised.
#[derive(Debug, Default, Clone)]
pub struct ToolRegistry {
    order: Vec<String>,
    tools: HashMap<String, RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, tool: RegisteredTool) {
        let name = tool.definition.name.clone();
        if self.tools.insert(name.clone(), tool).is_none() {
            self.order.push(name);
        }
    }

    /// Add discovered tools. A name already held by a local tool keeps the
    /// local handler.
    pub fn register_remote(&mut self, definitions: impl IntoIterator<Item = ToolDefinition>) {
        for definition in definitions {
            if self.tools.get(&definition.name).is_some_and(|t| t.is_local()) {
                debug!(tool = %definition.name, "remote tool shadowed by local tool");
                continue;
            }
            self.insert(RegisteredTool {
                definition,
                kind: ToolKind::Remote,
            });
        }
    }

    pub fn register_local(&mut self, definition: ToolDefinition, handler: LocalHandler) {
        self.insert(RegisteredTool {
            definition,
            kind: ToolKind::Local(handler),
        });
    }

    pub fn resolve(&self, name: &str) -> Option<&RegisteredTool> {
        self.tools.get(name)
    }

    /// Tool definitions in registration order.
    pub fn advertise(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| tool.definition.clone())
            .collect()
    }

    pub fn names(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Check arguments against a tool's JSON schema (draft 7).
pub fn validate_arguments(definition: &ToolDefinition, arguments: &Value) -> Result<(), String> {
    let schema = JSONSchema::options()
        .with_draft(Draft::Draft7)
        .compile(&definition.parameters)
        .map_err(|e| format!("Invalid tool schema: {}", e))?;

    if let Err(errors) = schema.validate(arguments) {
        let error_messages: Vec<String> = errors
            .map(|e| format!("{}: {}", e.instance_path, e))
            .collect();
        return Err(error_messages.join("; "));
    }

    Ok(())
}
