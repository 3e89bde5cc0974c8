use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by the agent core and its collaborators.
///
/// Tool failures that the model can react to are *not* represented here:
/// they are encoded into `tool` message content and the turn continues.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Tool transport error: {0}")]
    ToolTransport(String),

    #[error("{operation} timed out after {}s", .after.as_secs())]
    Timeout { operation: String, after: Duration },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Failed to parse arguments for tool '{tool}': {source}")]
    MalformedArguments {
        tool: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Not enough history to compact (need more than {needed} messages, have {have})")]
    NotEnoughHistory { needed: usize, have: usize },

    #[error("Nothing to compact")]
    NothingToCompact,

    #[error("Cannot delete active session '{0}'")]
    ActiveSessionDelete(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Unknown model: {0} (try /model to list)")]
    UnknownModel(String),

    #[error("Invalid conversation history: {0}")]
    InvalidHistory(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("{0}")]
    Other(String),
}

impl AgentError {
    /// Policy errors are reported to the caller synchronously and never
    /// leave partially-applied state behind.
    pub fn is_policy(&self) -> bool {
        matches!(
            self,
            AgentError::NotEnoughHistory { .. }
                | AgentError::NothingToCompact
                | AgentError::ActiveSessionDelete(_)
                | AgentError::SessionNotFound(_)
                | AgentError::UnknownModel(_)
        )
    }

    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            AgentError::Api { .. }
                | AgentError::Network(_)
                | AgentError::ToolTransport(_)
                | AgentError::Timeout { .. }
                | AgentError::Cancelled
        )
    }
}

impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        AgentError::Config(format!("{:#}", err))
    }
}

impl From<String> for AgentError {
    fn from(msg: String) -> Self {
        AgentError::Other(msg)
    }
}

impl From<&str> for AgentError {
    fn from(msg: &str) -> Self {
        AgentError::Other(msg.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AgentError>;
