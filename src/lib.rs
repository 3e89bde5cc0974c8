//! mcpilot: a conversational coding agent that drives an MCP tool server
//! through an OpenAI-compatible chat-completion endpoint.

pub mod api;
pub mod cli;
pub mod commands;
pub mod compaction;
pub mod config;
pub mod conversation;
pub mod error;
pub mod logging;
pub mod mcp;
pub mod models;
pub mod orchestrator;
pub mod repl;
pub mod session;
pub mod tools;
pub mod ui;

pub use error::{AgentError, Result};
