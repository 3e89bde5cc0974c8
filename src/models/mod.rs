mod message;
mod tool;

pub use message::{Message, Role, ToolCall};
pub use tool::{ToolChoice, ToolDefinition};
