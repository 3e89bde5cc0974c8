use crate::models::{Message, ToolCall, ToolChoice, ToolDefinition};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Serialize)]
pub struct RequestBody {
    pub model: String,
    pub messages: Vec<WireMessage>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<Value>,
}

impl RequestBody {
    pub fn new(
        model: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
        tool_choice: &ToolChoice,
        temperature: Option<f32>,
    ) -> Self {
        // tool_choice is only meaningful alongside a tool list
        let (tools, tool_choice) = if tools.is_empty() {
            (None, None)
        } else {
            (
                Some(format_tools_for_llm(tools)),
                Some(tool_choice.to_wire()),
            )
        };

        Self {
            model: model.to_string(),
            messages: messages.iter().map(WireMessage::from).collect(),
            stream: false,
            temperature,
            tools,
            tool_choice,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct WireMessage {
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<WireToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl From<&Message> for WireMessage {
    fn from(message: &Message) -> Self {
        let tool_calls = if message.tool_calls.is_empty() {
            None
        } else {
            Some(message.tool_calls.iter().map(WireToolCall::from).collect())
        };

        Self {
            role: message.role.as_str().to_string(),
            content: Some(message.content.clone()),
            tool_calls,
            tool_call_id: message.tool_call_id.clone(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct WireToolCall {
    pub id: String,
    #[serde(rename = "type", default = "default_tool_type")]
    pub tool_type: String,
    pub function: FunctionCall,
}

fn default_tool_type() -> String {
    "function".to_string()
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct FunctionCall {
    pub name: String,
    /// Usually a JSON string; some providers send an object instead.
    #[serde(default)]
    pub arguments: Value,
}

impl From<&ToolCall> for WireToolCall {
    fn from(call: &ToolCall) -> Self {
        Self {
            id: call.id.clone(),
            tool_type: default_tool_type(),
            function: FunctionCall {
                name: call.name.clone(),
                arguments: Value::String(call.arguments.clone()),
            },
        }
    }
}

impl From<WireToolCall> for ToolCall {
    fn from(call: WireToolCall) -> Self {
        let arguments = match call.function.arguments {
            Value::String(text) => text,
            Value::Null => String::new(),
            other => other.to_string(),
        };
        Self {
            id: call.id,
            name: call.function.name,
            arguments,
        }
    }
}

pub fn format_tools_for_llm(tools: &[ToolDefinition]) -> Vec<Value> {
    tools
        .iter()
        .map(|tool| {
            json!({
                "type": "function",
                "function": {
                    "name": tool.name,
                    "description": tool.description,
                    "parameters": tool.parameters,
                }
            })
        })
        .collect()
}
