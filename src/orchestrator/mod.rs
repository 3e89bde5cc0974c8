//! The tool-calling loop.
//!
//! [`Orchestrator::run_turn`] drives one user turn against a
//! [`Conversation`] it borrows mutably, so only one turn can be in flight for
//! a given history.

mod events;
mod steering;
mod text;

pub use events::{AgentEvent, EventSink};
pub use steering::{AutoToolChoice, KeywordToolChoice, SteeringRule, ToolChoicePolicy};
pub use text::{
    format_tool_args, strip_think_tags, truncate_preview, wrap_user_task, ARGS_PREVIEW_CHARS,
    RESULT_PREVIEW_CHARS,
};

use crate::api::{Completion, CompletionTransport};
use crate::compaction::{Summarize, SUMMARY_INSTRUCTION};
use crate::conversation::Conversation;
use crate::error::{AgentError, Result};
use crate::mcp::ToolTransport;
use crate::models::{Message, ToolCall, ToolChoice, ToolDefinition};
use crate::tools::{
    flatten_tool_result, validate_arguments, LocalHandler, ToolKind, ToolRegistry,
};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const TOOL_USE_POLICY: &str = "Tool Use Policy:
- Use tools for any file, repo, or project action (read/write/search/execute).
- Do not claim actions you did not perform via tools.
- When a tool is needed, respond with tool calls and wait for results before final answers.";

#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    pub model: String,
    pub compaction_model: String,
    /// Per completion call; `None` waits indefinitely.
    pub llm_timeout: Option<Duration>,
    /// Per tool invocation; `None` waits indefinitely.
    pub tool_timeout: Option<Duration>,
}

/// Text and error flag of one executed tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutcome {
    pub content: String,
    pub is_error: bool,
}

impl ToolOutcome {
    fn ok(content: String) -> Self {
        Self {
            content,
            is_error: false,
        }
    }

    fn error(content: String) -> Self {
        Self {
            content,
            is_error: true,
        }
    }
}

enum Interrupted {
    TimedOut,
    Cancelled,
}

pub struct Orchestrator {
    llm: Arc<dyn CompletionTransport>,
    tool_transport: Option<Arc<dyn ToolTransport>>,
    registry: ToolRegistry,
    model: String,
    compaction_model: String,
    llm_timeout: Option<Duration>,
    tool_timeout: Option<Duration>,
    events: EventSink,
    steering: Box<dyn ToolChoicePolicy>,
}

impl Orchestrator {
    pub fn new(
        llm: Arc<dyn CompletionTransport>,
        tool_transport: Option<Arc<dyn ToolTransport>>,
        options: OrchestratorOptions,
    ) -> Self {
        let compaction_model = if options.compaction_model.trim().is_empty() {
            options.model.clone()
        } else {
            options.compaction_model
        };

        Self {
            llm,
            tool_transport,
            registry: ToolRegistry::new(),
            model: options.model,
            compaction_model,
            llm_timeout: options.llm_timeout,
            tool_timeout: options.tool_timeout,
            events: EventSink::disabled(),
            steering: Box::new(AutoToolChoice),
        }
    }

    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    pub fn with_steering(mut self, steering: Box<dyn ToolChoicePolicy>) -> Self {
        self.steering = steering;
        self
    }

    /// Connect the tool server, discover its tools and build the initial
    /// conversation from its instructions.
    pub async fn initialize(&mut self) -> Result<Conversation> {
        let (instructions, tools) = match &self.tool_transport {
            Some(transport) => {
                info!("connecting to tool server");
                let instructions = transport.connect().await?;
                let tools = transport.list_tools().await?;
                info!(tools = tools.len(), "tools loaded");
                (instructions, tools)
            }
            None => (String::new(), Vec::new()),
        };

        let prompt = if instructions.trim().is_empty() {
            fallback_prompt(&tools)
        } else {
            instructions
        };
        self.registry.register_remote(tools);

        let system_prompt = append_tool_use_policy(&prompt);
        debug!(prompt = %system_prompt, "system prompt");
        Ok(Conversation::new(system_prompt))
    }

    /// Register an in-process tool. It shadows any discovered tool with the
    /// same name.
    pub fn register_local_tool(&mut self, definition: ToolDefinition, handler: LocalHandler) {
        debug!(tool = %definition.name, "registering local tool");
        self.registry.register_local(definition, handler);
    }

    pub fn advertised_tools(&self) -> Vec<ToolDefinition> {
        self.registry.advertise()
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn set_model(&mut self, model: &str) {
        info!(model, "switching model");
        self.model = model.to_string();
    }

    pub fn compaction_model(&self) -> &str {
        &self.compaction_model
    }

    pub async fn close(&self) -> Result<()> {
        match &self.tool_transport {
            Some(transport) => transport.close().await,
            None => Ok(()),
        }
    }

    /// Run one user turn to completion and return the final assistant text.
    ///
    /// On error the user message stays in the history. Assistant messages
    /// whose tool calls could not all be answered are rolled back so the
    /// history never holds unanswered tool calls.
    pub async fn run_turn(
        &self,
        conversation: &mut Conversation,
        user_text: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        conversation.push(Message::user(wrap_user_task(user_text)));

        let tools = self.registry.advertise();
        let mut choice = self.steering.choose(user_text, &tools);

        loop {
            let completion = self
                .complete(&self.model, conversation.messages(), &tools, &choice, cancel)
                .await?;

            let content = strip_think_tags(&completion.content);
            let tool_calls = completion.tool_calls;
            let checkpoint = conversation.len();
            conversation.push(Message::assistant_with_tool_calls(
                content.clone(),
                tool_calls.clone(),
            ));

            if tool_calls.is_empty() {
                return Ok(content);
            }

            debug!(count = tool_calls.len(), "executing tool calls");
            for call in &tool_calls {
                self.events.emit(AgentEvent::ToolStart {
                    name: call.name.clone(),
                    args_preview: format_tool_args(&call.arguments),
                });

                let outcome = match self.execute_tool_call(call, cancel).await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        conversation.truncate(checkpoint);
                        return Err(e);
                    }
                };

                self.events.emit(AgentEvent::ToolEnd {
                    name: call.name.clone(),
                    result_preview: truncate_preview(&outcome.content, RESULT_PREVIEW_CHARS),
                    is_error: outcome.is_error,
                });

                conversation.push(Message::tool_result(call.id.clone(), outcome.content));
            }

            choice = ToolChoice::Auto;
        }
    }

    async fn complete(
        &self,
        model: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
        choice: &ToolChoice,
        cancel: &CancellationToken,
    ) -> Result<Completion> {
        self.events.emit(AgentEvent::Status {
            model: model.to_string(),
        });
        debug!(
            model,
            messages = messages.len(),
            tools = tools.len(),
            "completion request start"
        );

        let request = with_timeout(
            self.llm_timeout,
            "completion request",
            self.llm.send(model, messages, tools, choice),
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AgentError::Cancelled),
            result = request => result,
        }
    }

    /// Execute one tool call.
    ///
    /// Tool failures, timeouts and cancellation come back as error-flagged
    /// content. Only malformed arguments and tool transport failures are
    /// returned as `Err`.
    pub async fn execute_tool_call(
        &self,
        call: &ToolCall,
        cancel: &CancellationToken,
    ) -> Result<ToolOutcome> {
        let arguments = parse_arguments(call)?;

        let Some(tool) = self.registry.resolve(&call.name) else {
            warn!(tool = %call.name, "model requested an unknown tool");
            return Ok(ToolOutcome::error(format!(
                "Error: Tool '{}' not found",
                call.name
            )));
        };

        match &tool.kind {
            ToolKind::Local(handler) => {
                let arguments = Value::Object(arguments);
                if let Err(e) = validate_arguments(&tool.definition, &arguments) {
                    return Ok(ToolOutcome::error(format!(
                        "Error: Invalid arguments for tool '{}': {}",
                        call.name, e
                    )));
                }

                match self.guard_tool(handler(arguments), cancel).await {
                    Ok(Ok(text)) => Ok(ToolOutcome::ok(text)),
                    Ok(Err(message)) => Ok(ToolOutcome::error(format!("Error: {}", message))),
                    Err(interrupted) => Ok(interrupted_outcome(&call.name, interrupted)),
                }
            }
            ToolKind::Remote => {
                let transport = self.tool_transport.as_ref().ok_or_else(|| {
                    AgentError::ToolTransport("no tool server is connected".to_string())
                })?;

                debug!(tool = %call.name, "invoking remote tool");
                match self
                    .guard_tool(transport.invoke(&call.name, arguments), cancel)
                    .await
                {
                    Ok(Ok(result)) => Ok(ToolOutcome {
                        content: flatten_tool_result(&result),
                        is_error: result.is_error,
                    }),
                    Ok(Err(e)) => Err(e),
                    Err(interrupted) => Ok(interrupted_outcome(&call.name, interrupted)),
                }
            }
        }
    }

    async fn guard_tool<F: Future>(
        &self,
        fut: F,
        cancel: &CancellationToken,
    ) -> std::result::Result<F::Output, Interrupted> {
        let timed = async {
            match self.tool_timeout {
                Some(limit) => tokio::time::timeout(limit, fut)
                    .await
                    .map_err(|_| Interrupted::TimedOut),
                None => Ok(fut.await),
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Interrupted::Cancelled),
            result = timed => result,
        }
    }
}

#[async_trait]
impl Summarize for Orchestrator {
    /// One-shot call to the compaction model with no tools.
    async fn summarize(&self, transcript: &str) -> Result<String> {
        let messages = vec![Message::system(SUMMARY_INSTRUCTION), Message::user(transcript)];

        debug!(
            model = %self.compaction_model,
            chars = transcript.len(),
            "compaction summarize start"
        );
        let completion = with_timeout(
            self.llm_timeout,
            "summary request",
            self.llm
                .send(&self.compaction_model, &messages, &[], &ToolChoice::None),
        )
        .await?;

        let summary = strip_think_tags(&completion.content);
        debug!(chars = summary.len(), "compaction summarize done");
        Ok(summary)
    }
}

async fn with_timeout<T>(
    limit: Option<Duration>,
    operation: &str,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    match limit {
        Some(after) => tokio::time::timeout(after, fut)
            .await
            .map_err(|_| AgentError::Timeout {
                operation: operation.to_string(),
                after,
            })?,
        None => fut.await,
    }
}

/// Blank arguments and `null` mean "no arguments".
fn parse_arguments(call: &ToolCall) -> Result<Map<String, Value>> {
    let raw = call.arguments.trim();
    if raw.is_empty() {
        return Ok(Map::new());
    }

    let malformed = |source| AgentError::MalformedArguments {
        tool: call.name.clone(),
        source,
    };
    match serde_json::from_str::<Value>(raw).map_err(malformed)? {
        Value::Null => Ok(Map::new()),
        Value::Object(map) => Ok(map),
        other => serde_json::from_value(other).map_err(malformed),
    }
}

fn interrupted_outcome(tool: &str, interrupted: Interrupted) -> ToolOutcome {
    let content = match interrupted {
        Interrupted::TimedOut => {
            warn!(tool, "tool call timed out");
            format!("Error: tool {:?} timed out waiting for a response.", tool)
        }
        Interrupted::Cancelled => {
            format!("Error: tool {:?} was cancelled before it returned.", tool)
        }
    };
    ToolOutcome::error(content)
}

fn fallback_prompt(tools: &[ToolDefinition]) -> String {
    let mut prompt = String::from(
        "You are mcpilot, a coding assistant that works through tools provided by an MCP server.\n\nAvailable tools:\n",
    );
    for tool in tools {
        prompt.push_str(&format!("- {}: {}\n", tool.name, tool.description));
    }
    prompt.push_str(
        "\nWhen the user asks for something:\n\
         1. Work out which tools you need\n\
         2. Call them\n\
         3. Read the results carefully\n\
         4. Answer briefly and concretely",
    );
    prompt
}

fn append_tool_use_policy(system_prompt: &str) -> String {
    let trimmed = system_prompt.trim();
    if trimmed.is_empty() {
        return TOOL_USE_POLICY.to_string();
    }
    format!("{}\n\n{}", trimmed, TOOL_USE_POLICY)
}
