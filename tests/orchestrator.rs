use async_trait::async_trait;
use mcpilot::api::{Completion, CompletionTransport};
use mcpilot::cli::Args;
use mcpilot::compaction::Summarize;
use mcpilot::config::{CompactionConfig, Config, FileConfig};
use mcpilot::error::{AgentError, Result};
use mcpilot::mcp::{McpToolResult, ToolTransport};
use mcpilot::models::{Message, Role, ToolCall, ToolChoice, ToolDefinition};
use mcpilot::orchestrator::{
    AgentEvent, EventSink, KeywordToolChoice, Orchestrator, OrchestratorOptions, SteeringRule,
};
use mcpilot::repl::Repl;
use mcpilot::session::{FilesystemSessionStore, SessionManager};
use mcpilot::tools::local_handler;
use serde_json::{json, Map, Value};
use std::collections::VecDeque;
use std::fs;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

enum Step {
    Reply(Completion),
    Fail(u16),
    Hang,
}

struct Request {
    model: String,
    messages: Vec<Message>,
    tools: Vec<String>,
    choice: ToolChoice,
}

#[derive(Default)]
struct ScriptedLlm {
    steps: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<Request>>,
}

impl ScriptedLlm {
    fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into()),
            requests: Mutex::default(),
        })
    }

    fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl CompletionTransport for ScriptedLlm {
    async fn send(
        &self,
        model: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
        tool_choice: &ToolChoice,
    ) -> Result<Completion> {
        self.requests.lock().unwrap().push(Request {
            model: model.to_string(),
            messages: messages.to_vec(),
            tools: tools.iter().map(|t| t.name.clone()).collect(),
            choice: tool_choice.clone(),
        });

        let step = self.steps.lock().unwrap().pop_front();
        match step {
            Some(Step::Reply(completion)) => Ok(completion),
            Some(Step::Fail(status)) => Err(AgentError::Api {
                status,
                message: "scripted failure".to_string(),
            }),
            Some(Step::Hang) => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(Completion::text("too late"))
            }
            None => panic!("no scripted completion left"),
        }
    }
}

struct FakeServer {
    instructions: String,
    tools: Vec<ToolDefinition>,
    invoked: Mutex<Vec<String>>,
}

impl FakeServer {
    fn new(instructions: &str, names: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            instructions: instructions.to_string(),
            tools: names
                .iter()
                .map(|name| {
                    ToolDefinition::new(name, &format!("{} tool", name), json!({"type": "object"}))
                })
                .collect(),
            invoked: Mutex::default(),
        })
    }

    fn invoked(&self) -> Vec<String> {
        self.invoked.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolTransport for FakeServer {
    async fn connect(&self) -> Result<String> {
        Ok(self.instructions.clone())
    }

    async fn list_tools(&self) -> Result<Vec<ToolDefinition>> {
        Ok(self.tools.clone())
    }

    async fn invoke(&self, name: &str, arguments: Map<String, Value>) -> Result<McpToolResult> {
        self.invoked.lock().unwrap().push(name.to_string());
        match name {
            "slow" => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(McpToolResult::text("finally"))
            }
            "broken" => Err(AgentError::ToolTransport("server went away".to_string())),
            "failing" => Ok(McpToolResult::error("file not found")),
            _ => Ok(McpToolResult::text(&format!(
                "{} ran with {}",
                name,
                Value::Object(arguments)
            ))),
        }
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

fn options() -> OrchestratorOptions {
    OrchestratorOptions {
        model: "main-model".to_string(),
        compaction_model: "summary-model".to_string(),
        llm_timeout: None,
        tool_timeout: None,
    }
}

fn tool_call_step(calls: Vec<ToolCall>) -> Step {
    Step::Reply(Completion::with_tool_calls("", calls))
}

fn text_step(text: &str) -> Step {
    Step::Reply(Completion::text(text))
}

async fn orchestrator_with(
    llm: Arc<ScriptedLlm>,
    server: Arc<FakeServer>,
    options: OrchestratorOptions,
) -> (Orchestrator, mcpilot::conversation::Conversation) {
    let server: Arc<dyn ToolTransport> = server;
    let mut orchestrator = Orchestrator::new(llm, Some(server), options);
    let conversation = orchestrator.initialize().await.unwrap();
    (orchestrator, conversation)
}

#[tokio::test]
async fn test_initialize_uses_server_instructions() {
    let llm = ScriptedLlm::new(vec![]);
    let server = FakeServer::new("Use the symbolic tools.", &["find_symbol"]);
    let (orchestrator, conversation) = orchestrator_with(llm, server, options()).await;

    let prompt = conversation.system_prompt();
    assert!(prompt.starts_with("Use the symbolic tools.\n\nTool Use Policy:"));
    assert_eq!(conversation.len(), 1);
    assert_eq!(orchestrator.registry().names().to_vec(), vec!["find_symbol"]);
}

#[tokio::test]
async fn test_initialize_without_instructions_lists_tools() {
    let llm = ScriptedLlm::new(vec![]);
    let server = FakeServer::new("", &["list_dir", "read_file"]);
    let (_, conversation) = orchestrator_with(llm, server, options()).await;

    let prompt = conversation.system_prompt();
    assert!(prompt.contains("- list_dir: list_dir tool"));
    assert!(prompt.contains("- read_file: read_file tool"));
    assert!(prompt.ends_with("wait for results before final answers."));
}

#[tokio::test]
async fn test_turn_without_tools_returns_text() {
    let llm = ScriptedLlm::new(vec![text_step("<think>hmm</think>Hello there")]);
    let mut orchestrator = Orchestrator::new(llm.clone(), None, options());
    let mut conversation = orchestrator.initialize().await.unwrap();

    let answer = orchestrator
        .run_turn(&mut conversation, "hi", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(answer, "Hello there");
    assert_eq!(conversation.len(), 3);
    assert_eq!(
        conversation.messages()[1].content,
        "<task>\n<request>\nhi\n</request>\n</task>"
    );
    assert_eq!(conversation.messages()[2], Message::assistant("Hello there"));

    let requests = llm.requests.lock().unwrap();
    assert!(requests[0].tools.is_empty());
    assert_eq!(requests[0].model, "main-model");
}

#[tokio::test]
async fn test_tool_round_trip() {
    let llm = ScriptedLlm::new(vec![
        tool_call_step(vec![ToolCall::new("c1", "list_dir", r#"{"path": "src"}"#)]),
        text_step("src has two files."),
    ]);
    let server = FakeServer::new("instructions", &["list_dir"]);
    let (events, mut receiver) = EventSink::channel();
    let (orchestrator, mut conversation) =
        orchestrator_with(llm.clone(), server.clone(), options()).await;
    let orchestrator = orchestrator.with_events(events);

    let answer = orchestrator
        .run_turn(&mut conversation, "what is in src?", &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(answer, "src has two files.");

    let roles: Vec<Role> = conversation.messages().iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![Role::System, Role::User, Role::Assistant, Role::Tool, Role::Assistant]
    );
    let tool_message = &conversation.messages()[3];
    assert_eq!(tool_message.tool_call_id.as_deref(), Some("c1"));
    assert_eq!(tool_message.content, r#"list_dir ran with {"path":"src"}"#);
    assert_eq!(server.invoked(), vec!["list_dir"]);

    // The second request sees the tool result
    let requests = llm.requests.lock().unwrap();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].messages.len(), 4);
    assert_eq!(requests[0].tools, vec!["list_dir"]);
    drop(requests);

    drop(orchestrator);
    let mut seen = Vec::new();
    while let Some(event) = receiver.recv().await {
        seen.push(event);
    }
    assert!(matches!(&seen[0], AgentEvent::Status { model } if model == "main-model"));
    assert!(matches!(&seen[1], AgentEvent::ToolStart { name, .. } if name == "list_dir"));
    assert!(matches!(
        &seen[2],
        AgentEvent::ToolEnd { name, is_error: false, .. } if name == "list_dir"
    ));
    assert!(matches!(&seen[3], AgentEvent::Status { .. }));
    assert_eq!(seen.len(), 4);
}

#[tokio::test]
async fn test_multiple_tool_calls_answered_in_order() {
    let llm = ScriptedLlm::new(vec![
        tool_call_step(vec![
            ToolCall::new("a", "read_file", r#"{"path": "a.rs"}"#),
            ToolCall::new("b", "failing", "{}"),
        ]),
        text_step("done"),
    ]);
    let server = FakeServer::new("x", &["read_file", "failing"]);
    let (orchestrator, mut conversation) = orchestrator_with(llm, server, options()).await;

    orchestrator
        .run_turn(&mut conversation, "read", &CancellationToken::new())
        .await
        .unwrap();

    let messages = conversation.messages();
    assert_eq!(messages[3].tool_call_id.as_deref(), Some("a"));
    assert_eq!(messages[4].tool_call_id.as_deref(), Some("b"));
    assert_eq!(messages[4].content, "Error: file not found");
}

#[tokio::test]
async fn test_unknown_tool_is_reported_to_model() {
    let llm = ScriptedLlm::new(vec![
        tool_call_step(vec![ToolCall::new("c1", "does_not_exist", "{}")]),
        text_step("sorry"),
    ]);
    let server = FakeServer::new("x", &["list_dir"]);
    let (orchestrator, mut conversation) = orchestrator_with(llm, server.clone(), options()).await;

    let answer = orchestrator
        .run_turn(&mut conversation, "go", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(answer, "sorry");
    assert_eq!(
        conversation.messages()[3].content,
        "Error: Tool 'does_not_exist' not found"
    );
    assert!(server.invoked().is_empty());
}

#[tokio::test]
async fn test_tool_timeout_becomes_error_result() {
    let llm = ScriptedLlm::new(vec![
        tool_call_step(vec![ToolCall::new("c1", "slow", "{}")]),
        text_step("the tool timed out"),
    ]);
    let server = FakeServer::new("x", &["slow"]);
    let options = OrchestratorOptions {
        tool_timeout: Some(Duration::from_millis(50)),
        ..options()
    };
    let (orchestrator, mut conversation) = orchestrator_with(llm.clone(), server, options).await;

    let answer = orchestrator
        .run_turn(&mut conversation, "go", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(answer, "the tool timed out");
    assert_eq!(
        conversation.messages()[3].content,
        "Error: tool \"slow\" timed out waiting for a response."
    );
    assert_eq!(llm.request_count(), 2);
}

#[tokio::test]
async fn test_transport_failure_rolls_back_tool_calls() {
    let llm = ScriptedLlm::new(vec![tool_call_step(vec![
        ToolCall::new("c1", "list_dir", "{}"),
        ToolCall::new("c2", "broken", "{}"),
    ])]);
    let server = FakeServer::new("x", &["list_dir", "broken"]);
    let (orchestrator, mut conversation) = orchestrator_with(llm, server, options()).await;

    let result = orchestrator
        .run_turn(&mut conversation, "go", &CancellationToken::new())
        .await;

    assert!(matches!(result, Err(AgentError::ToolTransport(_))));
    let roles: Vec<Role> = conversation.messages().iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::System, Role::User]);
}

#[tokio::test]
async fn test_malformed_arguments_abort_turn() {
    let llm = ScriptedLlm::new(vec![tool_call_step(vec![ToolCall::new(
        "c1",
        "list_dir",
        "{\"path\":",
    )])]);
    let server = FakeServer::new("x", &["list_dir"]);
    let (orchestrator, mut conversation) = orchestrator_with(llm, server.clone(), options()).await;

    let result = orchestrator
        .run_turn(&mut conversation, "go", &CancellationToken::new())
        .await;

    assert!(matches!(
        result,
        Err(AgentError::MalformedArguments { ref tool, .. }) if tool == "list_dir"
    ));
    assert_eq!(conversation.len(), 2);
    assert!(server.invoked().is_empty());
}

#[tokio::test]
async fn test_completion_error_keeps_user_message() {
    let llm = ScriptedLlm::new(vec![Step::Fail(429)]);
    let server = FakeServer::new("x", &[]);
    let (orchestrator, mut conversation) = orchestrator_with(llm, server, options()).await;

    let result = orchestrator
        .run_turn(&mut conversation, "go", &CancellationToken::new())
        .await;

    assert!(matches!(result, Err(AgentError::Api { status: 429, .. })));
    assert_eq!(conversation.len(), 2);
    assert_eq!(conversation.last().map(|m| m.role), Some(Role::User));
}

#[tokio::test]
async fn test_completion_timeout() {
    let llm = ScriptedLlm::new(vec![Step::Hang]);
    let options = OrchestratorOptions {
        llm_timeout: Some(Duration::from_millis(50)),
        ..options()
    };
    let mut orchestrator = Orchestrator::new(llm, None, options);
    let mut conversation = orchestrator.initialize().await.unwrap();

    let result = orchestrator
        .run_turn(&mut conversation, "go", &CancellationToken::new())
        .await;
    assert!(matches!(result, Err(AgentError::Timeout { .. })));
}

#[tokio::test]
async fn test_cancelled_turn() {
    let llm = ScriptedLlm::new(vec![Step::Hang]);
    let mut orchestrator = Orchestrator::new(llm, None, options());
    let mut conversation = orchestrator.initialize().await.unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let result = orchestrator.run_turn(&mut conversation, "go", &cancel).await;
    assert!(matches!(result, Err(AgentError::Cancelled)));
    assert_eq!(conversation.len(), 2);
}

#[tokio::test]
async fn test_local_tool_shadows_remote() {
    let llm = ScriptedLlm::new(vec![
        tool_call_step(vec![ToolCall::new("c1", "echo", r#"{"text": "hi"}"#)]),
        text_step("ok"),
    ]);
    let server = FakeServer::new("x", &["echo", "list_dir"]);
    let (mut orchestrator, mut conversation) =
        orchestrator_with(llm.clone(), server.clone(), options()).await;

    orchestrator.register_local_tool(
        ToolDefinition::new(
            "echo",
            "Echo text back",
            json!({
                "type": "object",
                "properties": { "text": { "type": "string" } },
                "required": ["text"]
            }),
        ),
        local_handler(|args: Value| async move {
            Ok(format!("local: {}", args["text"].as_str().unwrap_or_default()))
        }),
    );

    let advertised: Vec<String> = orchestrator
        .advertised_tools()
        .into_iter()
        .map(|t| t.name)
        .collect();
    assert_eq!(advertised, vec!["echo", "list_dir"]);

    orchestrator
        .run_turn(&mut conversation, "echo hi", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(conversation.messages()[3].content, "local: hi");
    assert!(server.invoked().is_empty());
    assert_eq!(llm.requests.lock().unwrap()[0].tools, vec!["echo", "list_dir"]);
}

#[tokio::test]
async fn test_local_tool_argument_validation() {
    let llm = ScriptedLlm::new(vec![]);
    let mut orchestrator = Orchestrator::new(llm, None, options());
    orchestrator.initialize().await.unwrap();
    orchestrator.register_local_tool(
        ToolDefinition::new(
            "echo",
            "Echo text back",
            json!({
                "type": "object",
                "properties": { "text": { "type": "string" } },
                "required": ["text"]
            }),
        ),
        local_handler(|_args: Value| async move { Err("should not run".to_string()) }),
    );

    let outcome = orchestrator
        .execute_tool_call(&ToolCall::new("c1", "echo", "{}"), &CancellationToken::new())
        .await
        .unwrap();
    assert!(outcome.is_error);
    assert!(outcome
        .content
        .starts_with("Error: Invalid arguments for tool 'echo':"));

    let outcome = orchestrator
        .execute_tool_call(
            &ToolCall::new("c2", "echo", r#"{"text": "x"}"#),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert!(outcome.is_error);
    assert_eq!(outcome.content, "Error: should not run");
}

#[tokio::test]
async fn test_steering_applies_to_first_call_only() {
    let llm = ScriptedLlm::new(vec![
        tool_call_step(vec![ToolCall::new("c1", "find_symbol", r#"{"name": "Parser"}"#)]),
        text_step("found it"),
    ]);
    let server = FakeServer::new("x", &["find_symbol", "list_dir"]);
    let (orchestrator, mut conversation) = orchestrator_with(llm.clone(), server, options()).await;
    let orchestrator = orchestrator.with_steering(Box::new(KeywordToolChoice::new(vec![
        SteeringRule {
            keywords: vec!["missing".to_string()],
            tool: "not_advertised".to_string(),
        },
        SteeringRule {
            keywords: vec!["Symbol".to_string()],
            tool: "find_symbol".to_string(),
        },
    ])));

    orchestrator
        .run_turn(
            &mut conversation,
            "where is the SYMBOL Parser (missing)?",
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let requests = llm.requests.lock().unwrap();
    assert_eq!(requests[0].choice, ToolChoice::Tool("find_symbol".to_string()));
    assert_eq!(requests[1].choice, ToolChoice::Auto);
}

#[tokio::test]
async fn test_summarize_uses_compaction_model_without_tools() {
    let llm = ScriptedLlm::new(vec![text_step("<think>plan</think>\n- summary point")]);
    let server = FakeServer::new("x", &["list_dir"]);
    let (orchestrator, _) = orchestrator_with(llm.clone(), server, options()).await;

    let summary = orchestrator.summarize("[user]\nhello").await.unwrap();
    assert_eq!(summary, "- summary point");

    let requests = llm.requests.lock().unwrap();
    assert_eq!(requests[0].model, "summary-model");
    assert!(requests[0].tools.is_empty());
    assert_eq!(requests[0].choice, ToolChoice::None);
    assert_eq!(requests[0].messages[1], Message::user("[user]\nhello"));
}

#[tokio::test]
async fn test_empty_compaction_model_falls_back() {
    let llm = ScriptedLlm::new(vec![]);
    let orchestrator = Orchestrator::new(
        llm,
        None,
        OrchestratorOptions {
            compaction_model: " ".to_string(),
            ..options()
        },
    );
    assert_eq!(orchestrator.compaction_model(), "main-model");
}

async fn repl_with(llm: Arc<ScriptedLlm>, auto: bool, dir: &TempDir) -> Repl {
    let mut config = Config::resolve(&Args::default(), FileConfig::default(), None, |_| None);
    config.compaction = CompactionConfig {
        context_budget_tokens: 10,
        threshold: 1.0,
        keep_recent: 2,
        auto,
    };

    let mut orchestrator = Orchestrator::new(llm, None, options());
    let mut conversation = orchestrator.initialize().await.unwrap();
    let system_prompt = conversation.system_prompt().to_string();
    for i in 0..2 {
        conversation.push(Message::user(&format!("earlier question {}", i)));
        conversation.push(Message::assistant(&format!("earlier answer {}", i)));
    }

    let store = Arc::new(FilesystemSessionStore::new(dir.path()).unwrap());
    let sessions =
        SessionManager::open(store, dir.path(), "work", "main-model", &system_prompt).unwrap();
    Repl::new(config, orchestrator, sessions, conversation, system_prompt)
}

#[tokio::test]
async fn test_turn_over_threshold_compacts_automatically() {
    let temp_dir = TempDir::new().unwrap();
    let llm = ScriptedLlm::new(vec![text_step("the answer"), text_step("summary text")]);
    let mut repl = repl_with(llm.clone(), true, &temp_dir).await;

    let answer = repl.run_once("latest question").await.unwrap();
    assert_eq!(answer, "the answer");

    let messages = repl.conversation().messages();
    assert_eq!(messages.len(), 4);
    assert!(messages[1].content.contains("<summary>\nsummary text\n</summary>"));
    assert_eq!(messages[2].content, "latest question");
    assert_eq!(messages[3].content, "the answer");

    let summary = fs::read_to_string(temp_dir.path().join("work_summary.md")).unwrap();
    assert_eq!(summary, "summary text");
    let archive = fs::read_to_string(temp_dir.path().join("work_archive.txt")).unwrap();
    assert!(archive.contains("earlier question 0"));

    let requests = llm.requests.lock().unwrap();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].model, "main-model");
    assert_eq!(requests[1].model, "summary-model");
    assert!(requests[1].tools.is_empty());
}

#[tokio::test]
async fn test_turn_without_auto_compaction_keeps_history() {
    let temp_dir = TempDir::new().unwrap();
    let llm = ScriptedLlm::new(vec![text_step("the answer")]);
    let mut repl = repl_with(llm.clone(), false, &temp_dir).await;

    repl.run_once("latest question").await.unwrap();

    assert_eq!(repl.conversation().len(), 7);
    assert_eq!(llm.request_count(), 1);
    assert!(!temp_dir.path().join("work_summary.md").exists());
    assert!(temp_dir.path().join("work.json").exists());
}
