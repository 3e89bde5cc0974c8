use clap::Parser;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing::{debug, info};

use mcpilot::api::ChatClient;
use mcpilot::cli::Args;
use mcpilot::config::{expand_env_var_in_string, expand_env_vars, Config};
use mcpilot::error::Result;
use mcpilot::mcp::{build_command_args, McpClient, ToolTransport};
use mcpilot::orchestrator::{
    AutoToolChoice, EventSink, KeywordToolChoice, Orchestrator, OrchestratorOptions,
    ToolChoicePolicy,
};
use mcpilot::repl::Repl;
use mcpilot::session::{session_base_dir, FilesystemSessionStore, SessionManager};
use mcpilot::tools::{session_search_definition, session_search_handler};
use mcpilot::ui::output::{display_error, display_response};
use mcpilot::ui::spawn_presenter;

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = run(args).await {
        display_error(&e.to_string());
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let config = Config::from_env_and_args(&args)?;
    mcpilot::logging::init_logging(&config.logging, config.debug);

    if args.show_config {
        println!("{}", serde_json::to_string_pretty(&config.masked_json())?);
        return Ok(());
    }
    config.validate()?;
    if let Some(source) = &config.source {
        debug!(path = %source.display(), "loaded config file");
    }

    let llm = Arc::new(ChatClient::new(
        &config.llm.api_key,
        &config.llm.endpoint,
        &config.llm.user_agent,
        config.llm.temperature,
    )?);
    let tool_transport = if config.tools_enabled {
        let args = build_command_args(&config.mcp);
        info!(command = %config.mcp.command, ?args, "launching tool server");
        let client = McpClient::new(&config.mcp.command, args, expand_env_vars(&config.mcp.env));
        Some(Arc::new(client) as Arc<dyn ToolTransport>)
    } else {
        None
    };

    let (events, receiver) = EventSink::channel();
    let presenter = spawn_presenter(receiver);

    let steering: Box<dyn ToolChoicePolicy> = if config.steering.rules.is_empty() {
        Box::new(AutoToolChoice)
    } else {
        Box::new(KeywordToolChoice::new(config.steering.rules.clone()))
    };

    let mut orchestrator = Orchestrator::new(
        llm,
        tool_transport,
        OrchestratorOptions {
            model: config.llm.model.clone(),
            compaction_model: config.llm.compaction_model.clone(),
            llm_timeout: config.llm_timeout(),
            tool_timeout: config.tool_timeout(),
        },
    )
    .with_events(events)
    .with_steering(steering);

    let initial = match orchestrator.initialize().await {
        Ok(conversation) => conversation,
        Err(e) => {
            let _ = orchestrator.close().await;
            return Err(e);
        }
    };
    let system_prompt = initial.system_prompt().to_string();

    let base_dir = match &config.session.dir {
        Some(dir) if !dir.trim().is_empty() => expand_home(&expand_env_var_in_string(dir)),
        _ => session_base_dir(config.mcp.project_path.as_deref())?,
    };
    let store = Arc::new(FilesystemSessionStore::new(&base_dir)?);
    let session_name = args
        .session
        .clone()
        .unwrap_or_else(|| config.session.default_name.clone());
    let sessions = SessionManager::open(
        store,
        &base_dir,
        &session_name,
        orchestrator.model(),
        &system_prompt,
    )?;
    info!(session = %sessions.current_name(), dir = %base_dir.display(), "session opened");

    // An explicit --model wins over the one stored with the session
    if args.model.is_none() {
        if let Some(model) = sessions.active_model().map(str::to_string) {
            if model != orchestrator.model() {
                orchestrator.set_model(&model);
            }
        }
    }

    orchestrator.register_local_tool(
        session_search_definition(),
        session_search_handler(sessions.archive_handle()),
    );

    let conversation = sessions.restore(&system_prompt);
    let mut repl = Repl::new(config, orchestrator, sessions, conversation, system_prompt);

    let result = match args.one_shot_prompt() {
        Some(prompt) => repl.run_once(&prompt).await.map(|answer| display_response(&answer)),
        None => repl.run().await,
    };

    repl.shutdown().await;
    let _ = presenter.await;
    result
}

fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
