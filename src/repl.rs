//! Interactive front end: reads lines, runs turns, handles slash commands
//! and keeps the active session saved.

use crate::commands::{parse_command, resolve_model, Command, SessionCommand, HELP_TEXT};
use crate::compaction::CompactionPolicy;
use crate::config::Config;
use crate::conversation::Conversation;
use crate::error::{AgentError, Result};
use crate::orchestrator::Orchestrator;
use crate::session::SessionManager;
use crate::ui::output::{
    display_error, display_models, display_notice, display_response, display_session_info,
    display_sessions, display_stats,
};
use std::future::Future;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

enum Flow {
    Continue,
    Exit,
}

pub struct Repl {
    config: Config,
    orchestrator: Orchestrator,
    sessions: SessionManager,
    conversation: Conversation,
    /// Prompt produced at startup; used for sessions that have none stored.
    system_prompt: String,
    policy: CompactionPolicy,
}

impl Repl {
    pub fn new(
        config: Config,
        orchestrator: Orchestrator,
        sessions: SessionManager,
        conversation: Conversation,
        system_prompt: String,
    ) -> Self {
        let policy = config.compaction.policy();
        Self {
            config,
            orchestrator,
            sessions,
            conversation,
            system_prompt,
            policy,
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Run a single prompt, save the session and return the answer.
    pub async fn run_once(&mut self, prompt: &str) -> Result<String> {
        let answer = self.turn(prompt).await?;
        self.after_turn().await?;
        Ok(answer)
    }

    /// Read lines from stdin until `/exit`, EOF or Ctrl-C at the prompt.
    pub async fn run(&mut self) -> Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            print!("> ");
            std::io::stdout().flush()?;

            let line = tokio::select! {
                line = lines.next_line() => line?,
                _ = tokio::signal::ctrl_c() => {
                    println!();
                    None
                }
            };
            let Some(line) = line else {
                break;
            };

            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if line == "exit" || line == "quit" {
                break;
            }

            let flow = match parse_command(line) {
                Some(command) => self.handle_command(command).await,
                None => self.handle_prompt(line).await,
            };
            match flow {
                Ok(Flow::Exit) => break,
                Ok(Flow::Continue) => {}
                Err(e) if e.is_policy() => display_notice(&e.to_string()),
                Err(e) => display_error(&e.to_string()),
            }
        }

        Ok(())
    }

    pub async fn shutdown(self) {
        if let Err(e) = self.orchestrator.close().await {
            warn!(error = %e, "failed to stop tool server");
        }
    }

    async fn handle_prompt(&mut self, line: &str) -> Result<Flow> {
        match self.turn(line).await {
            Ok(answer) => display_response(&answer),
            Err(AgentError::Cancelled) => {
                display_notice("Request cancelled.");
                return Ok(Flow::Continue);
            }
            Err(e) => return Err(e),
        }
        self.after_turn().await?;
        Ok(Flow::Continue)
    }

    /// One turn, cancellable with Ctrl-C.
    async fn turn(&mut self, text: &str) -> Result<String> {
        let cancel = CancellationToken::new();
        let watcher = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    cancel.cancel();
                }
            })
        };

        let result = self
            .orchestrator
            .run_turn(&mut self.conversation, text, &cancel)
            .await;
        watcher.abort();
        result
    }

    /// Persist the session, then compact when the threshold is crossed.
    async fn after_turn(&mut self) -> Result<()> {
        self.save()?;

        if !self.config.compaction.auto {
            return Ok(());
        }
        let stats = self.conversation.stats();
        if !self.policy.should_compact(&stats) {
            return Ok(());
        }

        debug!(tokens = stats.approx_tokens, "context over threshold, compacting");
        display_notice("Context is getting large, compacting...");
        match self.compact().await {
            Ok(()) => display_notice("Context compacted."),
            Err(e) if e.is_policy() => display_notice(&e.to_string()),
            Err(e) => warn!(error = %e, "automatic compaction failed"),
        }
        Ok(())
    }

    fn save(&mut self) -> Result<()> {
        let model = self.orchestrator.model().to_string();
        self.sessions.save_from(&self.conversation, &model)
    }

    async fn compact(&mut self) -> Result<()> {
        let model = self.orchestrator.model().to_string();
        let compaction = self.sessions.compact(
            &mut self.conversation,
            &self.orchestrator,
            &self.policy,
            &model,
        );
        interruptible(compaction).await
    }

    async fn handle_command(&mut self, command: Command) -> Result<Flow> {
        match command {
            Command::Exit => return Ok(Flow::Exit),
            Command::Help => println!("{}", HELP_TEXT),
            Command::ListModels => display_models(&self.config.models, self.orchestrator.model()),
            Command::SetModel(input) => {
                let model = resolve_model(&self.config.models, &input)?;
                self.orchestrator.set_model(&model);
                self.save()?;
                println!("Model set to {}", model);
            }
            Command::Config => {
                println!("{}", serde_json::to_string_pretty(&self.config.masked_json())?);
            }
            Command::Reset => {
                self.conversation.reset();
                self.save()?;
                println!("Conversation reset.");
            }
            Command::Compact => {
                self.compact().await?;
                println!("Context compacted.");
            }
            Command::Context => display_stats(&self.conversation.stats(), self.policy.limit()),
            Command::Inject(path) => {
                let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
                    AgentError::Other(format!("failed to read {}: {}", path, e))
                })?;
                if content.trim().is_empty() {
                    display_notice(&format!("{} is empty, nothing injected.", path));
                } else {
                    self.conversation.add_context(&path, &content);
                    self.save()?;
                    println!("Injected {} ({} chars).", path, content.chars().count());
                }
            }
            Command::Session(session_command) => self.handle_session(session_command)?,
            Command::Usage(usage) => display_notice(usage),
            Command::Unknown(name) => {
                display_notice(&format!("unknown command: {} (try /help)", name));
            }
        }
        Ok(Flow::Continue)
    }

    fn handle_session(&mut self, command: SessionCommand) -> Result<()> {
        match command {
            SessionCommand::List => {
                display_sessions(&self.sessions.list()?, self.sessions.current_name());
            }
            SessionCommand::Info => display_session_info(
                self.sessions.active(),
                &self.sessions.archive_path(),
                &self.sessions.summary_path(),
            ),
            SessionCommand::New(name) | SessionCommand::Switch(name) => {
                // Persist what we have before leaving the current session
                self.save()?;
                let model = self.orchestrator.model().to_string();
                if self.sessions.switch(&name, &model, &self.system_prompt)? {
                    self.conversation = self.sessions.restore(&self.system_prompt);
                    if let Some(session_model) = self.sessions.active_model().map(str::to_string) {
                        if session_model != model {
                            self.orchestrator.set_model(&session_model);
                        }
                    }
                    self.save()?;
                }
                println!("Active session: {}", self.sessions.current_name());
            }
            SessionCommand::Delete(name) => {
                self.sessions.delete(&name)?;
                println!("Deleted session {}.", name);
            }
        }
        Ok(())
    }
}

/// Await `fut` unless Ctrl-C arrives first.
async fn interruptible<T>(fut: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::select! {
        result = fut => result,
        _ = tokio::signal::ctrl_c() => Err(AgentError::Cancelled),
    }
}
