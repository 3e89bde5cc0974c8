//! Slash commands understood by the interactive loop.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    List,
    New(String),
    Switch(String),
    Delete(String),
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Exit,
    /// `/models`, or `/model` without an argument.
    ListModels,
    /// `/model <index|name>`
    SetModel(String),
    Config,
    Reset,
    Compact,
    Context,
    Inject(String),
    Session(SessionCommand),
    /// Recognised command with bad arguments; holds the usage text.
    Usage(&'static str),
    Unknown(String),
}

/// Parse a line starting with `/`. Returns `None` for ordinary input.
pub fn parse_command(line: &str) -> Option<Command> {
    let line = line.trim();
    let body = line.strip_prefix('/')?;

    let mut fields = body.split_whitespace();
    let name = fields.next().unwrap_or_default();
    let args: Vec<&str> = fields.collect();
    let rest = args.join(" ");

    let command = match name {
        "help" | "?" => Command::Help,
        "exit" | "quit" => Command::Exit,
        "models" => Command::ListModels,
        "model" => {
            if rest.is_empty() || rest.eq_ignore_ascii_case("list") {
                Command::ListModels
            } else {
                Command::SetModel(rest)
            }
        }
        "config" => Command::Config,
        "reset" => Command::Reset,
        "compact" => Command::Compact,
        "context" => Command::Context,
        "inject" => {
            if rest.is_empty() {
                Command::Usage("usage: /inject <path>")
            } else {
                Command::Inject(rest)
            }
        }
        "session" => parse_session(&args),
        _ => Command::Unknown(format!("/{}", name)),
    };

    Some(command)
}

fn parse_session(args: &[&str]) -> Command {
    let name = || args.get(1).map(|s| s.to_string());

    match args.first().copied() {
        None | Some("list") => Command::Session(SessionCommand::List),
        Some("info") => Command::Session(SessionCommand::Info),
        Some("new") => match name() {
            Some(n) => Command::Session(SessionCommand::New(n)),
            None => Command::Usage("usage: /session new <name>"),
        },
        Some("switch") => match name() {
            Some(n) => Command::Session(SessionCommand::Switch(n)),
            None => Command::Usage("usage: /session switch <name>"),
        },
        Some("delete") => match name() {
            Some(n) => Command::Session(SessionCommand::Delete(n)),
            None => Command::Usage("usage: /session delete <name>"),
        },
        Some(_) => Command::Usage("unknown session command (use list/new/switch/delete/info)"),
    }
}

pub const HELP_TEXT: &str = "Commands:
  /help                     Show this help
  /model                    List models
  /model <number|name>      Switch model
  /models                   Alias for /model
  /config                   Show resolved config (API key masked)
  /reset                    Clear the conversation context
  /compact                  Summarize older history into the session archive
  /context                  Show approximate context usage
  /inject <path>            Add a file to the context
  /session [list]           List sessions
  /session new <name>       Create and switch to a session
  /session switch <name>    Switch sessions
  /session delete <name>    Delete a session (not the active one)
  /session info             Show the active session
  /exit, /quit              Exit";

/// Resolve `/model` input: a 1-based index into `models` or a
/// case-insensitive name.
pub fn resolve_model(models: &[String], input: &str) -> crate::error::Result<String> {
    let input = input.trim();
    if let Ok(index) = input.parse::<usize>() {
        return index
            .checked_sub(1)
            .and_then(|i| models.get(i))
            .cloned()
            .ok_or_else(|| {
                crate::error::AgentError::UnknownModel(format!("index {} out of range", index))
            });
    }

    models
        .iter()
        .find(|model| model.eq_ignore_ascii_case(input))
        .cloned()
        .ok_or_else(|| crate::error::AgentError::UnknownModel(input.to_string()))
}
