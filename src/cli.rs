use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Default)]
#[command(name = "mcpilot")]
#[command(version)]
#[command(
    about = "Coding agent that drives an MCP tool server with an OpenAI-compatible model",
    long_about = None
)]
pub struct Args {
    #[arg(short = 's', long = "session", help = "Session to open (default: \"default\")")]
    pub session: Option<String>,

    #[arg(short = 'm', long = "model", help = "Model to use for this run")]
    pub model: Option<String>,

    #[arg(long = "config", help = "Path to a YAML config file")]
    pub config: Option<PathBuf>,

    #[arg(long = "show-config", help = "Print the resolved configuration and exit")]
    pub show_config: bool,

    #[arg(long = "project", help = "Project directory passed to the MCP server")]
    pub project: Option<String>,

    #[arg(long = "no-tools", help = "Run without starting the MCP server")]
    pub no_tools: bool,

    #[arg(
        long = "api-endpoint",
        help = "Custom API base URL (e.g., http://localhost:11434/v1)"
    )]
    pub api_endpoint: Option<String>,

    #[arg(short = 'd', long = "debug", help = "Enable debug logging")]
    pub debug: bool,

    #[arg(help = "Prompt to run once; starts the interactive loop when omitted")]
    pub prompt: Vec<String>,
}

impl Args {
    /// The one-shot prompt, if any words were given.
    pub fn one_shot_prompt(&self) -> Option<String> {
        let prompt = self.prompt.join(" ");
        let prompt = prompt.trim();
        if prompt.is_empty() {
            None
        } else {
            Some(prompt.to_string())
        }
    }
}
