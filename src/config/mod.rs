mod defaults;
mod llm;
mod mcp;
mod validation;

use crate::cli::Args;
use crate::error::AgentError;
use crate::orchestrator::SteeringRule;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use defaults::*;
pub use llm::{LlmConfig, LlmFileConfig};
pub use mcp::McpConfig;
pub use validation::{expand_env_var_in_string, expand_env_vars, mask_key, normalize_endpoint};

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CompactionConfig {
    pub context_budget_tokens: usize,
    pub threshold: f64,
    pub keep_recent: usize,
    /// Compact automatically after a turn crosses the threshold.
    pub auto: bool,
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            context_budget_tokens: default_context_budget_tokens(),
            threshold: default_threshold(),
            keep_recent: default_keep_recent(),
            auto: default_true(),
        }
    }
}

impl CompactionConfig {
    pub fn policy(&self) -> crate::compaction::CompactionPolicy {
        crate::compaction::CompactionPolicy {
            context_budget_tokens: self.context_budget_tokens,
            threshold: self.threshold,
            keep_recent: self.keep_recent,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Overrides the per-project directory under `~/.mcpilot/sessions`.
    pub dir: Option<String>,
    pub default_name: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            dir: None,
            default_name: default_session_name(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SteeringConfig {
    #[serde(default)]
    pub rules: Vec<SteeringRule>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Contents of a config file, before environment and CLI overrides.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FileConfig {
    #[serde(default)]
    pub llm: LlmFileConfig,
    #[serde(default)]
    pub mcp: McpConfig,
    #[serde(default)]
    pub compaction: CompactionConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub models: Vec<String>,
    #[serde(default)]
    pub steering: SteeringConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub debug: Option<bool>,
}

/// Fully resolved configuration.
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    pub llm: LlmConfig,
    pub mcp: McpConfig,
    pub compaction: CompactionConfig,
    pub session: SessionConfig,
    /// Models selectable with `/model`.
    pub models: Vec<String>,
    pub steering: SteeringConfig,
    pub logging: LoggingConfig,
    pub tools_enabled: bool,
    pub debug: bool,
    /// Config file the values came from, if any.
    pub source: Option<PathBuf>,
}

impl Config {
    /// Resolve configuration: CLI args > env vars > config file > defaults.
    pub fn from_env_and_args(args: &Args) -> crate::error::Result<Self> {
        let (file, source) = FileConfig::load(args.config.as_deref())?;
        Ok(Self::resolve(args, file, source, |key| env::var(key).ok()))
    }

    /// Layer `args` and the environment (read through `lookup`) over `file`.
    pub fn resolve(
        args: &Args,
        file: FileConfig,
        source: Option<PathBuf>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let env_var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = env_var("LLM_API_KEY")
            .or(file.llm.api_key.clone())
            .map(|key| expand_env_var_in_string(&key))
            .unwrap_or_default();

        let endpoint = args
            .api_endpoint
            .clone()
            .or_else(|| env_var("LLM_BASE_URL"))
            .or(file.llm.base_url.clone())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let model = args
            .model
            .clone()
            .or_else(|| env_var("LLM_MODEL"))
            .or(file.llm.model.clone())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let compaction_model = env_var("LLM_COMPACTION_MODEL")
            .or(file.llm.compaction_model.clone())
            .unwrap_or_else(|| model.clone());

        let llm = LlmConfig {
            api_key,
            endpoint: normalize_endpoint(&endpoint),
            model,
            compaction_model,
            timeout_secs: file.llm.timeout_secs.unwrap_or_else(default_timeout_secs),
            temperature: file.llm.temperature.or_else(default_temperature),
            user_agent: file.llm.user_agent.clone().unwrap_or_else(default_user_agent),
        };

        let mut mcp = file.mcp;
        if let Some(project) = &args.project {
            mcp.project_path = Some(project.clone());
        }

        // Always offer the active model in /model
        let mut models = if file.models.is_empty() {
            default_models()
        } else {
            file.models
        };
        if !models.contains(&llm.model) {
            models.insert(0, llm.model.clone());
        }

        Self {
            llm,
            mcp,
            compaction: file.compaction,
            session: file.session,
            models,
            steering: file.steering,
            logging: file.logging,
            tools_enabled: !args.no_tools,
            debug: args.debug || file.debug.unwrap_or(false),
            source,
        }
    }

    pub fn validate(&self) -> crate::error::Result<()> {
        if self.llm.api_key.trim().is_empty() {
            return Err(AgentError::Config(
                "LLM API key is required (set LLM_API_KEY or llm.api_key in .mcpilot.yaml)"
                    .to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.compaction.threshold) || self.compaction.threshold == 0.0 {
            return Err(AgentError::Config(format!(
                "compaction.threshold must be in (0, 1], got {}",
                self.compaction.threshold
            )));
        }
        Ok(())
    }

    pub fn llm_timeout(&self) -> Option<Duration> {
        secs_to_timeout(self.llm.timeout_secs)
    }

    pub fn tool_timeout(&self) -> Option<Duration> {
        secs_to_timeout(self.mcp.tool_timeout_secs)
    }

    /// Resolved configuration as JSON with the API key masked.
    pub fn masked_json(&self) -> Value {
        let mut value = serde_json::to_value(self).unwrap_or(Value::Null);
        if let Some(key) = value.pointer_mut("/llm/api_key") {
            *key = Value::String(mask_key(&self.llm.api_key));
        }
        value
    }
}

fn secs_to_timeout(secs: u64) -> Option<Duration> {
    if secs == 0 {
        None
    } else {
        Some(Duration::from_secs(secs))
    }
}

impl FileConfig {
    /// Load the first config file found, or `explicit` when given.
    pub fn load(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        if let Some(path) = explicit {
            let config = Self::load_from(path)?;
            return Ok((config, Some(path.to_path_buf())));
        }

        for path in Self::get_config_paths() {
            if path.exists() {
                let config = Self::load_from(&path)?;
                return Ok((config, Some(path)));
            }
        }

        // No config file found, return default
        Ok((FileConfig::default(), None))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML config file: {}", path.display()))
    }

    pub fn get_config_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        // 1. Current directory (highest priority - local override)
        paths.push(PathBuf::from(".mcpilot.yaml"));
        paths.push(PathBuf::from(".mcpilot.yml"));

        // 2. User's config directory (global config)
        if let Some(home_dir) = dirs::home_dir() {
            let config_dir = home_dir.join(".config").join("mcpilot");
            paths.push(config_dir.join("mcpilot.yaml"));
            paths.push(config_dir.join("mcpilot.yml"));
        }

        paths
    }
}
