use serde::{Deserialize, Serialize};

/// `llm:` section of the config file. Every field can be overridden by
/// environment variables or CLI flags.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LlmFileConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub compaction_model: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub user_agent: Option<String>,
}

/// Resolved completion-endpoint settings.
#[derive(Debug, Clone, Serialize)]
pub struct LlmConfig {
    pub api_key: String,
    /// Full `/chat/completions` URL.
    pub endpoint: String,
    pub model: String,
    pub compaction_model: String,
    /// 0 disables the timeout.
    pub timeout_secs: u64,
    pub temperature: Option<f32>,
    pub user_agent: String,
}
