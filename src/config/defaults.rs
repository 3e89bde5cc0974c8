pub const DEFAULT_BASE_URL: &str = "https://llm.chutes.ai/v1";
pub const DEFAULT_MODEL: &str = "zai-org/GLM-4.7-TEE";

pub fn default_models() -> Vec<String> {
    [
        "deepseek-ai/DeepSeek-V3.2-TEE",
        "moonshotai/Kimi-K2-Instruct-0905",
        "Qwen/Qwen3-Coder-480B-A35B-Instruct-FP8-TEE",
        "MiniMaxAI/MiniMax-M2.1-TEE",
        "zai-org/GLM-4.7-TEE",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

pub fn default_timeout_secs() -> u64 {
    120
}

pub fn default_temperature() -> Option<f32> {
    Some(0.7)
}

pub fn default_user_agent() -> String {
    format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

pub fn default_mcp_command() -> String {
    "uvx".to_string()
}

pub fn default_mcp_context() -> String {
    "desktop-app".to_string()
}

pub fn default_context_budget_tokens() -> usize {
    crate::compaction::DEFAULT_CONTEXT_BUDGET_TOKENS
}

pub fn default_threshold() -> f64 {
    crate::compaction::DEFAULT_THRESHOLD
}

pub fn default_keep_recent() -> usize {
    crate::compaction::DEFAULT_KEEP_RECENT
}

pub fn default_true() -> bool {
    true
}

pub fn default_session_name() -> String {
    crate::session::DEFAULT_SESSION_NAME.to_string()
}

pub fn default_log_level() -> String {
    "warn".to_string()
}
