use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::env;

static ENV_VAR_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\{([^}]+)\}").unwrap());

/// Expand environment variables in a string using ${VAR_NAME} syntax
pub fn expand_env_var_in_string(value: &str) -> String {
    let mut result = value.to_string();

    for cap in ENV_VAR_PATTERN.captures_iter(value) {
        let var_name = &cap[1];
        let replacement = env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name));
        result = result.replace(&cap[0], &replacement);
    }

    result
}

/// Expand environment variables in a HashMap
pub fn expand_env_vars(env: &HashMap<String, String>) -> HashMap<String, String> {
    env.iter()
        .map(|(key, value)| (key.clone(), expand_env_var_in_string(value)))
        .collect()
}

/// Turn a base URL into a full `/chat/completions` endpoint.
pub fn normalize_endpoint(endpoint: &str) -> String {
    let endpoint = endpoint.trim();
    if endpoint.ends_with("/chat/completions") {
        endpoint.to_string()
    } else if endpoint.ends_with("/v1") {
        format!("{}/chat/completions", endpoint)
    } else if endpoint.ends_with("/v1/") {
        format!("{}chat/completions", endpoint)
    } else {
        // Assume it's a base URL without /v1
        format!("{}/v1/chat/completions", endpoint.trim_end_matches('/'))
    }
}

/// Mask an API key for display, keeping the first and last four characters.
pub fn mask_key(key: &str) -> String {
    if key.is_empty() {
        return String::new();
    }
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "********".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_endpoint() {
        assert_eq!(
            normalize_endpoint("https://llm.example.com/v1"),
            "https://llm.example.com/v1/chat/completions"
        );
        assert_eq!(
            normalize_endpoint("https://llm.example.com/v1/"),
            "https://llm.example.com/v1/chat/completions"
        );
        assert_eq!(
            normalize_endpoint("http://localhost:11434/"),
            "http://localhost:11434/v1/chat/completions"
        );
        assert_eq!(
            normalize_endpoint("https://x.test/api/v1/chat/completions"),
            "https://x.test/api/v1/chat/completions"
        );
    }

    #[test]
    fn test_mask_key() {
        assert_eq!(mask_key(""), "");
        assert_eq!(mask_key("short"), "********");
        assert_eq!(mask_key("sk-abcdefghijkl"), "sk-a...ijkl");
    }

    #[test]
    fn test_expand_env_var_keeps_unknown() {
        assert_eq!(
            expand_env_var_in_string("${MCPILOT_SURELY_UNSET_VAR}/x"),
            "${MCPILOT_SURELY_UNSET_VAR}/x"
        );
    }
}
