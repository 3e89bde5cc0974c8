use crate::config::McpConfig;

pub const DEFAULT_SERVER_ARGS: &[&str] = &[
    "--from",
    "git+https://github.com/oraios/serena",
    "serena",
    "start-mcp-server",
];

/// Full argument list for the tool server process.
pub fn build_command_args(config: &McpConfig) -> Vec<String> {
    let mut args: Vec<String> = if config.args.is_empty() {
        DEFAULT_SERVER_ARGS.iter().map(|s| s.to_string()).collect()
    } else {
        config.args.clone()
    };

    if let Some(context) = normalize_context(&config.context) {
        args.push("--context".to_string());
        args.push(context);
    }

    // Dashboard and GUI log window stay off unless the args already say otherwise
    append_bool_flag(&mut args, "--enable-web-dashboard", config.enable_web_dashboard);
    append_bool_flag(&mut args, "--enable-gui-log-window", config.enable_gui_log_window);

    if let Some(project) = config.project_path.as_deref().filter(|p| !p.is_empty()) {
        args.push("--project".to_string());
        args.push(project.to_string());
    }

    args
}

/// Lowercases, hyphenates spaces and folds the desktop aliases together.
pub fn normalize_context(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    let normalized = trimmed.to_lowercase().replace(' ', "-");
    match normalized.as_str() {
        "claude-desktop" | "desktop" | "desktop-app" | "claude-desktop-app" => {
            Some("desktop-app".to_string())
        }
        _ => Some(normalized),
    }
}

fn append_bool_flag(args: &mut Vec<String>, flag: &str, value: bool) {
    if args.iter().any(|arg| arg == flag) {
        return;
    }
    args.push(flag.to_string());
    args.push(value.to_string());
}
