use crate::models::{ToolChoice, ToolDefinition};
use serde::{Deserialize, Serialize};

/// Picks the tool-choice directive for the first completion call of a turn.
/// Follow-up calls within the turn always use [`ToolChoice::Auto`].
pub trait ToolChoicePolicy: Send + Sync {
    fn choose(&self, user_text: &str, tools: &[ToolDefinition]) -> ToolChoice;
}

/// Lets the model decide.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoToolChoice;

impl ToolChoicePolicy for AutoToolChoice {
    fn choose(&self, _user_text: &str, _tools: &[ToolDefinition]) -> ToolChoice {
        ToolChoice::Auto
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SteeringRule {
    pub keywords: Vec<String>,
    pub tool: String,
}

/// Forces a tool when the user's text mentions one of its keywords.
///
/// Rules are checked in order and matching is case-insensitive. A rule whose
/// tool is not currently advertised is skipped.
#[derive(Debug, Clone, Default)]
pub struct KeywordToolChoice {
    rules: Vec<SteeringRule>,
}

impl KeywordToolChoice {
    pub fn new(rules: Vec<SteeringRule>) -> Self {
        Self { rules }
    }
}

impl ToolChoicePolicy for KeywordToolChoice {
    fn choose(&self, user_text: &str, tools: &[ToolDefinition]) -> ToolChoice {
        let text = user_text.to_lowercase();

        for rule in &self.rules {
            if !tools.iter().any(|t| t.name == rule.tool) {
                continue;
            }
            let hit = rule
                .keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .any(|k| !k.is_empty() && text.contains(&k));
            if hit {
                return ToolChoice::Tool(rule.tool.clone());
            }
        }

        ToolChoice::Auto
    }
}
