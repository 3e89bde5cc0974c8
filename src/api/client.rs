use crate::api::models::RequestBody;
use crate::api::response::{format_api_error, parse_completion};
use crate::api::{Completion, CompletionTransport};
use crate::error::{AgentError, Result};
use crate::models::{Message, ToolChoice, ToolDefinition};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde_json::Value;
use tracing::debug;

/// HTTP client for an OpenAI-compatible `/chat/completions` endpoint.
pub struct ChatClient {
    http: reqwest::Client,
    endpoint: String,
    temperature: Option<f32>,
}

impl ChatClient {
    pub fn new(
        api_key: &str,
        endpoint: &str,
        user_agent: &str,
        temperature: Option<f32>,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key))
                .map_err(|e| AgentError::Config(format!("Invalid authorization header: {}", e)))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(user_agent)
            .build()?;

        Ok(Self {
            http,
            endpoint: endpoint.to_string(),
            temperature,
        })
    }
}

#[async_trait]
impl CompletionTransport for ChatClient {
    async fn send(
        &self,
        model: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
        tool_choice: &ToolChoice,
    ) -> Result<Completion> {
        let request_body = RequestBody::new(model, messages, tools, tool_choice, self.temperature);

        debug!(
            model,
            messages = messages.len(),
            tools = tools.len(),
            "sending completion request"
        );

        let response = self
            .http
            .post(&self.endpoint)
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AgentError::Api {
                status: status.as_u16(),
                message: format!(
                    "chat completion failed for model {:?}: {}",
                    model,
                    format_api_error(status.as_u16(), &error_text)
                ),
            });
        }

        let response_text = response.text().await?;
        let response_json: Value = serde_json::from_str(&response_text)?;
        let completion = parse_completion(&response_json)?;

        debug!(
            model,
            chars = completion.content.len(),
            tool_calls = completion.tool_calls.len(),
            "completion received"
        );

        Ok(completion)
    }
}
