use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::DEFAULT_MODEL;
use crate::error::GatewayError;
use crate::llm::{GatewayRequest, LlmGateway};

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";

/// Configuration for the Anthropic API client
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    /// API key (from ANTHROPIC_API_KEY env var)
    pub api_key: String,
    /// Model to use (e.g., "claude-sonnet-4-20250514")
    pub model: String,
    /// Maximum tokens in response
    pub max_tokens: u32,
    /// Timeout for a single request
    pub timeout: Duration,
}

impl AnthropicConfig {
    /// Create config from environment variables
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .context("ANTHROPIC_API_KEY environment variable not set")?;

        Ok(Self::new(api_key, DEFAULT_MODEL.to_string()))
    }

    /// Create with custom settings
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            api_key,
            model,
            max_tokens: 8192,
            timeout: Duration::from_secs(120),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

/// Anthropic API client answering through a forced tool call
pub struct AnthropicClient {
    client: Client,
    config: AnthropicConfig,
}

impl AnthropicClient {
    pub fn new(config: AnthropicConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, config })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }
}

#[async_trait]
impl LlmGateway for AnthropicClient {
    async fn invoke(&self, request: &GatewayRequest) -> Result<serde_json::Value, GatewayError> {
        let schema = &request.response_schema;
        let body = AnthropicToolRequest {
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens,
            temperature: Some(request.temperature),
            system: Some(request.system.clone()),
            messages: vec![Message {
                role: "user".to_string(),
                content: request.prompt.clone(),
            }],
            tools: vec![Tool {
                name: schema.name.to_string(),
                description: schema.description.to_string(),
                input_schema: schema.schema.clone(),
            }],
            tool_choice: Some(ToolChoice {
                choice_type: "tool".to_string(),
                name: schema.name.to_string(),
            }),
        };

        debug!(
            "Sending {} request to {} ({} prompt chars)",
            schema.name,
            self.config.model,
            request.prompt.len()
        );

        let response = self
            .client
            .post(MESSAGES_URL)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::transient(format!("request to Anthropic API failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &text));
        }

        let response: AnthropicResponse = response.json().await.map_err(|e| {
            GatewayError::schema_violation(format!("failed to parse Anthropic API response: {}", e))
        })?;

        extract_tool_input(response, schema.name)
    }
}

fn classify_status(status: StatusCode, body: &str) -> GatewayError {
    let message = format!("Anthropic API error: {} - {}", status, body);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GatewayError::auth(message),
        _ => GatewayError::transient(message),
    }
}

/// Find the tool_use content block for `tool_name`
fn extract_tool_input(
    response: AnthropicResponse,
    tool_name: &str,
) -> Result<serde_json::Value, GatewayError> {
    response
        .content
        .into_iter()
        .find(|c| c.content_type == "tool_use" && c.name.as_deref() == Some(tool_name))
        .and_then(|c| c.input)
        .ok_or_else(|| GatewayError::schema_violation(format!("no {} tool_use block in response", tool_name)))
}

#[derive(Debug, Serialize)]
struct AnthropicToolRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<Message>,
    tools: Vec<Tool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<ToolChoice>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct Tool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct ToolChoice {
    #[serde(rename = "type")]
    choice_type: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    input: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayErrorKind;

    #[test]
    fn test_classify_status() {
        assert_eq!(
            classify_status(StatusCode::UNAUTHORIZED, "").kind,
            GatewayErrorKind::Auth
        );
        assert_eq!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, "slow down").kind,
            GatewayErrorKind::Transient
        );
        assert_eq!(
            classify_status(StatusCode::SERVICE_UNAVAILABLE, "").kind,
            GatewayErrorKind::Transient
        );
    }

    #[test]
    fn test_extract_tool_input() {
        let response: AnthropicResponse = serde_json::from_value(serde_json::json!({
            "content": [
                {"type": "text", "text": "Here are the codes."},
                {"type": "tool_use", "name": "submit_codes", "input": {"codes": []}}
            ]
        }))
        .unwrap();

        let input = extract_tool_input(response, "submit_codes").unwrap();
        assert_eq!(input, serde_json::json!({"codes": []}));
    }

    #[test]
    fn test_missing_tool_block_is_schema_violation() {
        let response: AnthropicResponse = serde_json::from_value(serde_json::json!({
            "content": [{"type": "text", "text": "I cannot help with that."}]
        }))
        .unwrap();

        let error = extract_tool_input(response, "submit_themes").unwrap_err();
        assert_eq!(error.kind, GatewayErrorKind::SchemaViolation);
    }

    #[test]
    fn test_with_model_overrides_default() {
        let config = AnthropicConfig::new("key".to_string(), DEFAULT_MODEL.to_string())
            .with_model("claude-opus-4-1");
        assert_eq!(config.model, "claude-opus-4-1");
    }
}
