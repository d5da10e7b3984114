//! OpenAI-compatible chat completions client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use secrecy::ExposeSecret;
use tracing::{debug, info, warn};

use crate::agent::types::*;
use crate::config::OpenAiConfig;
use crate::error::{Error, Result};

/// A tool-calling chat model.
///
/// The agent loop only talks to this trait, so tests can script replies
/// without a network.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Model identifier sent with each request
    fn model_name(&self) -> &str;

    /// Request one completion for `messages`, offering `tools`
    async fn complete(
        &self,
        messages: Vec<Message>,
        tools: Vec<ToolDefinition>,
        options: GenerationOptions,
    ) -> Result<ChatCompletionResponse>;
}

/// Client for the OpenAI chat completions API
#[derive(Clone)]
pub struct OpenAiClient {
    /// HTTP client
    client: Client,
    /// Configuration
    config: OpenAiConfig,
}

impl OpenAiClient {
    /// Create a new client
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let mut headers = header::HeaderMap::new();

        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("Bearer {}", config.api_key.expose_secret()))
                .map_err(|e| Error::Config(format!("Invalid API key format: {}", e)))?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(OpenAiClient { client, config })
    }

    /// Create a chat completion without tools
    pub async fn chat(
        &self,
        messages: Vec<Message>,
        options: GenerationOptions,
    ) -> Result<ChatCompletionResponse> {
        self.complete(messages, Vec::new(), options).await
    }

    fn build_request(
        &self,
        messages: Vec<Message>,
        tools: Vec<ToolDefinition>,
        options: GenerationOptions,
    ) -> ChatCompletionRequest {
        let (tools, tool_choice) = if tools.is_empty() {
            (None, None)
        } else {
            (Some(tools), Some("auto".to_string()))
        };

        ChatCompletionRequest {
            model: self.config.model.clone(),
            messages,
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            stream: false,
            tools,
            tool_choice,
        }
    }

    async fn send_request(&self, request: ChatCompletionRequest) -> Result<ChatCompletionResponse> {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));

        debug!(
            model = %request.model,
            messages = request.messages.len(),
            "Sending chat completion request"
        );

        let response = self.client.post(&url).json(&request).send().await?;
        let status = response.status();

        if status.is_success() {
            let body = response.json::<ChatCompletionResponse>().await?;

            if let Some(ref usage) = body.usage {
                info!(model = %body.model, tokens = usage.total_tokens, "Chat completion");
            }

            Ok(body)
        } else {
            let error_text = response.text().await.unwrap_or_default();

            match status.as_u16() {
                429 => {
                    warn!("Rate limit exceeded: {}", error_text);
                    Err(Error::RateLimit(error_text))
                }
                401 => Err(Error::Unauthorized("Invalid API key".to_string())),
                _ => Err(Error::Provider(format!("API error ({}): {}", status, error_text))),
            }
        }
    }
}

#[async_trait]
impl ChatModel for OpenAiClient {
    fn model_name(&self) -> &str {
        &self.config.model
    }

    async fn complete(
        &self,
        messages: Vec<Message>,
        tools: Vec<ToolDefinition>,
        options: GenerationOptions,
    ) -> Result<ChatCompletionResponse> {
        let request = self.build_request(messages, tools, options);
        self.send_request(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolKind;
    use secrecy::SecretString;

    fn client() -> OpenAiClient {
        let config = OpenAiConfig {
            api_key: SecretString::from("sk-test"),
            ..Default::default()
        };
        OpenAiClient::new(config).unwrap()
    }

    #[test]
    fn test_request_without_tools_omits_tool_choice() {
        let request = client().build_request(
            vec![Message::user("hi")],
            Vec::new(),
            GenerationOptions::precise(),
        );
        let body = serde_json::to_value(&request).unwrap();
        assert!(body.get("tools").is_none());
        assert!(body.get("tool_choice").is_none());
        assert_eq!(body["stream"], false);
        assert_eq!(body["temperature"], 0.0);
    }

    #[test]
    fn test_request_with_tools_is_auto() {
        let request = client().build_request(
            vec![Message::user("describe tasks")],
            vec![ToolKind::DescribeTables.to_definition()],
            GenerationOptions::precise(),
        );
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["model"], "gpt-3.5-turbo");
        assert_eq!(body["tool_choice"], "auto");
        assert_eq!(body["tools"][0]["function"]["name"], "describe_tables");
    }
}
