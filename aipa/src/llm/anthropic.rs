//! Anthropic Messages API chat model.
//!
//! System-role messages (persona and context) are joined into the top-level
//! `system` field; the remaining turns are sent in order.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{ChatMessage, ChatModel, ChatReply, UsageMetadata};
use crate::error::{require_key, Error, Result};
use crate::http;

const ANTHROPIC_VERSION: &str = "2023-06-01";
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_MAX_TOKENS: usize = 1024;

const SERVICE: &str = "anthropic";

pub struct AnthropicChatModel {
    base_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
    max_tokens: usize,
    temperature: Option<f32>,
    client: reqwest::Client,
}

impl AnthropicChatModel {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        Ok(Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: require_key(SERVICE, api_key)?,
            model: model.into(),
            timeout: super::remote::DEFAULT_TIMEOUT,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: None,
            client: http::build_client()?,
        })
    }

    /// Custom base URL (proxies, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_defaults(mut self, timeout: Duration, max_tokens: usize, temperature: Option<f32>) -> Self {
        self.timeout = timeout;
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    fn split_system(messages: &[ChatMessage]) -> (Option<String>, Vec<ApiMessage>) {
        let mut system_parts: Vec<&str> = Vec::new();
        let mut turns = Vec::new();

        for msg in messages {
            if msg.role.is_system() {
                system_parts.push(&msg.content);
            } else {
                turns.push(ApiMessage {
                    role: msg.role.wire_name(),
                    content: msg.content.clone(),
                });
            }
        }

        let system = if system_parts.is_empty() {
            None
        } else {
            Some(system_parts.join("\n\n"))
        };
        (system, turns)
    }
}

#[async_trait]
impl ChatModel for AnthropicChatModel {
    async fn invoke(&self, messages: &[ChatMessage]) -> Result<ChatReply> {
        let (system, turns) = Self::split_system(messages);
        let body = ApiRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system,
            messages: turns,
            temperature: self.temperature,
        };

        debug!(model = %self.model, messages = messages.len(), "sending messages request");

        let request = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&body);
        let response: ApiResponse = http::send_json(SERVICE, request, self.timeout).await?;

        let content: Vec<&str> = response
            .content
            .iter()
            .filter(|b| b.kind == "text")
            .filter_map(|b| b.text.as_deref())
            .collect();
        if content.is_empty() {
            return Err(Error::parse(SERVICE, "response has no text content"));
        }

        let usage = response
            .usage
            .map(|u| UsageMetadata {
                prompt_tokens: u.input_tokens,
                completion_tokens: u.output_tokens,
                total_tokens: u.input_tokens + u.output_tokens,
            })
            .unwrap_or_default();

        Ok(ChatReply {
            content: content.join(""),
            usage,
            model: response.model.unwrap_or_else(|| self.model.clone()),
        })
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    max_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    input_tokens: usize,
    #[serde(default)]
    output_tokens: usize,
}
