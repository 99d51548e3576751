use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{ChatMessage, ChatModel, ChatReply, UsageMetadata};
use crate::error::{require_key, Error, Result};
use crate::http;

pub const OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const SERVICE: &str = "llm";

/// Chat model behind an OpenAI-compatible HTTP API
pub struct RemoteChatModel {
    base_url: String,
    api_key: String,
    model: String,
    default_timeout: Duration,
    default_max_tokens: Option<usize>,
    default_temperature: Option<f32>,
    client: reqwest::Client,
}

impl RemoteChatModel {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            base_url: base_url.into(),
            api_key: require_key(SERVICE, api_key)?,
            model: model.into(),
            default_timeout: DEFAULT_TIMEOUT,
            default_max_tokens: None,
            default_temperature: None,
            client: http::build_client()?,
        })
    }

    pub fn with_defaults(
        mut self,
        timeout: Duration,
        max_tokens: Option<usize>,
        temperature: Option<f32>,
    ) -> Self {
        self.default_timeout = timeout;
        self.default_max_tokens = max_tokens;
        self.default_temperature = temperature;
        self
    }
}

#[async_trait]
impl ChatModel for RemoteChatModel {
    async fn invoke(&self, messages: &[ChatMessage]) -> Result<ChatReply> {
        // Build OpenAI-compatible request
        let req_body = OpenAiRequest {
            model: &self.model,
            messages: messages
                .iter()
                .map(|m| Message {
                    role: m.role.wire_name().to_string(),
                    content: m.content.clone(),
                })
                .collect(),
            max_tokens: self.default_max_tokens,
            temperature: self.default_temperature,
        };

        debug!(model = %self.model, messages = messages.len(), "sending chat completion request");

        let request = self
            .client
            .post(&self.base_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&req_body);
        let resp_body: OpenAiResponse = http::send_json(SERVICE, request, self.default_timeout).await?;

        let choice = resp_body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::parse(SERVICE, "LLM response has no choices"))?;

        let usage = resp_body
            .usage
            .map(|u| UsageMetadata {
                prompt_tokens: u.prompt_tokens.unwrap_or(0),
                completion_tokens: u.completion_tokens.unwrap_or(0),
                total_tokens: u.total_tokens.unwrap_or(0),
            })
            .unwrap_or_default();

        Ok(ChatReply {
            content: choice.message.content.unwrap_or_default(),
            usage,
            model: resp_body.model.unwrap_or_else(|| self.model.clone()),
        })
    }

    fn model(&self) -> &str {
        &self.model
    }
}

// OpenAI API request/response structures
#[derive(Debug, Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    model: Option<String>,
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: Option<usize>,
    #[serde(default)]
    completion_tokens: Option<usize>,
    #[serde(default)]
    total_tokens: Option<usize>,
}
