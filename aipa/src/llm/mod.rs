use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{require_env, require_key, Error, Result};

pub mod anthropic;
pub mod remote;

/// Core trait for the chat-completion capability
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Complete the ordered conversation and return the assistant reply
    async fn invoke(&self, messages: &[ChatMessage]) -> Result<ChatReply>;

    /// Model identifier requests are sent with
    fn model(&self) -> &str;
}

/// Tagged message role.
///
/// `Persona` and `Context` are both sent as system messages; the tag is what
/// lets the conversation replace the context without touching the persona.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Persona,
    Context,
    User,
    Assistant,
}

impl Role {
    /// Role name on the wire.
    pub fn wire_name(&self) -> &'static str {
        match self {
            Role::Persona | Role::Context => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    pub fn is_system(&self) -> bool {
        matches!(self, Role::Persona | Role::Context)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn persona(content: impl Into<String>) -> Self {
        Self::new(Role::Persona, content)
    }

    pub fn context(content: impl Into<String>) -> Self {
        Self::new(Role::Context, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Response from a chat completion
#[derive(Debug, Clone)]
pub struct ChatReply {
    pub content: String,
    pub usage: UsageMetadata,
    pub model: String,
}

/// Token usage metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageMetadata {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Closed set of chat backends, chosen from the model name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
}

impl ProviderKind {
    /// Resolve the backend for a model name. Unknown names are rejected here,
    /// not on first use.
    pub fn from_model(model: &str) -> Result<Self> {
        let lower = model.to_ascii_lowercase();
        if lower.starts_with("gpt") || lower.starts_with("o1") || lower.starts_with("o3") {
            Ok(ProviderKind::OpenAi)
        } else if lower.starts_with("claude") {
            Ok(ProviderKind::Anthropic)
        } else {
            Err(Error::InvalidInput(format!("Unsupported model: {}", model)))
        }
    }

    /// Environment variable holding the API key for this backend.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OPENAI_API_KEY",
            ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
        }
    }
}

/// Settings for building a chat model.
#[derive(Debug, Clone, Default)]
pub struct ChatSettings {
    pub model: Option<String>,
    /// Explicit key; when absent it is read from `api_key_env` or the backend default
    pub api_key: Option<String>,
    pub api_key_env: Option<String>,
    pub api_url: Option<String>,
    pub timeout: Option<Duration>,
    pub max_tokens: Option<usize>,
    pub temperature: Option<f32>,
}

/// Build a chat model for the configured model name.
pub fn create_chat_model(settings: &ChatSettings) -> Result<Arc<dyn ChatModel>> {
    let model = settings.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_string());
    let kind = ProviderKind::from_model(&model)?;

    let api_key = match &settings.api_key {
        Some(key) => require_key("llm", key.clone())?,
        None => require_env(settings.api_key_env.as_deref().unwrap_or(kind.api_key_env()))?,
    };

    let provider: Arc<dyn ChatModel> = match kind {
        ProviderKind::OpenAi => {
            let mut provider = remote::RemoteChatModel::new(
                settings.api_url.as_deref().unwrap_or(remote::OPENAI_URL),
                api_key,
                model,
            )?;
            provider = provider.with_defaults(
                settings.timeout.unwrap_or(remote::DEFAULT_TIMEOUT),
                settings.max_tokens,
                settings.temperature,
            );
            Arc::new(provider)
        }
        ProviderKind::Anthropic => {
            let mut provider = anthropic::AnthropicChatModel::new(api_key, model)?;
            if let Some(url) = &settings.api_url {
                provider = provider.with_base_url(url);
            }
            provider = provider.with_defaults(
                settings.timeout.unwrap_or(remote::DEFAULT_TIMEOUT),
                settings.max_tokens.unwrap_or(anthropic::DEFAULT_MAX_TOKENS),
                settings.temperature,
            );
            Arc::new(provider)
        }
    };
    Ok(provider)
}
