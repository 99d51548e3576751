//! Perplexity search / question-answering client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

use crate::cache::{CacheKey, Cached, DEFAULT_TTL};
use crate::error::{require_env, require_key, Error, Result};
use crate::http;
use crate::sources::SearchSource;

pub const API_URL: &str = "https://api.perplexity.ai/chat/completions";
pub const API_KEY_ENV: &str = "PERPLEXITY_API_KEY";
pub const DEFAULT_MODEL: &str = "llama-3.1-sonar-small-128k-online";
pub const DEFAULT_SYSTEM_PROMPT: &str = "Be precise and concise.";

const SERVICE: &str = "search";

/// Per-call sampling and search settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    pub model: String,
    pub temperature: f64,
    pub top_p: f64,
    pub max_tokens: Option<u32>,
    pub search_domain_filter: Option<Vec<String>>,
    pub return_images: bool,
    pub return_related_questions: bool,
    /// "month", "week", "day" or "hour"
    pub search_recency_filter: Option<String>,
    pub top_k: u32,
    pub stream: bool,
    pub presence_penalty: f64,
    pub frequency_penalty: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.2,
            top_p: 0.9,
            max_tokens: None,
            search_domain_filter: None,
            return_images: false,
            return_related_questions: false,
            search_recency_filter: Some("month".to_string()),
            top_k: 0,
            stream: false,
            presence_penalty: 0.0,
            frequency_penalty: 1.0,
        }
    }
}

impl SearchConfig {
    /// Focused settings for context assembly: low temperature, last day only,
    /// no related questions.
    pub fn focused() -> Self {
        Self {
            temperature: 0.1,
            search_recency_filter: Some("day".to_string()),
            return_related_questions: false,
            ..Self::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchChoice {
    #[serde(default)]
    pub index: u32,
    pub message: SearchMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchUsage {
    #[serde(default)]
    pub prompt_tokens: Option<u32>,
    #[serde(default)]
    pub completion_tokens: Option<u32>,
    #[serde(default)]
    pub total_tokens: Option<u32>,
}

/// Full provider response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub choices: Vec<SearchChoice>,
    #[serde(default)]
    pub citations: Vec<String>,
    #[serde(default)]
    pub related_questions: Vec<String>,
    #[serde(default)]
    pub usage: Option<SearchUsage>,
}

impl SearchResponse {
    /// Content of the first choice.
    pub fn answer(&self) -> Option<&str> {
        self.choices.first().map(|c| c.message.content.as_str())
    }
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    model: &'a str,
    messages: Vec<SearchMessage>,
    temperature: f64,
    top_p: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    search_domain_filter: &'a Option<Vec<String>>,
    return_images: bool,
    return_related_questions: bool,
    search_recency_filter: &'a Option<String>,
    top_k: u32,
    stream: bool,
    presence_penalty: f64,
    frequency_penalty: f64,
}

pub struct SearchClient {
    api_key: String,
    api_url: String,
    timeout: Duration,
    defaults: SearchConfig,
    client: reqwest::Client,
    cache: Cached<SearchResponse>,
}

impl SearchClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            api_key: require_key(SERVICE, api_key)?,
            api_url: API_URL.to_string(),
            timeout: Duration::from_secs(30),
            defaults: SearchConfig::default(),
            client: http::build_client()?,
            cache: Cached::new("search", DEFAULT_TTL),
        })
    }

    /// Read the key from `PERPLEXITY_API_KEY`.
    pub fn from_env() -> Result<Self> {
        Self::new(require_env(API_KEY_ENV)?)
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Baseline configuration used when a call passes none.
    pub fn with_defaults(mut self, defaults: SearchConfig) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache = Cached::new("search", ttl);
        self
    }

    pub fn defaults(&self) -> &SearchConfig {
        &self.defaults
    }

    /// Run a search and return the full response.
    ///
    /// `system_prompt: None` sends only the user message.
    pub async fn search(
        &self,
        query: &str,
        system_prompt: Option<&str>,
        config: Option<&SearchConfig>,
    ) -> Result<SearchResponse> {
        if query.trim().is_empty() {
            return Err(Error::InvalidInput("search query is empty".to_string()));
        }
        let config = config.unwrap_or(&self.defaults);
        let config_key = serde_json::to_string(config).map_err(|e| Error::parse(SERVICE, e.to_string()))?;
        let key = CacheKey::new("search")
            .arg(query)
            .named("system_prompt", system_prompt.unwrap_or(""))
            .named("config", config_key);

        let fetch = async {
            let body = SearchRequest {
                model: &config.model,
                messages: prepare_messages(query, system_prompt),
                temperature: config.temperature,
                top_p: config.top_p,
                max_tokens: config.max_tokens,
                search_domain_filter: &config.search_domain_filter,
                return_images: config.return_images,
                return_related_questions: config.return_related_questions,
                search_recency_filter: &config.search_recency_filter,
                top_k: config.top_k,
                stream: config.stream,
                presence_penalty: config.presence_penalty,
                frequency_penalty: config.frequency_penalty,
            };
            let request = self
                .client
                .post(&self.api_url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(&body);
            let response: SearchResponse = http::send_json(SERVICE, request, self.timeout).await?;
            info!(model = %config.model, choices = response.choices.len(), "search completed");
            Ok::<_, Error>(response)
        };

        self.cache.get_or_fetch(&key, fetch).await
    }

    /// Ask a question with the default configuration and return only the answer text.
    ///
    /// `system_prompt: None` sends no system message; use [`SearchClient::ask_default`]
    /// for the stock "Be precise and concise." prompt.
    pub async fn ask(&self, question: &str, system_prompt: Option<&str>) -> Result<String> {
        let response = self.search(question, system_prompt, None).await?;
        response
            .answer()
            .map(str::to_string)
            .ok_or_else(|| Error::parse(SERVICE, "response has no choices"))
    }

    /// [`SearchClient::ask`] with [`DEFAULT_SYSTEM_PROMPT`].
    pub async fn ask_default(&self, question: &str) -> Result<String> {
        self.ask(question, Some(DEFAULT_SYSTEM_PROMPT)).await
    }
}

#[async_trait]
impl SearchSource for SearchClient {
    async fn search(&self, query: &str, system_prompt: Option<&str>, config: &SearchConfig) -> Result<SearchResponse> {
        SearchClient::search(self, query, system_prompt, Some(config)).await
    }
}

fn prepare_messages(query: &str, system_prompt: Option<&str>) -> Vec<SearchMessage> {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = system_prompt.filter(|s| !s.is_empty()) {
        messages.push(SearchMessage {
            role: "system".to_string(),
            content: system.to_string(),
        });
    }
    messages.push(SearchMessage {
        role: "user".to_string(),
        content: query.to_string(),
    });
    messages
}
