//! Application object: one context manager plus one conversation.
//!
//! Built once by the entry point from a loaded `common::Config`. The
//! `build_*` helpers are also used directly by the single-purpose CLI
//! commands, which only need one client each.

use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use common::Config;

use crate::allergy::{self, AllergyClient};
use crate::context::{ContextManager, ContextOptions, Sources, DEFAULT_NEWS_CATEGORIES, DEFAULT_STORIES_PER_CATEGORY};
use crate::conversation::Conversation;
use crate::error::{require_env, Result};
use crate::llm::{create_chat_model, ChatModel, ChatSettings};
use crate::news::NewsClient;
use crate::search::{self, SearchClient, SearchConfig};
use crate::weather::{self, Units, WeatherClient};

pub struct Assistant {
    context: ContextManager,
    conversation: Conversation,
}

impl Assistant {
    pub fn new(context: ContextManager, conversation: Conversation) -> Self {
        Self { context, conversation }
    }

    /// Build every client from `config`; missing API keys fail here.
    pub fn from_config(config: &Config) -> Result<Self> {
        let sources = Sources {
            weather: Arc::new(build_weather(config)?),
            allergy: Arc::new(build_allergy(config)?),
            news: Arc::new(build_news(config)?),
            search: Arc::new(build_search(config)?),
        };
        let context = ContextManager::new(Some(config.location()), sources).with_options(context_options(config)?);

        let model = build_chat_model(config)?;
        info!(model = %model.model(), "assistant ready");
        let conversation = Conversation::new(model, config.llm.persona.clone());

        Ok(Self::new(context, conversation))
    }

    /// Refresh the context message, then run one chat turn.
    pub async fn process_message(&mut self, message: &str) -> Result<String> {
        self.context.push_context_to(&mut self.conversation).await;
        self.conversation.chat(message).await
    }

    pub fn reset_conversation(&mut self) {
        self.conversation.reset();
    }

    pub fn context(&self) -> &ContextManager {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut ContextManager {
        &mut self.context
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }
}

fn seconds(value: Option<u64>) -> Option<Duration> {
    value.map(Duration::from_secs)
}

fn cache_ttl(config: &Config) -> Option<Duration> {
    seconds(config.cache.ttl_seconds)
}

pub fn units(config: &Config) -> Result<Units> {
    config
        .weather
        .units
        .as_deref()
        .map(str::parse::<Units>)
        .transpose()
        .map(Option::unwrap_or_default)
}

pub fn build_weather(config: &Config) -> Result<WeatherClient> {
    let section = &config.weather;
    let key = require_env(section.api_key_env.as_deref().unwrap_or(weather::API_KEY_ENV))?;
    let mut client = WeatherClient::new(key)?;
    if let Some(url) = &section.api_url {
        client = client.with_base_url(url);
    }
    if let Some(timeout) = seconds(section.timeout_seconds) {
        client = client.with_timeout(timeout);
    }
    let limits = &config.rate_limit;
    if limits.max_requests.is_some() || limits.window_seconds.is_some() {
        client = client.with_rate_limit(
            limits.max_requests.unwrap_or(weather::DEFAULT_MAX_REQUESTS),
            seconds(limits.window_seconds).unwrap_or(weather::DEFAULT_WINDOW),
        );
    }
    if let Some(ttl) = cache_ttl(config) {
        client = client.with_cache_ttl(ttl);
    }
    Ok(client)
}

pub fn build_allergy(config: &Config) -> Result<AllergyClient> {
    let section = &config.air_quality;
    let key = require_env(section.api_key_env.as_deref().unwrap_or(allergy::API_KEY_ENV))?;
    let mut client = AllergyClient::new(key)?.with_urls(
        section.air_quality_url.as_deref().unwrap_or(allergy::AIR_QUALITY_URL),
        section.pollen_url.as_deref().unwrap_or(allergy::POLLEN_URL),
    );
    if let Some(timeout) = seconds(section.timeout_seconds) {
        client = client.with_timeout(timeout);
    }
    if let Some(ttl) = cache_ttl(config) {
        client = client.with_cache_ttl(ttl);
    }
    Ok(client)
}

pub fn build_news(config: &Config) -> Result<NewsClient> {
    let section = &config.news;
    let mut client = NewsClient::new()?.with_timezone(section.timezone.unwrap_or(config.location().timezone));
    if let Some(timeout) = seconds(section.timeout_seconds) {
        client = client.with_timeout(timeout);
    }
    if let Some(ttl) = cache_ttl(config) {
        client = client.with_cache_ttl(ttl);
    }
    Ok(client)
}

pub fn build_search(config: &Config) -> Result<SearchClient> {
    let section = &config.search;
    let key = require_env(section.api_key_env.as_deref().unwrap_or(search::API_KEY_ENV))?;
    let mut client = SearchClient::new(key)?;
    if let Some(url) = &section.api_url {
        client = client.with_api_url(url);
    }
    if let Some(model) = &section.model {
        client = client.with_defaults(SearchConfig::default().with_model(model));
    }
    if let Some(timeout) = seconds(section.timeout_seconds) {
        client = client.with_timeout(timeout);
    }
    if let Some(ttl) = cache_ttl(config) {
        client = client.with_cache_ttl(ttl);
    }
    Ok(client)
}

pub fn build_chat_model(config: &Config) -> Result<Arc<dyn ChatModel>> {
    let section = &config.llm;
    create_chat_model(&ChatSettings {
        model: section.model.clone(),
        api_key: None,
        api_key_env: section.api_key_env.clone(),
        api_url: section.api_url.clone(),
        timeout: seconds(section.timeout_seconds),
        max_tokens: section.max_tokens,
        temperature: section.temperature,
    })
}

pub fn context_options(config: &Config) -> Result<ContextOptions> {
    let news = &config.news;
    let mut search = SearchConfig::focused();
    if let Some(model) = &config.search.model {
        search = search.with_model(model);
    }
    Ok(ContextOptions {
        units: units(config)?,
        news_categories: news
            .categories
            .clone()
            .unwrap_or_else(|| DEFAULT_NEWS_CATEGORIES.iter().map(|c| c.to_string()).collect()),
        stories_per_category: news.stories_per_category.unwrap_or(DEFAULT_STORIES_PER_CATEGORY),
        include_summaries: news.include_summaries.unwrap_or(true),
        search,
    })
}

/// Whether context assembly should run a web search for user queries.
pub fn web_search_enabled(config: &Config) -> bool {
    config.search.enabled.unwrap_or(true)
}
