//! RSS news client over a fixed table of category feeds.
//!
//! Category names are checked against the table before any request is made.
//! Fetch or parse failures are logged and yield an empty article list.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use feed_rs::model::Entry;
use feed_rs::parser;
use futures::future::join_all;
use std::time::Duration;
use tracing::{info, warn};

use crate::cache::{CacheKey, Cached, DEFAULT_TTL};
use crate::error::{Error, Result};
use crate::http;
use crate::sources::NewsSource;

const SERVICE: &str = "news";

/// Category name, display label and feed URL.
pub const FEEDS: &[(&str, &str, &str)] = &[
    ("latest", "Latest", "https://moxie.foxnews.com/google-publisher/latest.xml"),
    ("world", "World", "https://moxie.foxnews.com/google-publisher/world.xml"),
    ("us", "US", "https://moxie.foxnews.com/google-publisher/us.xml"),
    ("politics", "Politics", "https://moxie.foxnews.com/google-publisher/politics.xml"),
    ("science", "Science", "https://moxie.foxnews.com/google-publisher/science.xml"),
    ("health", "Health", "https://moxie.foxnews.com/google-publisher/health.xml"),
    ("sports", "Sports", "https://moxie.foxnews.com/google-publisher/sports.xml"),
    ("travel", "Travel", "https://moxie.foxnews.com/google-publisher/travel.xml"),
    ("tech", "Tech", "https://moxie.foxnews.com/google-publisher/tech.xml"),
    ("opinion", "Opinion", "https://moxie.foxnews.com/google-publisher/opinion.xml"),
    ("austin", "Austin", "https://www.fox7austin.com/rss/category/local-news"),
];

/// Categories fetched by `get_multiple_categories` when none are given.
pub const DEFAULT_CATEGORIES: &[&str] = &["latest", "world", "us"];

#[derive(Debug, Clone, PartialEq)]
pub struct NewsArticle {
    pub title: String,
    pub summary: String,
    pub link: String,
    pub published: DateTime<Tz>,
    pub category: String,
}

#[derive(Debug, Clone)]
struct FeedSource {
    category: &'static str,
    label: &'static str,
    url: String,
}

pub struct NewsClient {
    feeds: Vec<FeedSource>,
    timezone: Tz,
    timeout: Duration,
    client: reqwest::Client,
    cache: Cached<Vec<NewsArticle>>,
}

impl NewsClient {
    pub fn new() -> Result<Self> {
        Ok(Self {
            feeds: FEEDS
                .iter()
                .map(|&(category, label, url)| FeedSource {
                    category,
                    label,
                    url: url.to_string(),
                })
                .collect(),
            timezone: chrono_tz::America::Chicago,
            timeout: Duration::from_secs(10),
            client: http::build_client()?,
            cache: Cached::new("news", DEFAULT_TTL),
        })
    }

    /// Timezone publish times are converted into.
    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache = Cached::new("news", ttl);
        self
    }

    /// Point a known category at another feed URL. Unknown categories are rejected.
    pub fn with_feed_url(mut self, category: &str, url: impl Into<String>) -> Result<Self> {
        let feed = self
            .feeds
            .iter_mut()
            .find(|f| f.category == category)
            .ok_or_else(|| invalid_categories(&[category]))?;
        feed.url = url.into();
        Ok(self)
    }

    pub fn categories(&self) -> Vec<&'static str> {
        self.feeds.iter().map(|f| f.category).collect()
    }

    fn feed(&self, category: &str) -> Option<&FeedSource> {
        self.feeds.iter().find(|f| f.category == category)
    }

    /// Latest `limit` articles of one category.
    pub async fn get_news(&self, category: &str, limit: usize) -> Result<Vec<NewsArticle>> {
        let feed = self
            .feed(category)
            .ok_or_else(|| invalid_categories(&[category]))?;

        let key = CacheKey::new("news").arg(category).named("limit", limit);
        let fetch = async {
            let bytes = http::send_bytes(SERVICE, self.client.get(&feed.url), self.timeout).await?;
            let articles = parse_feed(&bytes, feed.category, limit, self.timezone)?;
            info!(category, articles = articles.len(), "fetched news feed");
            Ok::<_, Error>(articles)
        };

        match self.cache.get_or_fetch(&key, fetch).await {
            Ok(articles) => Ok(articles),
            Err(e) => {
                warn!(%e, category, url = %feed.url, "error fetching news feed");
                Ok(Vec::new())
            }
        }
    }

    /// Fetch several categories concurrently, preserving the requested order.
    ///
    /// Every name is validated before the first request goes out.
    pub async fn get_multiple_categories(
        &self,
        categories: Option<&[String]>,
        limit_per_category: usize,
    ) -> Result<Vec<(String, Vec<NewsArticle>)>> {
        let categories: Vec<String> = match categories {
            Some(list) => list.to_vec(),
            None => DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect(),
        };

        let invalid: Vec<&str> = categories
            .iter()
            .map(String::as_str)
            .filter(|c| self.feed(c).is_none())
            .collect();
        if !invalid.is_empty() {
            return Err(invalid_categories(&invalid));
        }

        let results = join_all(categories.iter().map(|c| self.get_news(c, limit_per_category))).await;

        categories
            .into_iter()
            .zip(results)
            .map(|(category, result)| result.map(|articles| (category, articles)))
            .collect()
    }

    pub fn label_for(&self, category: &str) -> String {
        self.feed(category)
            .map(|f| f.label.to_string())
            .unwrap_or_else(|| title_case(category))
    }
}

#[async_trait]
impl NewsSource for NewsClient {
    async fn headlines(&self, categories: &[String], limit_per_category: usize) -> Result<Vec<(String, Vec<NewsArticle>)>> {
        self.get_multiple_categories(Some(categories), limit_per_category).await
    }

    fn label(&self, category: &str) -> String {
        self.label_for(category)
    }
}

fn invalid_categories(names: &[&str]) -> Error {
    let valid: Vec<&str> = FEEDS.iter().map(|(c, _, _)| *c).collect();
    Error::InvalidInput(format!(
        "Invalid categories: {}. Choose from: {}",
        names.join(", "),
        valid.join(", ")
    ))
}

fn title_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Parse an RSS/Atom document into at most `limit` articles (`0` means all).
pub fn parse_feed(bytes: &[u8], category: &str, limit: usize, timezone: Tz) -> Result<Vec<NewsArticle>> {
    let feed = parser::parse(bytes).map_err(|e| Error::parse(SERVICE, e.to_string()))?;
    let take = if limit == 0 { usize::MAX } else { limit };
    Ok(feed
        .entries
        .iter()
        .take(take)
        .map(|entry| to_article(entry, category, timezone))
        .collect())
}

fn to_article(entry: &Entry, category: &str, timezone: Tz) -> NewsArticle {
    let title = entry
        .title
        .as_ref()
        .map(|t| t.content.trim().to_string())
        .unwrap_or_default();
    let link = entry.links.first().map(|l| l.href.clone()).unwrap_or_default();
    let published: DateTime<Utc> = entry.published.or(entry.updated).unwrap_or_else(Utc::now);
    let raw_summary = entry
        .summary
        .as_ref()
        .map(|s| s.content.clone())
        .or_else(|| entry.content.as_ref().and_then(|c| c.body.clone()))
        .unwrap_or_default();

    NewsArticle {
        title,
        summary: plain_text(&raw_summary),
        link,
        published: published.with_timezone(&timezone),
        category: category.to_string(),
    }
}

/// Strip markup from a feed summary and collapse whitespace.
fn plain_text(html: &str) -> String {
    if html.trim().is_empty() {
        return String::new();
    }
    let text = html2text::from_read(html.as_bytes(), 10_000).unwrap_or_else(|_| html.to_string());
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
