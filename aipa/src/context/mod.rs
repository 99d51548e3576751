//! Situational context assembly.
//!
//! The manager fans out to every data source at once, waits for all of them
//! and renders one text block in a fixed section order: time, weather, air
//! quality, pollen, news, web search. A failing source only costs its own
//! section.
//!
//! The location is plain owned state. Changing it while an `assemble` call is
//! in flight is the caller's problem; `set_location` takes `&mut self`, so the
//! borrow checker already rules it out for a single owner.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use common::Location;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::conversation::Conversation;
use crate::search::SearchConfig;
use crate::sources::{AllergySource, NewsSource, SearchSource, WeatherSource};
use crate::weather::Units;

pub mod format;

pub const DEFAULT_NEWS_CATEGORIES: &[&str] = &["austin", "latest", "us", "world"];
pub const DEFAULT_STORIES_PER_CATEGORY: usize = 3;

const POLLEN_DAYS: u8 = 1;
const WEB_SEARCH_PROMPT: &str =
    "Provide a concise summary of the most relevant and recent information. Focus on factual data.";

/// The four remote data sources, constructed once and shared.
#[derive(Clone)]
pub struct Sources {
    pub weather: Arc<dyn WeatherSource>,
    pub allergy: Arc<dyn AllergySource>,
    pub news: Arc<dyn NewsSource>,
    pub search: Arc<dyn SearchSource>,
}

#[derive(Debug, Clone)]
pub struct ContextOptions {
    pub units: Units,
    pub news_categories: Vec<String>,
    pub stories_per_category: usize,
    /// Used by `push_context_to`; `assemble` takes the flag per call
    pub include_summaries: bool,
    /// Settings for the web-search section
    pub search: SearchConfig,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            units: Units::default(),
            news_categories: DEFAULT_NEWS_CATEGORIES.iter().map(|c| c.to_string()).collect(),
            stories_per_category: DEFAULT_STORIES_PER_CATEGORY,
            include_summaries: true,
            search: SearchConfig::focused(),
        }
    }
}

pub struct ContextManager {
    location: Option<Location>,
    sources: Sources,
    options: ContextOptions,
}

impl ContextManager {
    pub fn new(location: Option<Location>, sources: Sources) -> Self {
        Self {
            location,
            sources,
            options: ContextOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ContextOptions) -> Self {
        self.options = options;
        self
    }

    pub fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }

    pub fn set_location(&mut self, location: Option<Location>) {
        self.location = location;
    }

    pub fn options(&self) -> &ContextOptions {
        &self.options
    }

    /// Now, in the location's timezone (UTC without a location).
    pub fn current_time(&self) -> DateTime<Tz> {
        let tz = self.location.as_ref().map_or(Tz::UTC, |l| l.timezone);
        Utc::now().with_timezone(&tz)
    }

    /// Build the context block.
    ///
    /// Weather, air quality and pollen are only attempted with a location.
    /// The web-search section needs both `include_web_search` and a
    /// non-blank `query`. Never fails: the time line is always present.
    pub async fn assemble(&self, query: Option<&str>, include_news_summaries: bool, include_web_search: bool) -> String {
        let coordinates = self.location.as_ref().map(Location::coordinates);
        let query = query.filter(|q| include_web_search && !q.trim().is_empty());

        let weather = async {
            let (lat, lon) = coordinates?;
            match self.sources.weather.current_conditions(lat, lon, self.options.units).await {
                Ok(weather) => Some(weather),
                Err(e) => {
                    warn!(error = %e, "weather unavailable, omitting section");
                    None
                }
            }
        };
        let air_quality = async {
            let (lat, lon) = coordinates?;
            Some(self.sources.allergy.air_quality(lat, lon).await)
        };
        let pollen = async {
            let (lat, lon) = coordinates?;
            Some(self.sources.allergy.pollen_forecast(lat, lon, POLLEN_DAYS).await)
        };
        let news = async {
            match self
                .sources
                .news
                .headlines(&self.options.news_categories, self.options.stories_per_category)
                .await
            {
                Ok(groups) => groups,
                Err(e) => {
                    warn!(error = %e, "news unavailable, omitting section");
                    Vec::new()
                }
            }
        };
        let search = async {
            let query = query?;
            match self
                .sources
                .search
                .search(query, Some(WEB_SEARCH_PROMPT), &self.options.search)
                .await
            {
                Ok(response) => response.answer().map(str::to_string),
                Err(e) => {
                    warn!(error = %e, "web search failed, omitting section");
                    None
                }
            }
        };

        let (weather, air_quality, pollen, news, search) = tokio::join!(weather, air_quality, pollen, news, search);

        let mut sections = vec![format::time_section(&self.current_time())];
        if let Some(text) = weather.and_then(|w| format::weather_section(&w, self.options.units)) {
            sections.push(text);
        }
        // Outer `None` means not attempted; inner `None` means the source had nothing.
        if let Some(data) = air_quality {
            sections.push(format::air_quality_section(data.as_ref()));
        }
        if let Some(data) = pollen {
            sections.push(format::pollen_section(data.as_ref()));
        }
        let news_source = &self.sources.news;
        if let Some(text) = format::news_section(
            &news,
            |category| news_source.label(category),
            include_news_summaries,
            self.options.stories_per_category,
        ) {
            sections.push(text);
        }
        if let Some(text) = search.as_deref().and_then(format::web_search_section) {
            sections.push(text);
        }

        debug!(sections = sections.len(), "context assembled");
        sections.join("\n\n")
    }

    /// Assemble with no query and replace the conversation's context message.
    pub async fn push_context_to(&self, conversation: &mut Conversation) {
        let context = self.assemble(None, self.options.include_summaries, true).await;
        info!(chars = context.len(), "refreshing conversation context");
        conversation.replace_context(context_message(&context));
    }
}

fn context_message(context: &str) -> String {
    format!(
        "Here is the current context for this interaction:\n{}\n\n\
         Use this information when it's relevant to the user's questions or when \
         providing time-sensitive or location-aware responses.",
        context
    )
}
