//! Seams between the context manager and the remote data clients.
//!
//! Each trait mirrors the failure policy of its client: weather errors
//! propagate, air quality and pollen collapse to `None`, news collapses to
//! empty article lists (only invalid category names are errors).

use async_trait::async_trait;

use crate::allergy::{AirQuality, PollenForecast};
use crate::error::Result;
use crate::news::NewsArticle;
use crate::search::{SearchConfig, SearchResponse};
use crate::weather::{RealtimeWeather, Units};

#[async_trait]
pub trait WeatherSource: Send + Sync {
    async fn current_conditions(&self, latitude: f64, longitude: f64, units: Units) -> Result<RealtimeWeather>;
}

#[async_trait]
pub trait AllergySource: Send + Sync {
    async fn air_quality(&self, latitude: f64, longitude: f64) -> Option<AirQuality>;

    async fn pollen_forecast(&self, latitude: f64, longitude: f64, days: u8) -> Option<PollenForecast>;
}

#[async_trait]
pub trait NewsSource: Send + Sync {
    /// Articles per category, in the order requested.
    async fn headlines(&self, categories: &[String], limit_per_category: usize) -> Result<Vec<(String, Vec<NewsArticle>)>>;

    /// Display label for a category ("US", "World", ...).
    fn label(&self, category: &str) -> String;
}

#[async_trait]
pub trait SearchSource: Send + Sync {
    async fn search(&self, query: &str, system_prompt: Option<&str>, config: &SearchConfig) -> Result<SearchResponse>;
}
