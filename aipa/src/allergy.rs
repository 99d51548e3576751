//! Google Air Quality and Pollen client.
//!
//! Failures never reach the caller: they are logged and the lookup yields `None`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{info, warn};

use crate::cache::{CacheKey, Cached, DEFAULT_TTL};
use crate::error::{require_env, require_key, Error, Result};
use crate::http;
use crate::sources::AllergySource;

pub const AIR_QUALITY_URL: &str = "https://airquality.googleapis.com/v1/currentConditions:lookup";
pub const POLLEN_URL: &str = "https://pollen.googleapis.com/v1/forecast:lookup";
pub const API_KEY_ENV: &str = "GOOGLE_MAPS_API_KEY";
/// The pollen API forecasts at most five days ahead.
pub const MAX_POLLEN_DAYS: u8 = 5;

const SERVICE: &str = "air-quality";
const POLLEN_SERVICE: &str = "pollen";

/// Current air quality conditions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AirQuality {
    #[serde(default)]
    pub date_time: Option<String>,
    #[serde(default)]
    pub indexes: Vec<AqiIndex>,
    #[serde(default)]
    pub pollutants: Vec<Pollutant>,
    #[serde(default)]
    pub health_recommendations: Option<HealthRecommendations>,
}

impl AirQuality {
    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
            && self.pollutants.is_empty()
            && self
                .health_recommendations
                .as_ref()
                .and_then(|r| r.general_population.as_ref())
                .is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AqiIndex {
    pub code: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub aqi: Option<i64>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub dominant_pollutant: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pollutant {
    pub code: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub concentration: Option<Concentration>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Concentration {
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub units: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthRecommendations {
    #[serde(default)]
    pub general_population: Option<String>,
    #[serde(default)]
    pub elderly: Option<String>,
    #[serde(default)]
    pub lung_disease_population: Option<String>,
    #[serde(default)]
    pub heart_disease_population: Option<String>,
    #[serde(default)]
    pub athletes: Option<String>,
    #[serde(default)]
    pub pregnant_women: Option<String>,
    #[serde(default)]
    pub children: Option<String>,
}

/// Pollen forecast, one entry per day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollenForecast {
    #[serde(default)]
    pub region_code: Option<String>,
    #[serde(default)]
    pub daily_info: Vec<DailyPollenInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyPollenInfo {
    #[serde(default)]
    pub date: Option<ForecastDate>,
    #[serde(default)]
    pub pollen_type_info: Vec<PollenTypeInfo>,
    #[serde(default)]
    pub plant_info: Vec<PlantInfo>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastDate {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

impl std::fmt::Display for ForecastDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollenTypeInfo {
    pub code: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub in_season: Option<bool>,
    #[serde(default)]
    pub index_info: Option<IndexInfo>,
    #[serde(default)]
    pub health_recommendations: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlantInfo {
    pub code: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub in_season: Option<bool>,
    #[serde(default)]
    pub index_info: Option<IndexInfo>,
}

/// Universal Pollen Index value and its category ("Low", "Moderate", ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexInfo {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub value: Option<i64>,
    #[serde(default)]
    pub category: Option<String>,
}

pub struct AllergyClient {
    api_key: String,
    air_quality_url: String,
    pollen_url: String,
    timeout: Duration,
    client: reqwest::Client,
    air_quality_cache: Cached<AirQuality>,
    pollen_cache: Cached<PollenForecast>,
}

impl AllergyClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            api_key: require_key(SERVICE, api_key)?,
            air_quality_url: AIR_QUALITY_URL.to_string(),
            pollen_url: POLLEN_URL.to_string(),
            timeout: Duration::from_secs(10),
            client: http::build_client()?,
            air_quality_cache: Cached::new("air_quality", DEFAULT_TTL),
            pollen_cache: Cached::new("pollen", DEFAULT_TTL),
        })
    }

    /// Read the key from `GOOGLE_MAPS_API_KEY`.
    pub fn from_env() -> Result<Self> {
        Self::new(require_env(API_KEY_ENV)?)
    }

    pub fn with_urls(mut self, air_quality_url: impl Into<String>, pollen_url: impl Into<String>) -> Self {
        self.air_quality_url = air_quality_url.into();
        self.pollen_url = pollen_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.air_quality_cache = Cached::new("air_quality", ttl);
        self.pollen_cache = Cached::new("pollen", ttl);
        self
    }

    /// Current air quality, or `None` if the lookup failed.
    pub async fn get_air_quality(&self, latitude: f64, longitude: f64) -> Option<AirQuality> {
        let key = CacheKey::new("air_quality").arg(latitude).arg(longitude);
        let fetch = async {
            let body = json!({
                "universalAqi": true,
                "location": {"latitude": latitude, "longitude": longitude},
                "extraComputations": [
                    "HEALTH_RECOMMENDATIONS",
                    "DOMINANT_POLLUTANT_CONCENTRATION",
                    "POLLUTANT_CONCENTRATION",
                    "LOCAL_AQI",
                    "POLLUTANT_ADDITIONAL_INFO"
                ],
                "languageCode": "en"
            });
            let request = self
                .client
                .post(&self.air_quality_url)
                .query(&[("key", self.api_key.as_str())])
                .json(&body);
            let data: AirQuality = http::send_json(SERVICE, request, self.timeout).await?;
            info!(indexes = data.indexes.len(), pollutants = data.pollutants.len(), "fetched air quality");
            Ok::<_, Error>(data)
        };

        match self.air_quality_cache.get_or_fetch(&key, fetch).await {
            Ok(data) => Some(data),
            Err(e) => {
                warn!(%e, latitude, longitude, "error fetching air quality data");
                None
            }
        }
    }

    /// Pollen forecast for up to five days, or `None` if the lookup failed.
    pub async fn get_pollen_forecast(&self, latitude: f64, longitude: f64, days: u8) -> Option<PollenForecast> {
        let days = days.clamp(1, MAX_POLLEN_DAYS);
        let key = CacheKey::new("pollen")
            .arg(latitude)
            .arg(longitude)
            .named("days", days);
        let fetch = async {
            let (lat, lon, days) = (latitude.to_string(), longitude.to_string(), days.to_string());
            let request = self.client.get(&self.pollen_url).query(&[
                ("key", self.api_key.as_str()),
                ("location.latitude", lat.as_str()),
                ("location.longitude", lon.as_str()),
                ("days", days.as_str()),
                ("languageCode", "en"),
                ("plantsDescription", "true"),
            ]);
            let data: PollenForecast = http::send_json(POLLEN_SERVICE, request, self.timeout).await?;
            info!(days = data.daily_info.len(), "fetched pollen forecast");
            Ok::<_, Error>(data)
        };

        match self.pollen_cache.get_or_fetch(&key, fetch).await {
            Ok(data) => Some(data),
            Err(e) => {
                warn!(%e, latitude, longitude, "error fetching pollen forecast");
                None
            }
        }
    }
}

#[async_trait]
impl AllergySource for AllergyClient {
    async fn air_quality(&self, latitude: f64, longitude: f64) -> Option<AirQuality> {
        self.get_air_quality(latitude, longitude).await
    }

    async fn pollen_forecast(&self, latitude: f64, longitude: f64, days: u8) -> Option<PollenForecast> {
        self.get_pollen_forecast(latitude, longitude, days).await
    }
}
