//! Tomorrow.io weather client.
//!
//! Both operations are rate limited (25 requests / 5 minutes each) and cached
//! for five minutes. Unlike the other clients, failures are logged and then
//! returned to the caller.

use async_trait::async_trait;
use std::time::Duration;
use tracing::{error, info};

use crate::cache::{CacheKey, Cached, DEFAULT_TTL};
use crate::error::{require_env, require_key, Error, Result};
use crate::http;
use crate::rate_limit::RateLimiter;
use crate::sources::WeatherSource;

mod conversions;
mod types;

pub use conversions::{
    celsius_to_fahrenheit, describe_weather_code, meters_per_second_to_mph, millimeters_to_inches, whole, Units,
};
pub use types::{Forecast, ForecastInterval, RealtimeWeather, Timeline, WeatherValues};
use types::{ForecastResponse, RealtimeResponse};

pub const DEFAULT_BASE_URL: &str = "https://api.tomorrow.io/v4/weather";
pub const API_KEY_ENV: &str = "TOMORROW_IO_API_KEY";
pub const DEFAULT_MAX_REQUESTS: u32 = 25;
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(300);

const SERVICE: &str = "weather";

/// Fields requested when the caller does not name any.
pub const DEFAULT_FIELDS: &[&str] = &[
    "temperature",
    "humidity",
    "windSpeed",
    "windDirection",
    "precipitationProbability",
    "precipitationType",
    "weatherCode",
];

pub struct WeatherClient {
    api_key: String,
    base_url: String,
    timeout: Duration,
    client: reqwest::Client,
    realtime_limiter: RateLimiter,
    forecast_limiter: RateLimiter,
    realtime_cache: Cached<RealtimeWeather>,
    forecast_cache: Cached<Forecast>,
}

impl WeatherClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            api_key: require_key(SERVICE, api_key)?,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(10),
            client: http::build_client()?,
            realtime_limiter: RateLimiter::new("weather.realtime", DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW),
            forecast_limiter: RateLimiter::new("weather.forecast", DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW),
            realtime_cache: Cached::new("weather.realtime", DEFAULT_TTL),
            forecast_cache: Cached::new("weather.forecast", DEFAULT_TTL),
        })
    }

    /// Read the key from `TOMORROW_IO_API_KEY`.
    pub fn from_env() -> Result<Self> {
        Self::new(require_env(API_KEY_ENV)?)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_rate_limit(mut self, max_requests: u32, window: Duration) -> Self {
        self.realtime_limiter = RateLimiter::new("weather.realtime", max_requests, window);
        self.forecast_limiter = RateLimiter::new("weather.forecast", max_requests, window);
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.realtime_cache = Cached::new("weather.realtime", ttl);
        self.forecast_cache = Cached::new("weather.forecast", ttl);
        self
    }

    /// Current conditions at `(latitude, longitude)`.
    pub async fn get_realtime(
        &self,
        location: (f64, f64),
        fields: Option<&[&str]>,
        units: Units,
    ) -> Result<RealtimeWeather> {
        let (lat, lon) = location;
        let fields = fields.unwrap_or(DEFAULT_FIELDS).join(",");
        let key = CacheKey::new("weather.realtime")
            .arg(lat)
            .arg(lon)
            .named("fields", &fields)
            .named("units", units);

        let fetch = self.realtime_limiter.throttle(async {
            let coordinates = format!("{},{}", lat, lon);
            let request = self.client.get(format!("{}/realtime", self.base_url)).query(&[
                ("apikey", self.api_key.as_str()),
                ("location", coordinates.as_str()),
                ("fields", fields.as_str()),
                ("units", units.as_str()),
            ]);
            let response: RealtimeResponse = http::send_json(SERVICE, request, self.timeout).await?;
            Ok::<_, Error>(response.data)
        });

        let result = self.realtime_cache.get_or_fetch(&key, fetch).await;
        if let Err(e) = &result {
            error!(%e, lat, lon, "error fetching current weather");
        }
        result
    }

    /// Forecast at `(latitude, longitude)` with the given timestep ("1h", "1d", ...).
    pub async fn get_forecast(
        &self,
        location: (f64, f64),
        timesteps: &str,
        fields: Option<&[&str]>,
        units: Units,
    ) -> Result<Forecast> {
        let (lat, lon) = location;
        let fields = fields.unwrap_or(DEFAULT_FIELDS).join(",");
        let key = CacheKey::new("weather.forecast")
            .arg(lat)
            .arg(lon)
            .named("timesteps", timesteps)
            .named("fields", &fields)
            .named("units", units);

        let fetch = self.forecast_limiter.throttle(async {
            let coordinates = format!("{},{}", lat, lon);
            let request = self.client.get(format!("{}/timelines", self.base_url)).query(&[
                ("apikey", self.api_key.as_str()),
                ("location", coordinates.as_str()),
                ("fields", fields.as_str()),
                ("timesteps", timesteps),
                ("units", units.as_str()),
            ]);
            let response: ForecastResponse = http::send_json(SERVICE, request, self.timeout).await?;
            info!(
                intervals = response.data.intervals().len(),
                timesteps, "fetched weather forecast"
            );
            Ok::<_, Error>(response.data)
        });

        let result = self.forecast_cache.get_or_fetch(&key, fetch).await;
        if let Err(e) = &result {
            error!(%e, lat, lon, "error fetching forecast");
        }
        result
    }
}

#[async_trait]
impl WeatherSource for WeatherClient {
    async fn current_conditions(&self, latitude: f64, longitude: f64, units: Units) -> Result<RealtimeWeather> {
        self.get_realtime((latitude, longitude), None, units).await
    }
}
