/*!
common/src/lib.rs

Shared configuration types and the `Location` data type for aipa.

This file provides:
- Config data structures (deserialized from TOML)
- An async loader that merges a default file with an override file
- The default location used when no `[location]` section is configured
*/

use anyhow::{Context, Result};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A geographic position plus the descriptive fields used when rendering context.
///
/// Latitude and longitude drive every remote lookup; `timezone` drives the
/// "current time" line. The remaining fields are informational.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default = "default_timezone")]
    pub timezone: Tz,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64, timezone: Tz) -> Self {
        Self {
            latitude,
            longitude,
            city: None,
            state: None,
            country: None,
            timezone,
        }
    }

    pub fn with_place(
        mut self,
        city: impl Into<String>,
        state: impl Into<String>,
        country: impl Into<String>,
    ) -> Self {
        self.city = Some(city.into());
        self.state = Some(state.into());
        self.country = Some(country.into());
        self
    }

    /// `(latitude, longitude)` pair as expected by the remote clients.
    pub fn coordinates(&self) -> (f64, f64) {
        (self.latitude, self.longitude)
    }

    /// Human-readable place name, e.g. "Austin, Texas, United States".
    pub fn display_name(&self) -> Option<String> {
        let parts: Vec<&str> = [&self.city, &self.state, &self.country]
            .into_iter()
            .filter_map(|p| p.as_deref())
            .filter(|p| !p.is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(", "))
        }
    }
}

impl Default for Location {
    /// Austin, Texas.
    fn default() -> Self {
        Location::new(30.2672, -97.7431, chrono_tz::America::Chicago).with_place(
            "Austin",
            "Texas",
            "United States",
        )
    }
}

fn default_timezone() -> Tz {
    chrono_tz::America::Chicago
}

/// Chat model configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LlmConfig {
    /// Model name; the provider is inferred from it ("gpt-…", "claude-…")
    pub model: Option<String>,
    /// Override the environment variable holding the provider API key
    pub api_key_env: Option<String>,
    /// Override the provider endpoint (OpenAI-compatible proxies, tests)
    pub api_url: Option<String>,
    /// Optional persona/system prompt kept at the head of every conversation
    pub persona: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub max_tokens: Option<usize>,
    pub temperature: Option<f32>,
}

/// Tomorrow.io weather configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WeatherConfig {
    pub api_key_env: Option<String>,
    pub api_url: Option<String>,
    /// "imperial" (default) or "metric"
    pub units: Option<String>,
    pub timeout_seconds: Option<u64>,
}

/// Google air quality / pollen configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AirQualityConfig {
    pub api_key_env: Option<String>,
    pub air_quality_url: Option<String>,
    pub pollen_url: Option<String>,
    pub timeout_seconds: Option<u64>,
}

/// News feed configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NewsConfig {
    /// Categories rendered into the context block, in order
    pub categories: Option<Vec<String>>,
    pub stories_per_category: Option<usize>,
    pub include_summaries: Option<bool>,
    /// Timezone article publish times are converted into
    pub timezone: Option<Tz>,
    pub timeout_seconds: Option<u64>,
}

/// Perplexity web search configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SearchConfig {
    pub api_key_env: Option<String>,
    pub api_url: Option<String>,
    pub model: Option<String>,
    pub timeout_seconds: Option<u64>,
    /// Include web search results when a query is supplied
    pub enabled: Option<bool>,
}

/// Cache TTL applied by every remote client
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CacheConfig {
    pub ttl_seconds: Option<u64>,
}

/// Token-bucket limits for the weather client
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RateLimitConfig {
    pub max_requests: Option<u32>,
    pub window_seconds: Option<u64>,
}

/// Top-level application configuration (deserialized from config.toml)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub location: Option<Location>,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub weather: WeatherConfig,
    #[serde(default)]
    pub air_quality: AirQualityConfig,
    #[serde(default)]
    pub news: NewsConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

impl Config {
    /// Load configuration from a TOML file asynchronously.
    ///
    /// Example:
    ///   let cfg = Config::from_file("config.toml").await?;
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = tokio::fs::read_to_string(path.as_ref())
            .await
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let cfg: Config = toml::from_str(&data).context("Failed to parse TOML configuration")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load configuration with an optional default file and an optional override file.
    /// If both are present, they are merged (override takes precedence).
    /// With neither present the built-in defaults are used.
    pub async fn load_with_defaults(default_path: Option<&Path>, override_path: Option<&Path>) -> Result<Self> {
        let mut config_value = toml::Value::Table(toml::map::Map::new());

        for (path, label) in [(default_path, "default"), (override_path, "override")] {
            let Some(path) = path else { continue };
            if !path.exists() {
                continue;
            }
            let data = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read {} config: {}", label, path.display()))?;
            let val: toml::Value = toml::from_str(&data)
                .with_context(|| format!("Failed to parse {} configuration", label))?;
            merge_toml(&mut config_value, val);
        }

        let cfg: Config = config_value.try_into().context("Failed to parse merged configuration")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// The configured location, or Austin when none is set.
    pub fn location(&self) -> Location {
        self.location.clone().unwrap_or_default()
    }

    /// Reject endpoint overrides that are not absolute URLs.
    pub fn validate(&self) -> Result<()> {
        let endpoints = [
            ("llm.api_url", &self.llm.api_url),
            ("weather.api_url", &self.weather.api_url),
            ("air_quality.air_quality_url", &self.air_quality.air_quality_url),
            ("air_quality.pollen_url", &self.air_quality.pollen_url),
            ("search.api_url", &self.search.api_url),
        ];
        for (key, value) in endpoints {
            if let Some(raw) = value {
                url::Url::parse(raw).with_context(|| format!("{} is not a valid URL: {}", key, raw))?;
            }
        }
        if let Some(units) = &self.weather.units {
            if !matches!(units.as_str(), "imperial" | "metric") {
                anyhow::bail!("weather.units must be \"imperial\" or \"metric\", got {:?}", units);
            }
        }
        Ok(())
    }
}

fn merge_toml(a: &mut toml::Value, b: toml::Value) {
    match (a, b) {
        (toml::Value::Table(a_map), toml::Value::Table(b_map)) => {
            for (k, v) in b_map {
                if let Some(a_val) = a_map.get_mut(&k) {
                    merge_toml(a_val, v);
                } else {
                    a_map.insert(k, v);
                }
            }
        }
        (a_val, b_val) => *a_val = b_val,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn config_from_string() {
        let toml = r#"
            [location]
            latitude = 40.7128
            longitude = -74.006
            city = "New York"
            timezone = "America/New_York"

            [llm]
            model = "claude-3-5-sonnet-latest"
            persona = "You are a helpful assistant."

            [news]
            categories = ["latest", "tech"]
            stories_per_category = 2
        "#;

        let cfg: Config = toml::from_str(toml).expect("parse config");
        let loc = cfg.location();
        assert_eq!(loc.timezone, chrono_tz::America::New_York);
        assert_eq!(loc.city.as_deref(), Some("New York"));
        assert_eq!(cfg.llm.model.as_deref(), Some("claude-3-5-sonnet-latest"));
        assert_eq!(cfg.news.categories.as_ref().map(Vec::len), Some(2));
        assert!(cfg.weather.api_key_env.is_none());
        cfg.validate().expect("valid");
    }

    #[test]
    fn empty_config_defaults_to_austin() {
        let cfg: Config = toml::from_str("").expect("parse empty config");
        let loc = cfg.location();
        assert_eq!(loc.coordinates(), (30.2672, -97.7431));
        assert_eq!(loc.timezone, chrono_tz::America::Chicago);
        assert_eq!(loc.display_name().as_deref(), Some("Austin, Texas, United States"));
    }

    #[test]
    fn invalid_timezone_is_rejected() {
        let toml = r#"
            [location]
            latitude = 1.0
            longitude = 2.0
            timezone = "Mars/Olympus_Mons"
        "#;
        assert!(toml::from_str::<Config>(toml).is_err());
    }

    #[test]
    fn validate_rejects_bad_urls_and_units() {
        let mut cfg = Config::default();
        cfg.search.api_url = Some("not a url".to_string());
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.weather.units = Some("kelvin".to_string());
        assert!(cfg.validate().is_err());
    }

    #[tokio::test]
    async fn override_file_takes_precedence() {
        let mut default_file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(
            default_file,
            "[llm]\nmodel = \"gpt-4o-mini\"\ntimeout_seconds = 10\n\n[cache]\nttl_seconds = 300"
        )
        .expect("write default");

        let mut override_file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(override_file, "[llm]\nmodel = \"claude-3-haiku-20240307\"").expect("write override");

        let cfg = Config::load_with_defaults(Some(default_file.path()), Some(override_file.path()))
            .await
            .expect("load merged config");

        assert_eq!(cfg.llm.model.as_deref(), Some("claude-3-haiku-20240307"));
        assert_eq!(cfg.llm.timeout_seconds, Some(10));
        assert_eq!(cfg.cache.ttl_seconds, Some(300));
    }

    #[tokio::test]
    async fn missing_files_yield_defaults() {
        let cfg = Config::load_with_defaults(Some(Path::new("does-not-exist.toml")), None)
            .await
            .expect("defaults");
        assert!(cfg.location.is_none());
        assert!(cfg.llm.model.is_none());
    }
}
