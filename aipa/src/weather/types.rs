use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::conversions::{celsius_to_fahrenheit, meters_per_second_to_mph, millimeters_to_inches, round_to};

/// Weather measurements for one point in time. Absent fields were not requested
/// or not reported.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherValues {
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub humidity: Option<f64>,
    #[serde(default)]
    pub wind_speed: Option<f64>,
    #[serde(default)]
    pub wind_direction: Option<f64>,
    #[serde(default)]
    pub precipitation_probability: Option<f64>,
    #[serde(default)]
    pub precipitation_type: Option<i64>,
    #[serde(default)]
    pub precipitation: Option<f64>,
    #[serde(default)]
    pub weather_code: Option<i64>,
}

impl WeatherValues {
    /// Convert metric measurements to imperial, one decimal (two for precipitation).
    pub fn to_imperial(&self) -> Self {
        Self {
            temperature: self.temperature.map(|t| round_to(celsius_to_fahrenheit(t), 1)),
            wind_speed: self.wind_speed.map(|w| round_to(meters_per_second_to_mph(w), 1)),
            precipitation: self.precipitation.map(|p| round_to(millimeters_to_inches(p), 2)),
            ..self.clone()
        }
    }
}

/// Current conditions (`data` of the realtime endpoint).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeWeather {
    #[serde(default)]
    pub time: Option<DateTime<Utc>>,
    pub values: WeatherValues,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RealtimeResponse {
    pub data: RealtimeWeather,
}

/// One forecast step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastInterval {
    pub start_time: DateTime<Utc>,
    pub values: WeatherValues,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timeline {
    pub timestep: String,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub intervals: Vec<ForecastInterval>,
}

/// Forecast (`data` of the timelines endpoint).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    #[serde(default)]
    pub timelines: Vec<Timeline>,
}

impl Forecast {
    /// Intervals of the first timeline, which is the requested timestep.
    pub fn intervals(&self) -> &[ForecastInterval] {
        self.timelines
            .first()
            .map(|t| t.intervals.as_slice())
            .unwrap_or(&[])
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ForecastResponse {
    pub data: Forecast,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_realtime_payload() {
        let body = r#"{
            "data": {
                "time": "2024-05-01T15:00:00Z",
                "values": {"temperature": 72.3, "windSpeed": 5.1, "weatherCode": 1000, "humidity": 40}
            },
            "location": {"lat": 30.2672, "lon": -97.7431}
        }"#;
        let parsed: RealtimeResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.data.values.temperature, Some(72.3));
        assert_eq!(parsed.data.values.wind_speed, Some(5.1));
        assert_eq!(parsed.data.values.weather_code, Some(1000));
        assert!(parsed.data.values.precipitation_type.is_none());
    }

    #[test]
    fn forecast_intervals_come_from_first_timeline() {
        let body = r#"{
            "data": {"timelines": [{
                "timestep": "1h",
                "intervals": [
                    {"startTime": "2024-05-01T15:00:00Z", "values": {"temperature": 70.0}},
                    {"startTime": "2024-05-01T16:00:00Z", "values": {"temperature": 71.5}}
                ]
            }]}
        }"#;
        let parsed: ForecastResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.data.intervals().len(), 2);
        assert_eq!(parsed.data.intervals()[1].values.temperature, Some(71.5));
        assert!(Forecast { timelines: vec![] }.intervals().is_empty());
    }

    #[test]
    fn metric_to_imperial() {
        let metric = WeatherValues {
            temperature: Some(20.0),
            wind_speed: Some(3.0),
            precipitation: Some(10.0),
            humidity: Some(55.0),
            ..Default::default()
        };
        let imperial = metric.to_imperial();
        assert_eq!(imperial.temperature, Some(68.0));
        assert_eq!(imperial.wind_speed, Some(6.7));
        assert_eq!(imperial.precipitation, Some(0.39));
        assert_eq!(imperial.humidity, Some(55.0));
    }
}
