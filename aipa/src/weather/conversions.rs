use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Unit system requested from the weather provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Imperial,
    Metric,
}

impl Units {
    pub fn as_str(&self) -> &'static str {
        match self {
            Units::Imperial => "imperial",
            Units::Metric => "metric",
        }
    }

    pub fn temperature_label(&self) -> &'static str {
        match self {
            Units::Imperial => "°F",
            Units::Metric => "°C",
        }
    }

    pub fn speed_label(&self) -> &'static str {
        match self {
            Units::Imperial => "mph",
            Units::Metric => "m/s",
        }
    }

    pub fn precipitation_label(&self) -> &'static str {
        match self {
            Units::Imperial => "in",
            Units::Metric => "mm",
        }
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Units {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "imperial" => Ok(Units::Imperial),
            "metric" => Ok(Units::Metric),
            other => Err(Error::InvalidInput(format!("unknown unit system: {}", other))),
        }
    }
}

pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 9.0 / 5.0 + 32.0
}

pub fn meters_per_second_to_mph(mps: f64) -> f64 {
    mps * 2.237
}

pub fn millimeters_to_inches(mm: f64) -> f64 {
    mm / 25.4
}

/// Round to the nearest integer for display. Never yields "-0".
pub fn whole(value: f64) -> i64 {
    value.round() as i64
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Human description of a Tomorrow.io weather code.
pub fn describe_weather_code(code: i64) -> &'static str {
    match code {
        1000 => "Clear, Sunny",
        1100 => "Mostly Clear",
        1101 => "Partly Cloudy",
        1102 => "Mostly Cloudy",
        1001 => "Cloudy",
        2000 => "Fog",
        2100 => "Light Fog",
        4000 => "Drizzle",
        4001 => "Rain",
        4200 => "Light Rain",
        4201 => "Heavy Rain",
        5000 => "Snow",
        5001 => "Flurries",
        5100 => "Light Snow",
        5101 => "Heavy Snow",
        6000 => "Freezing Drizzle",
        6001 => "Freezing Rain",
        6200 => "Light Freezing Rain",
        6201 => "Heavy Freezing Rain",
        7000 => "Ice Pellets",
        7101 => "Heavy Ice Pellets",
        7102 => "Light Ice Pellets",
        8000 => "Thunderstorm",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversions() {
        assert_eq!(celsius_to_fahrenheit(100.0), 212.0);
        assert_eq!(celsius_to_fahrenheit(-40.0), -40.0);
        assert_eq!(round_to(meters_per_second_to_mph(10.0), 1), 22.4);
        assert_eq!(round_to(millimeters_to_inches(25.4), 2), 1.0);
    }

    #[test]
    fn whole_drops_negative_zero() {
        assert_eq!(whole(-0.4).to_string(), "0");
        assert_eq!(whole(-0.0).to_string(), "0");
        assert_eq!(whole(72.5), 73);
        assert_eq!(whole(-3.6), -4);
    }

    #[test]
    fn units_parse_and_label() {
        assert_eq!("Metric".parse::<Units>().unwrap(), Units::Metric);
        assert!("kelvin".parse::<Units>().is_err());
        assert_eq!(Units::default().temperature_label(), "°F");
        assert_eq!(Units::Metric.speed_label(), "m/s");
    }

    #[test]
    fn weather_codes() {
        assert_eq!(describe_weather_code(1000), "Clear, Sunny");
        assert_eq!(describe_weather_code(4200), "Light Rain");
        assert_eq!(describe_weather_code(42), "Unknown");
    }
}
