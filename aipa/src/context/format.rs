//! Section renderers for the context block.
//!
//! Each function is pure: it takes already-fetched data and returns the text
//! of one section (header included), so ordering and failure handling stay in
//! the manager.

use chrono::DateTime;
use chrono_tz::Tz;

use crate::allergy::{AirQuality, PollenForecast};
use crate::news::NewsArticle;
use crate::weather::{describe_weather_code, whole, RealtimeWeather, Units};

pub const AIR_QUALITY_UNAVAILABLE: &str = "Air quality data is currently unavailable.";
pub const POLLEN_UNAVAILABLE: &str = "Pollen forecast is currently unavailable.";

const SUMMARY_MAX_CHARS: usize = 200;
const CLOCK_FORMAT: &str = "%-I:%M %p";

pub fn time_section(now: &DateTime<Tz>) -> String {
    format!("Current time: {}", now.format(CLOCK_FORMAT))
}

/// `None` when the payload has no temperature to report.
pub fn weather_section(weather: &RealtimeWeather, units: Units) -> Option<String> {
    let values = &weather.values;
    let temperature = values.temperature?;

    let mut lines = vec![
        "Current weather conditions:".to_string(),
        format!("  Temperature: {}{}", whole(temperature), units.temperature_label()),
    ];
    let conditions = values
        .weather_code
        .map(describe_weather_code)
        .unwrap_or("Unknown");
    lines.push(format!("  Conditions: {}", conditions));
    if let Some(wind) = values.wind_speed {
        lines.push(format!("  Wind Speed: {} {}", whole(wind), units.speed_label()));
    }
    Some(lines.join("\n"))
}

pub fn air_quality_section(data: Option<&AirQuality>) -> String {
    let mut lines = vec!["Current air quality:".to_string()];
    let data = match data.filter(|d| !d.is_empty()) {
        Some(data) => data,
        None => {
            lines.push(AIR_QUALITY_UNAVAILABLE.to_string());
            return lines.join("\n");
        }
    };

    for index in &data.indexes {
        let name = if index.code == "uaqi" {
            "Universal AQI".to_string()
        } else {
            format!("AQI ({})", index.code.to_uppercase())
        };
        lines.push(format!(
            "{}: {} - {}. Dominant pollutant: {}",
            name,
            index.aqi.map_or_else(|| "N/A".to_string(), |v| v.to_string()),
            index.category.as_deref().unwrap_or("Unknown"),
            index
                .dominant_pollutant
                .as_deref()
                .map_or_else(|| "N/A".to_string(), str::to_uppercase),
        ));
    }

    if !data.pollutants.is_empty() {
        lines.push("Pollutant levels:".to_string());
        for pollutant in &data.pollutants {
            let name = pollutant
                .full_name
                .as_deref()
                .or(pollutant.display_name.as_deref())
                .unwrap_or(&pollutant.code);
            let (value, units) = match &pollutant.concentration {
                Some(c) => (
                    c.value.map_or_else(|| "N/A".to_string(), |v| v.to_string()),
                    c.units.as_deref().unwrap_or(""),
                ),
                None => ("N/A".to_string(), ""),
            };
            lines.push(format!("- {}: {} {}", name, value, units).trim_end().to_string());
        }
    }

    if let Some(advice) = data
        .health_recommendations
        .as_ref()
        .and_then(|r| r.general_population.as_deref())
    {
        lines.push(format!("Health advice: {}", advice));
    }

    lines.join("\n")
}

/// Renders the first forecast day.
pub fn pollen_section(data: Option<&PollenForecast>) -> String {
    let mut lines = vec!["Pollen information:".to_string()];
    let today = match data.and_then(|d| d.daily_info.first()) {
        Some(today) => today,
        None => {
            lines.push(POLLEN_UNAVAILABLE.to_string());
            return lines.join("\n");
        }
    };

    if let Some(date) = &today.date {
        lines.push(format!("Pollen forecast for {}:", date));
    }

    for pollen in &today.pollen_type_info {
        let Some(index) = &pollen.index_info else {
            continue;
        };
        let season = if pollen.in_season.unwrap_or(false) {
            "In season"
        } else {
            "Out of season"
        };
        lines.push(format!("{} Pollen ({}):", pollen.display_name, season));
        lines.push(format!(
            "Level: {} - {}",
            index.value.map_or_else(|| "N/A".to_string(), |v| v.to_string()),
            index.category.as_deref().unwrap_or("Unknown"),
        ));
        if let Some(advice) = pollen.health_recommendations.first() {
            lines.push(format!("Advice: {}", advice));
        }
    }

    let plants: Vec<_> = today
        .plant_info
        .iter()
        .filter(|p| p.in_season.unwrap_or(false))
        .filter(|p| p.index_info.as_ref().and_then(|i| i.value).unwrap_or(0) > 1)
        .collect();
    if !plants.is_empty() {
        lines.push("Significant plants in season:".to_string());
        for plant in plants {
            let category = plant
                .index_info
                .as_ref()
                .and_then(|i| i.category.as_deref())
                .unwrap_or("Unknown");
            lines.push(format!("- {}: {}", plant.display_name, category));
        }
    }

    lines.join("\n")
}

/// `None` when every category came back empty.
pub fn news_section<L>(
    groups: &[(String, Vec<NewsArticle>)],
    label: L,
    include_summaries: bool,
    stories_per_category: usize,
) -> Option<String>
where
    L: Fn(&str) -> String,
{
    let mut lines = vec!["Top Stories:".to_string()];
    for (category, articles) in groups.iter().filter(|(_, a)| !a.is_empty()) {
        lines.push(format!("{} News (Top {}):", label(category), stories_per_category));
        for (i, article) in articles.iter().enumerate() {
            lines.push(format!(
                "{}. [{}] {}",
                i + 1,
                article.published.format(CLOCK_FORMAT),
                article.title
            ));
            if include_summaries {
                if let Some(summary) = truncate_summary(&article.summary) {
                    lines.push(format!("   Summary: {}", summary));
                }
            }
        }
    }

    if lines.len() == 1 {
        None
    } else {
        Some(lines.join("\n"))
    }
}

pub fn web_search_section(answer: &str) -> Option<String> {
    let answer = answer.trim();
    if answer.is_empty() {
        None
    } else {
        Some(format!("Web Search Results:\n{}", answer))
    }
}

/// Single line, at most 200 characters including the ellipsis.
fn truncate_summary(summary: &str) -> Option<String> {
    let flat = summary.replace('\n', " ");
    let flat = flat.trim();
    if flat.is_empty() {
        return None;
    }
    if flat.chars().count() > SUMMARY_MAX_CHARS {
        let head: String = flat.chars().take(SUMMARY_MAX_CHARS - 3).collect();
        Some(format!("{}...", head))
    } else {
        Some(flat.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allergy::{
        AqiIndex, Concentration, DailyPollenInfo, ForecastDate, HealthRecommendations, IndexInfo, PlantInfo,
        Pollutant, PollenTypeInfo,
    };
    use crate::weather::WeatherValues;
    use chrono::TimeZone;
    use chrono_tz::America::Chicago;

    fn article(title: &str, summary: &str) -> NewsArticle {
        NewsArticle {
            title: title.to_string(),
            summary: summary.to_string(),
            link: "https://example.com/a".to_string(),
            published: Chicago.with_ymd_and_hms(2024, 4, 2, 9, 5, 0).unwrap(),
            category: "world".to_string(),
        }
    }

    #[test]
    fn time_uses_twelve_hour_clock_without_padding() {
        let now = Chicago.with_ymd_and_hms(2024, 4, 2, 15, 7, 0).unwrap();
        assert_eq!(time_section(&now), "Current time: 3:07 PM");
    }

    #[test]
    fn weather_rounds_to_whole_numbers() {
        let weather = RealtimeWeather {
            time: None,
            values: WeatherValues {
                temperature: Some(72.3),
                wind_speed: Some(5.1),
                weather_code: Some(1000),
                ..Default::default()
            },
        };
        let text = weather_section(&weather, Units::Imperial).unwrap();
        assert!(text.contains("Temperature: 72°F"));
        assert!(text.contains("Wind Speed: 5 mph"));
        assert!(text.contains("Conditions: Clear, Sunny"));
        assert!(!text.contains("72.3"));
    }

    #[test]
    fn weather_near_zero_has_no_negative_sign() {
        let weather = RealtimeWeather {
            time: None,
            values: WeatherValues {
                temperature: Some(-0.4),
                wind_speed: Some(-0.0),
                ..Default::default()
            },
        };
        let text = weather_section(&weather, Units::Metric).unwrap();
        assert!(text.contains("Temperature: 0°C"), "{}", text);
        assert!(text.contains("Wind Speed: 0 m/s"), "{}", text);
        assert!(!text.contains("-0"));
    }

    #[test]
    fn weather_without_temperature_is_skipped() {
        let weather = RealtimeWeather {
            time: None,
            values: WeatherValues::default(),
        };
        assert!(weather_section(&weather, Units::Metric).is_none());
    }

    #[test]
    fn air_quality_lists_indexes_pollutants_and_advice() {
        let data = AirQuality {
            date_time: None,
            indexes: vec![
                AqiIndex {
                    code: "uaqi".to_string(),
                    display_name: None,
                    aqi: Some(62),
                    category: Some("Good air quality".to_string()),
                    dominant_pollutant: Some("o3".to_string()),
                },
                AqiIndex {
                    code: "usa_epa".to_string(),
                    display_name: None,
                    aqi: Some(48),
                    category: Some("Good".to_string()),
                    dominant_pollutant: Some("pm25".to_string()),
                },
            ],
            pollutants: vec![Pollutant {
                code: "o3".to_string(),
                display_name: Some("O3".to_string()),
                full_name: Some("Ozone".to_string()),
                concentration: Some(Concentration {
                    value: Some(31.5),
                    units: Some("PARTS_PER_BILLION".to_string()),
                }),
            }],
            health_recommendations: Some(HealthRecommendations {
                general_population: Some("Enjoy the outdoors.".to_string()),
                ..Default::default()
            }),
        };

        let text = air_quality_section(Some(&data));
        let expected = "Current air quality:\n\
            Universal AQI: 62 - Good air quality. Dominant pollutant: O3\n\
            AQI (USA_EPA): 48 - Good. Dominant pollutant: PM25\n\
            Pollutant levels:\n\
            - Ozone: 31.5 PARTS_PER_BILLION\n\
            Health advice: Enjoy the outdoors.";
        assert_eq!(text, expected);
    }

    #[test]
    fn missing_allergy_data_is_marked_unavailable() {
        assert!(air_quality_section(None).ends_with(AIR_QUALITY_UNAVAILABLE));
        assert!(air_quality_section(Some(&AirQuality::default())).ends_with(AIR_QUALITY_UNAVAILABLE));
        assert!(pollen_section(None).ends_with(POLLEN_UNAVAILABLE));
        assert!(pollen_section(Some(&PollenForecast::default())).ends_with(POLLEN_UNAVAILABLE));
    }

    #[test]
    fn pollen_lists_types_and_significant_plants() {
        let index = |value: i64, category: &str| IndexInfo {
            code: Some("UPI".to_string()),
            display_name: None,
            value: Some(value),
            category: Some(category.to_string()),
        };
        let data = PollenForecast {
            region_code: Some("us".to_string()),
            daily_info: vec![DailyPollenInfo {
                date: Some(ForecastDate {
                    year: 2024,
                    month: 4,
                    day: 2,
                }),
                pollen_type_info: vec![
                    PollenTypeInfo {
                        code: "TREE".to_string(),
                        display_name: "Tree".to_string(),
                        in_season: Some(true),
                        index_info: Some(index(4, "High")),
                        health_recommendations: vec!["Keep windows closed.".to_string()],
                    },
                    PollenTypeInfo {
                        code: "WEED".to_string(),
                        display_name: "Weed".to_string(),
                        in_season: Some(false),
                        index_info: None,
                        health_recommendations: vec![],
                    },
                ],
                plant_info: vec![
                    PlantInfo {
                        code: "OAK".to_string(),
                        display_name: "Oak".to_string(),
                        in_season: Some(true),
                        index_info: Some(index(4, "High")),
                    },
                    PlantInfo {
                        code: "ELM".to_string(),
                        display_name: "Elm".to_string(),
                        in_season: Some(true),
                        index_info: Some(index(1, "Very Low")),
                    },
                    PlantInfo {
                        code: "RAGWEED".to_string(),
                        display_name: "Ragweed".to_string(),
                        in_season: Some(false),
                        index_info: Some(index(3, "Moderate")),
                    },
                ],
            }],
        };

        let text = pollen_section(Some(&data));
        let expected = "Pollen information:\n\
            Pollen forecast for 2024-04-02:\n\
            Tree Pollen (In season):\n\
            Level: 4 - High\n\
            Advice: Keep windows closed.\n\
            Significant plants in season:\n\
            - Oak: High";
        assert_eq!(text, expected);
    }

    #[test]
    fn news_skips_empty_categories_and_truncates_summaries() {
        let long = "word ".repeat(80);
        let groups = vec![
            ("austin".to_string(), vec![]),
            ("world".to_string(), vec![article("Headline one", &long), article("Headline two", "Short\nsummary")]),
        ];
        let text = news_section(&groups, |c| format!("<{}>", c), true, 3).unwrap();

        assert!(!text.contains("<austin>"));
        assert!(text.starts_with("Top Stories:\n<world> News (Top 3):\n1. [9:05 AM] Headline one"));
        assert!(text.contains("   Summary: Short summary"));

        let truncated = text
            .lines()
            .find(|l| l.starts_with("   Summary: word"))
            .unwrap()
            .trim_start_matches("   Summary: ");
        assert_eq!(truncated.chars().count(), SUMMARY_MAX_CHARS);
        assert!(truncated.ends_with("..."));
    }

    #[test]
    fn news_without_summaries_and_all_empty() {
        let groups = vec![("world".to_string(), vec![article("Only title", "body")])];
        let text = news_section(&groups, str::to_string, false, 1).unwrap();
        assert!(!text.contains("Summary"));

        let empty = vec![("world".to_string(), vec![])];
        assert!(news_section(&empty, str::to_string, true, 3).is_none());
    }

    #[test]
    fn web_search_ignores_blank_answers() {
        assert_eq!(web_search_section(" 42 ").as_deref(), Some("Web Search Results:\n42"));
        assert!(web_search_section("  ").is_none());
    }
}
