use aipa::allergy::AllergyClient;
use aipa::context::{ContextManager, ContextOptions, Sources};
use aipa::conversation::Conversation;
use aipa::llm::remote::RemoteChatModel;
use aipa::llm::Role;
use aipa::news::NewsClient;
use aipa::search::SearchClient;
use aipa::weather::WeatherClient;
use aipa::Assistant;
use common::Location;
use mockito::{Matcher, Server};
use std::sync::Arc;

const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Austin</title>
    <link>https://example.com/austin</link>
    <description>Local news</description>
    <item>
      <title>City council approves budget</title>
      <link>https://example.com/austin/budget</link>
      <description>The council voted 8-3.</description>
      <pubDate>Tue, 02 Apr 2024 16:05:00 GMT</pubDate>
    </item>
  </channel>
</rss>"#;

fn sources(server: &Server) -> Sources {
    let base = server.url();
    let news = NewsClient::new()
        .unwrap()
        .with_feed_url("austin", format!("{}/austin.xml", base))
        .unwrap();
    Sources {
        weather: Arc::new(WeatherClient::new("weather-key").unwrap().with_base_url(&base)),
        allergy: Arc::new(
            AllergyClient::new("maps-key")
                .unwrap()
                .with_urls(format!("{}/air", base), format!("{}/pollen", base)),
        ),
        news: Arc::new(news),
        search: Arc::new(SearchClient::new("pplx-key").unwrap().with_api_url(format!("{}/search", base))),
    }
}

fn options() -> ContextOptions {
    ContextOptions {
        news_categories: vec!["austin".to_string()],
        ..ContextOptions::default()
    }
}

fn austin() -> Location {
    Location::new(30.2672, -97.7431, chrono_tz::America::Chicago)
}

async fn mock_weather(server: &mut Server) -> mockito::Mock {
    server
        .mock("GET", "/realtime")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"data": {"values": {"temperature": 72.3, "windSpeed": 5.1, "weatherCode": 1001}}}"#)
        .create_async()
        .await
}

async fn mock_news(server: &mut Server) -> mockito::Mock {
    server
        .mock("GET", "/austin.xml")
        .with_status(200)
        .with_body(RSS)
        .create_async()
        .await
}

#[tokio::test]
async fn test_full_context_with_degraded_allergy_data() {
    let mut server = Server::new_async().await;
    let _weather = mock_weather(&mut server).await;
    let _news = mock_news(&mut server).await;
    let _air = server
        .mock("POST", "/air")
        .match_query(Matcher::Any)
        .with_status(503)
        .create_async()
        .await;
    let _pollen = server
        .mock("GET", "/pollen")
        .match_query(Matcher::Any)
        .with_status(403)
        .create_async()
        .await;
    let search = server
        .mock("POST", "/search")
        .match_body(Matcher::PartialJson(serde_json::json!({
            "temperature": 0.1,
            "search_recency_filter": "day",
            "return_related_questions": false
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"choices": [{"message": {"role": "assistant", "content": "Storms expected after 6 PM."}}]}"#)
        .expect(1)
        .create_async()
        .await;

    let manager = ContextManager::new(Some(austin()), sources(&server)).with_options(options());
    let text = manager.assemble(Some("Will it storm tonight?"), true, true).await;

    let sections: Vec<&str> = text.split("\n\n").collect();
    assert_eq!(sections.len(), 6, "unexpected sections:\n{}", text);
    assert!(sections[0].starts_with("Current time: "));
    assert_eq!(
        sections[1],
        "Current weather conditions:\n  Temperature: 72°F\n  Conditions: Cloudy\n  Wind Speed: 5 mph"
    );
    assert_eq!(sections[2], "Current air quality:\nAir quality data is currently unavailable.");
    assert_eq!(sections[3], "Pollen information:\nPollen forecast is currently unavailable.");
    assert_eq!(
        sections[4],
        "Top Stories:\nAustin News (Top 3):\n1. [11:05 AM] City council approves budget\n   Summary: The council voted 8-3."
    );
    assert_eq!(sections[5], "Web Search Results:\nStorms expected after 6 PM.");
    search.assert_async().await;
}

#[tokio::test]
async fn test_weather_outage_only_drops_weather() {
    let mut server = Server::new_async().await;
    let _weather = server
        .mock("GET", "/realtime")
        .match_query(Matcher::Any)
        .with_status(500)
        .create_async()
        .await;
    let _news = mock_news(&mut server).await;
    let _air = server
        .mock("POST", "/air")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"indexes": [{"code": "uaqi", "aqi": 55, "category": "Moderate air quality", "dominantPollutant": "pm25"}]}"#)
        .create_async()
        .await;
    let _pollen = server
        .mock("GET", "/pollen")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"dailyInfo": [{"date": {"year": 2024, "month": 4, "day": 2}}]}"#)
        .create_async()
        .await;

    let manager = ContextManager::new(Some(austin()), sources(&server)).with_options(options());
    let text = manager.assemble(None, false, true).await;

    assert!(!text.contains("Current weather conditions:"));
    let air = text.find("Universal AQI: 55 - Moderate air quality. Dominant pollutant: PM25").unwrap();
    let pollen = text.find("Pollen forecast for 2024-04-02:").unwrap();
    let news = text.find("Austin News (Top 3):").unwrap();
    assert!(air < pollen && pollen < news);
    assert!(!text.contains("Summary:"));
}

#[tokio::test]
async fn test_assistant_refreshes_context_each_turn() {
    let mut server = Server::new_async().await;
    let weather = server
        .mock("GET", "/realtime")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"data": {"values": {"temperature": 72.3, "windSpeed": 5.1}}}"#)
        .expect(1)
        .create_async()
        .await;
    let _news = mock_news(&mut server).await;
    let _air = server.mock("POST", "/air").match_query(Matcher::Any).with_status(500).create_async().await;
    let _pollen = server.mock("GET", "/pollen").match_query(Matcher::Any).with_status(500).create_async().await;
    let llm = server
        .mock("POST", "/chat")
        .match_body(Matcher::Regex("Temperature: 72".to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"choices": [{"message": {"role": "assistant", "content": "It is warm."}}]}"#)
        .expect(2)
        .create_async()
        .await;

    let manager = ContextManager::new(Some(austin()), sources(&server)).with_options(options());
    let model = RemoteChatModel::new(format!("{}/chat", server.url()), "sk-test", "gpt-4o-mini").unwrap();
    let conversation = Conversation::new(Arc::new(model), Some("You are a helpful assistant.".to_string()));
    let mut assistant = Assistant::new(manager, conversation);

    assert_eq!(assistant.process_message("How warm is it?").await.unwrap(), "It is warm.");
    assert_eq!(assistant.process_message("And now?").await.unwrap(), "It is warm.");

    let history = assistant.conversation().history();
    let roles: Vec<Role> = history.iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![Role::Persona, Role::User, Role::Assistant, Role::Context, Role::User, Role::Assistant]
    );

    // Weather came from the cache on the second turn
    weather.assert_async().await;
    llm.assert_async().await;

    assistant.reset_conversation();
    assert_eq!(assistant.conversation().history().len(), 1);
}
