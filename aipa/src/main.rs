/*
aipa - command-line entry point.
Loads configuration and API keys, builds the clients it needs and runs one
subcommand: an interactive chat, a one-off context block, a web-search
question, headlines or the weather.
*/

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use common::Config;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use aipa::app::{self, Assistant};
use aipa::weather::{describe_weather_code, whole, Units, WeatherValues};

#[derive(Parser, Debug)]
#[command(name = "aipa", about = "Personal assistant with live situational context")]
struct Args {
    /// Path to config.toml
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override log level (info, debug, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive chat on stdin (/reset, /context, /quit)
    Chat,
    /// Print one assembled context block
    Context {
        /// Query used for the web-search section
        #[arg(long)]
        query: Option<String>,
        #[arg(long)]
        no_summaries: bool,
        #[arg(long)]
        no_web_search: bool,
    },
    /// Ask the web-search provider a question
    Ask { question: String },
    /// Print headlines per category
    News {
        #[arg(long = "category", value_name = "NAME")]
        categories: Vec<String>,
        #[arg(long, default_value_t = 3)]
        limit: usize,
    },
    /// Print current conditions, or the forecast with --forecast
    Weather {
        #[arg(long)]
        forecast: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    // API keys: .env.local wins over .env, both lose to the real environment
    for file in [".env.local", ".env"] {
        if dotenv::from_filename(file).is_ok() {
            info!(file, "loaded environment file");
        }
    }

    let default_path = PathBuf::from("config.default.toml");
    let override_path = if let Some(p) = args.config {
        if !p.exists() {
            error!(path = ?p, "specified config file not found");
            return Err(anyhow::anyhow!("Config file not found: {}", p.display()));
        }
        Some(p)
    } else {
        let p = PathBuf::from("config.toml");
        if p.exists() { Some(p) } else { None }
    };

    let config = match Config::load_with_defaults(
        if default_path.exists() { Some(default_path.as_path()) } else { None },
        override_path.as_deref(),
    )
    .await
    {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(%e, "failed to load configuration");
            return Err(e);
        }
    };
    info!(default = ?default_path, override = ?override_path, "configuration loaded");

    match args.command {
        Command::Chat => run_chat(&config).await,
        Command::Context {
            query,
            no_summaries,
            no_web_search,
        } => {
            let assistant = Assistant::from_config(&config).context("Failed to initialize assistant")?;
            let web_search = !no_web_search && app::web_search_enabled(&config);
            let text = assistant
                .context()
                .assemble(query.as_deref(), !no_summaries, web_search)
                .await;
            println!("{}", text);
            Ok(())
        }
        Command::Ask { question } => {
            let client = app::build_search(&config).context("Failed to initialize search client")?;
            let answer = client
                .ask_default(&question)
                .await
                .context("Search request failed")?;
            println!("{}", answer);
            Ok(())
        }
        Command::News { categories, limit } => {
            let client = app::build_news(&config)?;
            let requested = if categories.is_empty() { None } else { Some(categories.as_slice()) };
            let groups = client.get_multiple_categories(requested, limit).await?;
            for (category, articles) in groups {
                println!("{} News:", client.label_for(&category));
                if articles.is_empty() {
                    println!("  (no articles)");
                }
                for (i, article) in articles.iter().enumerate() {
                    println!("  {}. [{}] {}", i + 1, article.published.format("%-I:%M %p"), article.title);
                    println!("     {}", article.link);
                }
                println!();
            }
            Ok(())
        }
        Command::Weather { forecast } => run_weather(&config, forecast).await,
    }
}

async fn run_chat(config: &Config) -> Result<()> {
    let mut assistant = Assistant::from_config(config).context("Failed to initialize assistant")?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    println!("Chatting with {}. Commands: /reset, /context, /quit", config.location().display_name().unwrap_or_default());
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        match line {
            "" => continue,
            "/quit" | "/exit" => break,
            "/reset" => {
                assistant.reset_conversation();
                println!("Conversation reset.");
            }
            "/context" => {
                let text = assistant.context().assemble(None, true, false).await;
                println!("{}", text);
            }
            message => match assistant.process_message(message).await {
                Ok(reply) => println!("{}", reply),
                Err(e) => {
                    error!(%e, "chat turn failed");
                    eprintln!("Error: {}", e);
                }
            },
        }
    }
    info!("chat session ended");
    Ok(())
}

async fn run_weather(config: &Config, forecast: bool) -> Result<()> {
    let client = app::build_weather(config).context("Failed to initialize weather client")?;
    let units = app::units(config)?;
    let location = config.location();
    let place = location.display_name().unwrap_or_else(|| {
        let (lat, lon) = location.coordinates();
        format!("{:.4}, {:.4}", lat, lon)
    });

    if forecast {
        let forecast = client
            .get_forecast(location.coordinates(), "1h", None, units)
            .await
            .context("Forecast request failed")?;
        println!("Hourly forecast for {}:", place);
        for interval in forecast.intervals().iter().take(12) {
            let local = interval.start_time.with_timezone(&location.timezone);
            println!(
                "  {}  {}",
                local.format("%a %-I %p"),
                describe_values(&interval.values, units)
            );
        }
        if forecast.intervals().is_empty() {
            warn!("forecast returned no intervals");
        }
    } else {
        let weather = client
            .get_realtime(location.coordinates(), None, units)
            .await
            .context("Weather request failed")?;
        println!("Current weather for {}: {}", place, describe_values(&weather.values, units));
    }
    Ok(())
}

fn describe_values(values: &WeatherValues, units: Units) -> String {
    let mut parts = Vec::new();
    if let Some(t) = values.temperature {
        parts.push(format!("{}{}", whole(t), units.temperature_label()));
    }
    if let Some(code) = values.weather_code {
        parts.push(describe_weather_code(code).to_string());
    }
    if let Some(w) = values.wind_speed {
        parts.push(format!("wind {} {}", whole(w), units.speed_label()));
    }
    if let Some(p) = values.precipitation_probability {
        parts.push(format!("{}% precipitation", whole(p)));
    }
    if let Some(h) = values.humidity {
        parts.push(format!("{}% humidity", whole(h)));
    }
    parts.join(", ")
}
