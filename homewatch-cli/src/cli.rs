use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use homewatch_core::{
    AlertKind, Config, DirectoryClient, LocationSelection, ProviderId, WeatherClient,
    WeatherRequest,
};
use inquire::{Confirm, Password, Select, Text};

use crate::{render, session};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(
    name = "homewatch",
    version,
    about = "Smart home companion: weather, fire and flood alerts"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure API key, readings backend and default location.
    Configure,

    /// Show current weather and flood risk.
    Weather {
        /// Latitude; defaults to the configured location.
        #[arg(long, requires = "lon", allow_hyphen_values = true)]
        lat: Option<f64>,

        /// Longitude; defaults to the configured location.
        #[arg(long, requires = "lat", allow_hyphen_values = true)]
        lon: Option<f64>,

        /// City label for the output.
        #[arg(long)]
        city: Option<String>,

        /// Country label for the output.
        #[arg(long)]
        country: Option<String>,
    },

    /// List countries known to the location directory.
    Countries,

    /// List cities of a country.
    Cities {
        /// Country name, e.g. "Philippines".
        country: String,
    },

    /// Resolve a city to coordinates.
    Locate {
        city: String,

        /// ISO 3166-1 alpha-2 country code, e.g. "PH".
        #[arg(long)]
        country: Option<String>,
    },

    /// Run the alert monitors interactively.
    Watch {
        /// Enable fire alerts at start.
        #[arg(long)]
        fire: bool,

        /// Enable flood alerts at start.
        #[arg(long)]
        flood: bool,

        /// Enable smart reminders at start.
        #[arg(long)]
        reminder: bool,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure => configure().await,
            Command::Weather { lat, lon, city, country } => {
                let config = Config::load()?;
                let request = weather_request(&config, lat.zip(lon), city, country);

                let client = WeatherClient::from_config(&config);
                let snapshot = client
                    .fetch_current_weather(&request)
                    .await
                    .context("Could not load the weather right now")?;

                print!("{}", render::weather(&snapshot));
                Ok(())
            }
            Command::Countries => {
                let countries = DirectoryClient::default().fetch_countries().await?;
                for country in countries {
                    println!("{}  {}", country.code, country.name);
                }
                Ok(())
            }
            Command::Cities { country } => {
                let cities = DirectoryClient::default().fetch_cities(&country).await?;
                for city in cities {
                    println!("{city}");
                }
                Ok(())
            }
            Command::Locate { city, country } => {
                let coords = DirectoryClient::default()
                    .fetch_coordinates(&city, country.as_deref())
                    .await?
                    .ok_or_else(|| anyhow!("No coordinates found for '{city}'"))?;
                println!("{:.4}, {:.4}", coords.latitude, coords.longitude);
                Ok(())
            }
            Command::Watch { fire, flood, reminder } => {
                let config = Config::load()?;
                let enabled: Vec<AlertKind> = [
                    (fire, AlertKind::Fire),
                    (flood, AlertKind::Flood),
                    (reminder, AlertKind::Reminder),
                ]
                .into_iter()
                .filter_map(|(on, toggle)| on.then_some(toggle))
                .collect();

                session::run(config, &enabled).await
            }
        }
    }
}

/// Explicit coordinates win; otherwise use the configured location.
fn weather_request(
    config: &Config,
    coords: Option<(f64, f64)>,
    city: Option<String>,
    country: Option<String>,
) -> WeatherRequest {
    match coords {
        Some((lat, lon)) => WeatherRequest { latitude: lat, longitude: lon, city, country },
        None => {
            let mut request = WeatherRequest::from(&config.location);
            if city.is_some() {
                request.city = city;
            }
            if country.is_some() {
                request.country = country;
            }
            request
        }
    }
}

async fn configure() -> Result<()> {
    let mut config = Config::load_file()?;

    let key = Password::new("OpenWeather API key (empty to use Open-Meteo only):")
        .without_confirmation()
        .prompt()?;
    if key.trim().is_empty() {
        config.remove_provider(ProviderId::OpenWeather);
    } else {
        config.upsert_provider_api_key(ProviderId::OpenWeather, key.trim().to_string());
    }

    let current_url = config.readings_url.clone().unwrap_or_default();
    let url = Text::new("Readings backend URL (empty to disable fire alerts):")
        .with_default(&current_url)
        .prompt()?;
    config.readings_url = Some(url.trim().to_string()).filter(|u| !u.is_empty());

    if config.readings_url.is_some() {
        config.fire_alert_available = Confirm::new("Enable fire monitoring?")
            .with_default(config.fire_alert_available)
            .prompt()?;
    } else {
        config.fire_alert_available = false;
    }

    let change_location = Confirm::new(&format!(
        "Default location is {}, {}. Change it?",
        config.location.city, config.location.country
    ))
    .with_default(false)
    .prompt()?;

    if change_location {
        config.location = pick_location().await?;
    }

    config.save()?;
    println!("Configuration saved to {}", Config::config_file_path()?.display());
    Ok(())
}

async fn pick_location() -> Result<LocationSelection> {
    let directory = DirectoryClient::default();

    let countries = directory.fetch_countries().await?;
    let names: Vec<String> = countries.iter().map(|c| c.name.clone()).collect();
    let country_name = Select::new("Country:", names).prompt()?;
    let country = countries
        .into_iter()
        .find(|c| c.name == country_name)
        .ok_or_else(|| anyhow!("Unknown country '{country_name}'"))?;

    let cities = directory.fetch_cities(&country.name).await?;
    let city = Select::new("City:", cities).prompt()?;

    let coords = directory
        .fetch_coordinates(&city, Some(&country.code))
        .await?
        .ok_or_else(|| anyhow!("Could not find coordinates for {city}, {}", country.name))?;

    Ok(LocationSelection {
        country: country.name,
        city,
        latitude: coords.latitude,
        longitude: coords.longitude,
    })
}
