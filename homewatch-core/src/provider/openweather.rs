use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{
    classify::{self, CodeTable},
    model::{WeatherRequest, WeatherSnapshot},
    provider::{fetch_json, openmeteo::OpenMeteoProvider},
};

use super::WeatherProvider;

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org";

const API: &str = "OpenWeather";

/// Keyed primary provider.
///
/// OpenWeather's current-weather endpoint only reports a rain volume, so
/// the chance of precipitation is looked up from Open-Meteo's hourly
/// forecast when no rain fell in the last hour.
#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: String,
    base_url: String,
    http: Client,
    precipitation: OpenMeteoProvider,
}

impl OpenWeatherProvider {
    pub fn new(api_key: String) -> Self {
        let http = Client::new();
        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            precipitation: OpenMeteoProvider::with_client(
                super::openmeteo::DEFAULT_BASE_URL,
                http.clone(),
            ),
            http,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Where to look up precipitation chance when OpenWeather reports no rain.
    pub fn with_precipitation_source(mut self, source: OpenMeteoProvider) -> Self {
        self.precipitation = source;
        self
    }

    async fn fetch_current(&self, request: &WeatherRequest) -> Result<WeatherSnapshot> {
        let url = format!("{}/data/2.5/weather", self.base_url);

        let http_request = self.http.get(url).query(&[
            ("lat", request.latitude.to_string()),
            ("lon", request.longitude.to_string()),
            ("units", "metric".to_string()),
            ("appid", self.api_key.clone()),
        ]);

        let parsed: OwCurrentResponse = fetch_json(API, http_request)
            .await
            .context("Failed to fetch OpenWeather current weather")?;

        let rain_volume = parsed.rain.as_ref().and_then(|r| r.one_hour).unwrap_or(0.0);

        let precipitation_chance = match classify::precipitation_chance_from_volume(rain_volume) {
            Some(chance) => Some(chance),
            None => self.lookup_precipitation_chance(request).await,
        };

        Ok(parsed.into_snapshot(request, rain_volume, precipitation_chance))
    }

    async fn lookup_precipitation_chance(&self, request: &WeatherRequest) -> Option<u8> {
        match self.precipitation.precipitation_chance(request.latitude, request.longitude).await {
            Ok(chance) => chance,
            Err(err) => {
                warn!(error = %err, "Unable to fetch Open-Meteo precipitation probability");
                None
            }
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct OwMain {
    temp: Option<f64>,
    humidity: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    id: Option<i64>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwClouds {
    all: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwRain {
    #[serde(rename = "1h")]
    one_hour: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    name: Option<String>,
    main: Option<OwMain>,
    #[serde(default)]
    weather: Vec<OwWeather>,
    wind: Option<OwWind>,
    clouds: Option<OwClouds>,
    rain: Option<OwRain>,
}

impl OwCurrentResponse {
    fn into_snapshot(
        self,
        request: &WeatherRequest,
        rain_volume: f64,
        precipitation_chance: Option<u8>,
    ) -> WeatherSnapshot {
        let condition = self.weather.first();
        let code = condition.and_then(|c| c.id);

        let (icon, description) = match classify::openweather_condition(code) {
            Some(info) => (info.icon.to_string(), info.description.to_string()),
            None => {
                let raw = condition.and_then(|c| c.description.as_deref()).unwrap_or("Weather");
                (classify::CLOUDY.icon.to_string(), classify::capitalize_words(raw))
            }
        };

        let wind_speed = self.wind.and_then(|w| w.speed).map(|v| v.round() as i32);
        let main = self.main.unwrap_or_default();
        let precipitation_chance = precipitation_chance.unwrap_or(0);

        debug!(?code, rain_volume, precipitation_chance, "openweather observation");

        WeatherSnapshot {
            temperature_c: main.temp.unwrap_or(0.0).round() as i32,
            humidity_pct: main.humidity.unwrap_or(0.0).round().clamp(0.0, 100.0) as u8,
            location: request.display_location(self.name.as_deref()),
            description,
            icon,
            wind_speed,
            cloud_cover: self.clouds.and_then(|c| c.all).map(|v| v.clamp(0.0, 100.0) as u8),
            precipitation_chance,
            is_heavy_rain: classify::is_heavy_rain(code, CodeTable::OpenWeather, rain_volume),
            meets_flood_thresholds: classify::meets_flood_thresholds(
                Some(precipitation_chance),
                wind_speed,
            ),
        }
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    async fn current_weather(&self, request: &WeatherRequest) -> Result<WeatherSnapshot> {
        self.fetch_current(request).await
    }
}
