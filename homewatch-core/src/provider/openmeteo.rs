use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::{
    classify::{self, CodeTable},
    model::{WeatherRequest, WeatherSnapshot},
    provider::fetch_json,
};

use super::WeatherProvider;

pub const DEFAULT_BASE_URL: &str = "https://api.open-meteo.com";

const API: &str = "Open-Meteo";

/// Keyless secondary provider.
#[derive(Debug, Clone)]
pub struct OpenMeteoProvider {
    base_url: String,
    http: Client,
}

impl Default for OpenMeteoProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl OpenMeteoProvider {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    pub fn with_client(base_url: impl Into<String>, http: Client) -> Self {
        Self { base_url: base_url.into().trim_end_matches('/').to_string(), http }
    }

    fn forecast_url(&self) -> String {
        format!("{}/v1/forecast", self.base_url)
    }

    /// Chance of precipitation for the hour nearest to the provider's "now".
    pub async fn precipitation_chance(&self, latitude: f64, longitude: f64) -> Result<Option<u8>> {
        let request = self.http.get(self.forecast_url()).query(&[
            ("latitude", latitude.to_string()),
            ("longitude", longitude.to_string()),
            ("current_weather", "true".to_string()),
            ("hourly", "precipitation_probability".to_string()),
        ]);

        let parsed: OmResponse = fetch_json(API, request)
            .await
            .context("Failed to fetch Open-Meteo precipitation probability")?;

        Ok(parsed.nearest_precipitation_chance())
    }

    async fn fetch_current(&self, request: &WeatherRequest) -> Result<WeatherSnapshot> {
        let http_request = self.http.get(self.forecast_url()).query(&[
            ("latitude", request.latitude.to_string()),
            ("longitude", request.longitude.to_string()),
            (
                "current",
                "temperature_2m,weather_code,relative_humidity_2m,wind_speed_10m,precipitation"
                    .to_string(),
            ),
            ("hourly", "precipitation_probability,cloud_cover".to_string()),
            ("temperature_unit", "celsius".to_string()),
        ]);

        let parsed: OmResponse = fetch_json(API, http_request)
            .await
            .context("Failed to fetch Open-Meteo current weather")?;

        let snapshot = parsed.into_snapshot(request);
        debug!(
            location = %snapshot.location,
            description = %snapshot.description,
            "open-meteo snapshot"
        );
        Ok(snapshot)
    }
}

#[derive(Debug, Default, Deserialize)]
struct OmCurrent {
    time: Option<String>,
    temperature_2m: Option<f64>,
    weather_code: Option<i64>,
    relative_humidity_2m: Option<f64>,
    wind_speed_10m: Option<f64>,
    precipitation: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OmCurrentWeather {
    time: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OmHourly {
    #[serde(default)]
    time: Vec<String>,
    #[serde(default)]
    precipitation_probability: Vec<Option<f64>>,
    #[serde(default)]
    cloud_cover: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct OmResponse {
    current: Option<OmCurrent>,
    current_weather: Option<OmCurrentWeather>,
    hourly: Option<OmHourly>,
}

impl OmResponse {
    fn reference_time(&self) -> NaiveDateTime {
        self.current
            .as_ref()
            .and_then(|c| c.time.as_deref())
            .or_else(|| self.current_weather.as_ref().and_then(|c| c.time.as_deref()))
            .and_then(classify::parse_hourly_time)
            .unwrap_or_else(|| Utc::now().naive_utc())
    }

    fn nearest_precipitation_chance(&self) -> Option<u8> {
        let hourly = self.hourly.as_ref()?;
        classify::nearest_precipitation_probability(
            &hourly.time,
            &hourly.precipitation_probability,
            self.reference_time(),
        )
    }

    fn into_snapshot(self, request: &WeatherRequest) -> WeatherSnapshot {
        let precipitation_chance = self.nearest_precipitation_chance().unwrap_or(0);
        let cloud_cover = self
            .hourly
            .as_ref()
            .and_then(|h| h.cloud_cover.first().copied().flatten())
            .map(|v| v.round().clamp(0.0, 100.0) as u8);

        let current = self.current.unwrap_or_default();
        let code = current.weather_code;
        let info = classify::classify(code, CodeTable::Wmo);
        let wind_speed = current.wind_speed_10m.map(|v| v.round() as i32);
        let precipitation_mm = current.precipitation.unwrap_or(0.0);

        WeatherSnapshot {
            temperature_c: current.temperature_2m.unwrap_or(0.0).round() as i32,
            humidity_pct: current.relative_humidity_2m.unwrap_or(0.0).round().clamp(0.0, 100.0)
                as u8,
            location: request.display_location(None),
            description: info.description.to_string(),
            icon: info.icon.to_string(),
            wind_speed,
            cloud_cover,
            precipitation_chance,
            is_heavy_rain: classify::is_heavy_rain(code, CodeTable::Wmo, precipitation_mm),
            meets_flood_thresholds: classify::meets_flood_thresholds(
                Some(precipitation_chance),
                wind_speed,
            ),
        }
    }
}

#[async_trait]
impl WeatherProvider for OpenMeteoProvider {
    async fn current_weather(&self, request: &WeatherRequest) -> Result<WeatherSnapshot> {
        self.fetch_current(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> WeatherRequest {
        WeatherRequest {
            latitude: 8.45,
            longitude: 124.63,
            city: Some("Cagayan de Oro".into()),
            country: Some("Philippines".into()),
        }
    }

    fn stormy_body() -> serde_json::Value {
        json!({
            "current": {
                "time": "2024-05-01T11:15",
                "temperature_2m": 24.6,
                "weather_code": 95,
                "relative_humidity_2m": 88.4,
                "wind_speed_10m": 21.7,
                "precipitation": 3.2
            },
            "hourly": {
                "time": ["2024-05-01T10:00", "2024-05-01T11:00", "2024-05-01T12:00"],
                "precipitation_probability": [40, 65, 90],
                "cloud_cover": [97.6, 100, 100]
            }
        })
    }

    #[tokio::test]
    async fn normalizes_current_weather() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .and(query_param("latitude", "8.45"))
            .respond_with(ResponseTemplate::new(200).set_body_json(stormy_body()))
            .mount(&server)
            .await;

        let provider = OpenMeteoProvider::with_base_url(server.uri());
        let snapshot = provider.current_weather(&request()).await.expect("snapshot");

        assert_eq!(snapshot.temperature_c, 25);
        assert_eq!(snapshot.humidity_pct, 88);
        assert_eq!(snapshot.location, "Cagayan de Oro, Philippines");
        assert_eq!(snapshot.description, "Thunderstorm");
        assert_eq!(snapshot.icon, "weather-lightning");
        assert_eq!(snapshot.wind_speed, Some(22));
        assert_eq!(snapshot.cloud_cover, Some(98));
        assert_eq!(snapshot.precipitation_chance, 65);
        assert!(snapshot.is_heavy_rain);
        assert!(!snapshot.meets_flood_thresholds);
    }

    #[tokio::test]
    async fn missing_fields_default_to_calm_weather() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let provider = OpenMeteoProvider::with_base_url(server.uri());
        let snapshot = provider.current_weather(&WeatherRequest::new(0.0, 0.0)).await.unwrap();

        assert_eq!(snapshot.location, "Current Location");
        assert_eq!(snapshot.description, "Cloudy");
        assert_eq!(snapshot.precipitation_chance, 0);
        assert_eq!(snapshot.wind_speed, None);
        assert!(!snapshot.should_warn());
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("down"))
            .mount(&server)
            .await;

        let provider = OpenMeteoProvider::with_base_url(server.uri());
        let err = provider.current_weather(&request()).await.unwrap_err();

        let provider_err = err.downcast_ref::<crate::provider::ProviderError>();
        assert!(matches!(
            provider_err,
            Some(crate::provider::ProviderError::Status { status, .. }) if status.as_u16() == 503
        ));
    }

    #[tokio::test]
    async fn precipitation_lookup_uses_current_weather_time() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .and(query_param("hourly", "precipitation_probability"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "current_weather": { "time": "2024-05-01T12:00" },
                "hourly": {
                    "time": ["2024-05-01T11:00", "2024-05-01T12:00"],
                    "precipitation_probability": [10, 77]
                }
            })))
            .mount(&server)
            .await;

        let provider = OpenMeteoProvider::with_base_url(server.uri());
        let chance = provider.precipitation_chance(1.0, 2.0).await.unwrap();

        assert_eq!(chance, Some(77));
    }
}
