use anyhow::Context;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    Config, WeatherRequest, WeatherSnapshot,
    provider::{
        ProviderId, WeatherProvider, openmeteo::OpenMeteoProvider,
        openweather::OpenWeatherProvider,
    },
};

/// Weather lookup with a keyed primary provider and a keyless fallback.
///
/// A missing primary is an expected degraded mode: every request goes
/// straight to the secondary. A failing primary is logged and the request
/// is retried against the secondary; only a secondary failure reaches the
/// caller.
#[derive(Debug, Clone)]
pub struct WeatherClient {
    primary: Option<Arc<dyn WeatherProvider>>,
    secondary: Arc<dyn WeatherProvider>,
}

impl WeatherClient {
    pub fn new(
        primary: Option<Arc<dyn WeatherProvider>>,
        secondary: Arc<dyn WeatherProvider>,
    ) -> Self {
        Self { primary, secondary }
    }

    /// OpenWeather if an API key is configured, Open-Meteo otherwise.
    pub fn from_config(config: &Config) -> Self {
        let primary = config.provider_api_key(ProviderId::OpenWeather).map(|key| {
            Arc::new(OpenWeatherProvider::new(key.to_owned())) as Arc<dyn WeatherProvider>
        });

        Self::new(primary, Arc::new(OpenMeteoProvider::new()))
    }

    pub fn has_primary(&self) -> bool {
        self.primary.is_some()
    }

    pub async fn fetch_current_weather(
        &self,
        request: &WeatherRequest,
    ) -> anyhow::Result<WeatherSnapshot> {
        match &self.primary {
            None => {
                warn!("OpenWeather API key missing. Falling back to Open-Meteo.");
            }
            Some(primary) => match primary.current_weather(request).await {
                Ok(snapshot) => return Ok(snapshot),
                Err(err) => {
                    warn!(
                        error = %format!("{err:#}"),
                        "OpenWeather request failed. Falling back to Open-Meteo."
                    );
                }
            },
        }

        let snapshot = self
            .secondary
            .current_weather(request)
            .await
            .context("Weather service unavailable")?;

        info!(location = %snapshot.location, "weather served by fallback provider");
        Ok(snapshot)
    }
}

#[async_trait]
impl WeatherProvider for WeatherClient {
    async fn current_weather(&self, request: &WeatherRequest) -> anyhow::Result<WeatherSnapshot> {
        self.fetch_current_weather(request).await
    }
}
