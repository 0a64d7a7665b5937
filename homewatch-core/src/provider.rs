use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use thiserror::Error;

use crate::{WeatherRequest, WeatherSnapshot};

pub mod openmeteo;
pub mod openweather;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    OpenWeather,
    OpenMeteo,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::OpenWeather => "openweather",
            ProviderId::OpenMeteo => "openmeteo",
        }
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    async fn current_weather(&self, request: &WeatherRequest) -> anyhow::Result<WeatherSnapshot>;
}

/// Failure talking to an HTTP JSON API.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request to {api} failed")]
    Transport {
        api: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{api} request failed with status {status}: {body}")]
    Status { api: &'static str, status: StatusCode, body: String },

    #[error("failed to parse {api} response")]
    Parse {
        api: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Send `request` and decode a successful JSON body into `T`.
pub(crate) async fn fetch_json<T: DeserializeOwned>(
    api: &'static str,
    request: RequestBuilder,
) -> Result<T, ProviderError> {
    let res = request.send().await.map_err(|source| ProviderError::Transport { api, source })?;

    let status = res.status();
    let body = res.text().await.map_err(|source| ProviderError::Transport { api, source })?;

    if !status.is_success() {
        return Err(ProviderError::Status { api, status, body: truncate_body(&body) });
    }

    serde_json::from_str(&body).map_err(|source| ProviderError::Parse { api, source })
}

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() > MAX {
        let mut end = MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &body[..end])
    } else {
        body.to_string()
    }
}
