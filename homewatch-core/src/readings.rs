use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use std::fmt::Debug;

use crate::{Config, model::FireReading, provider::fetch_json};

const API: &str = "readings API";

/// Anything that can hand the fire monitor the latest sensor readings.
///
/// Readings come back newest-first.
#[async_trait]
pub trait ReadingsSource: Send + Sync + Debug {
    async fn fetch_readings(&self) -> Result<Vec<FireReading>>;
}

/// Client for `GET {base}/api/readings`.
#[derive(Debug, Clone)]
pub struct HttpReadingsClient {
    url: String,
    http: Client,
}

impl HttpReadingsClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            url: format!("{}/api/readings", base_url.trim_end_matches('/')),
            http: Client::new(),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let base = config.readings_url.as_deref().filter(|url| !url.is_empty()).ok_or_else(|| {
            anyhow!(
                "Missing fire API URL.\n\
                 Hint: set HOMEWATCH_API_URL or run `homewatch configure`."
            )
        })?;

        Ok(Self::new(base))
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ReadingsSource for HttpReadingsClient {
    async fn fetch_readings(&self) -> Result<Vec<FireReading>> {
        fetch_json(API, self.http.get(&self.url)).await.context("Unable to fetch fire readings")
    }
}
