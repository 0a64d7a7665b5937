use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs, path::PathBuf, time::Duration};

use crate::{model::LocationSelection, provider::ProviderId};

pub const ENV_OPENWEATHER_API_KEY: &str = "HOMEWATCH_OPENWEATHER_API_KEY";
pub const ENV_API_URL: &str = "HOMEWATCH_API_URL";
pub const ENV_FIRE_ALERT_ENABLED: &str = "HOMEWATCH_FIRE_ALERT_ENABLED";

/// Configuration for a single provider (e.g., API key).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub api_key: String,
}

/// Polling cadence and alert windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub fire_interval_secs: u64,
    pub fire_freshness_secs: u64,
    pub flood_interval_secs: u64,
    pub reminder_cooldown_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            fire_interval_secs: 3,
            fire_freshness_secs: 30,
            flood_interval_secs: 180,
            reminder_cooldown_secs: 60,
        }
    }
}

impl PollingConfig {
    pub fn fire_interval(&self) -> Duration {
        Duration::from_secs(self.fire_interval_secs.max(1))
    }

    pub fn fire_freshness(&self) -> Duration {
        Duration::from_secs(self.fire_freshness_secs)
    }

    pub fn flood_interval(&self) -> Duration {
        Duration::from_secs(self.flood_interval_secs.max(1))
    }

    pub fn reminder_cooldown(&self) -> Duration {
        Duration::from_secs(self.reminder_cooldown_secs)
    }
}

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Base URL of the backend serving `/api/readings`.
    pub readings_url: Option<String>,

    /// Build-time style switch: fire monitoring does not run at all unless set.
    #[serde(default)]
    pub fire_alert_available: bool,

    /// Example TOML:
    /// [providers.openweather]
    /// api_key = "..."
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Location used until the user picks another one.
    #[serde(default)]
    pub location: LocationSelection,

    #[serde(default)]
    pub polling: PollingConfig,
}

impl Config {
    /// Load config from disk (or defaults on first run), then apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut cfg = Self::load_file()?;
        cfg.apply_env(|key| std::env::var(key).ok());
        Ok(cfg)
    }

    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load_file() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            // First run: no config file, return empty.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Override file values with `HOMEWATCH_*` variables read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(ENV_OPENWEATHER_API_KEY).filter(|k| !k.trim().is_empty()) {
            self.upsert_provider_api_key(ProviderId::OpenWeather, key);
        }

        if let Some(url) = lookup(ENV_API_URL).filter(|u| !u.trim().is_empty()) {
            self.readings_url = Some(url);
        }

        if let Some(flag) = lookup(ENV_FIRE_ALERT_ENABLED) {
            self.fire_alert_available = flag == "true";
        }
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "homewatch", "homewatch")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Set or replace a provider API key.
    pub fn upsert_provider_api_key(&mut self, provider_id: ProviderId, api_key: String) {
        self.providers.insert(provider_id.as_str().to_string(), ProviderConfig { api_key });
    }

    pub fn remove_provider(&mut self, provider_id: ProviderId) {
        self.providers.remove(provider_id.as_str());
    }

    /// Returns API key for a provider, if present and non-blank.
    pub fn provider_api_key(&self, provider_id: ProviderId) -> Option<&str> {
        self.providers
            .get(provider_id.as_str())
            .map(|cfg| cfg.api_key.as_str())
            .filter(|key| !key.trim().is_empty())
    }

    /// Fire monitoring runs only when switched on and a backend is known.
    pub fn fire_monitoring_possible(&self) -> bool {
        self.fire_alert_available && self.readings_url.as_deref().is_some_and(|u| !u.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_shipping_values() {
        let cfg = Config::default();

        assert_eq!(cfg.polling.fire_interval(), Duration::from_secs(3));
        assert_eq!(cfg.polling.fire_freshness(), Duration::from_secs(30));
        assert_eq!(cfg.polling.flood_interval(), Duration::from_secs(180));
        assert_eq!(cfg.polling.reminder_cooldown(), Duration::from_secs(60));
        assert_eq!(cfg.location.city, "Cagayan de Oro");
        assert!(!cfg.fire_alert_available);
        assert!(!cfg.fire_monitoring_possible());
    }

    #[test]
    fn set_api_key_for_provider() {
        let mut cfg = Config::default();

        cfg.upsert_provider_api_key(ProviderId::OpenWeather, "OPEN_KEY".into());

        let key = cfg.provider_api_key(ProviderId::OpenWeather);
        assert_eq!(key, Some("OPEN_KEY"));
    }

    #[test]
    fn blank_key_counts_as_missing() {
        let mut cfg = Config::default();
        cfg.upsert_provider_api_key(ProviderId::OpenWeather, "  ".into());

        assert!(cfg.providers.contains_key("openweather"));
        assert_eq!(cfg.provider_api_key(ProviderId::OpenWeather), None);
    }

    #[test]
    fn parses_partial_toml() {
        let cfg = Config::from_toml(
            r#"
            readings_url = "http://192.168.1.20:5000"
            fire_alert_available = true

            [providers.openweather]
            api_key = "abc"

            [polling]
            flood_interval_secs = 60
            "#,
        )
        .expect("valid config");

        assert_eq!(cfg.provider_api_key(ProviderId::OpenWeather), Some("abc"));
        assert!(cfg.fire_monitoring_possible());
        assert_eq!(cfg.polling.flood_interval(), Duration::from_secs(60));
        assert_eq!(cfg.polling.fire_interval(), Duration::from_secs(3));
        assert_eq!(cfg.location, LocationSelection::default());
    }

    #[test]
    fn env_overrides_file_values() {
        let mut cfg = Config::default();
        cfg.fire_alert_available = true;

        cfg.apply_env(env(&[
            (ENV_OPENWEATHER_API_KEY, "ENV_KEY"),
            (ENV_API_URL, "http://backend:8080"),
            (ENV_FIRE_ALERT_ENABLED, "TRUE"),
        ]));

        assert_eq!(cfg.provider_api_key(ProviderId::OpenWeather), Some("ENV_KEY"));
        assert_eq!(cfg.readings_url.as_deref(), Some("http://backend:8080"));
        // Only the exact lowercase literal switches the feature on.
        assert!(!cfg.fire_alert_available);

        cfg.apply_env(env(&[(ENV_FIRE_ALERT_ENABLED, "true")]));
        assert!(cfg.fire_alert_available);
    }

    #[test]
    fn save_format_round_trips_through_toml() {
        let mut cfg = Config::default();
        cfg.upsert_provider_api_key(ProviderId::OpenWeather, "K".into());
        cfg.readings_url = Some("http://x".into());

        let text = toml::to_string_pretty(&cfg).expect("serializable");
        let back = Config::from_toml(&text).expect("parsable");

        assert_eq!(back.provider_api_key(ProviderId::OpenWeather), Some("K"));
        assert_eq!(back.readings_url.as_deref(), Some("http://x"));
    }
}
