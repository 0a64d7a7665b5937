use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Coordinates (and optional display names) to fetch current weather for.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherRequest {
    pub latitude: f64,
    pub longitude: f64,
    pub city: Option<String>,
    pub country: Option<String>,
}

impl WeatherRequest {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude, city: None, country: None }
    }

    /// Resolve the label shown next to the weather.
    ///
    /// `station` is the provider's own name for the observation point, if any.
    pub fn display_location(&self, station: Option<&str>) -> String {
        match (self.city.as_deref(), self.country.as_deref(), station) {
            (Some(city), Some(country), _) => format!("{city}, {country}"),
            (_, Some(country), Some(name)) if !name.is_empty() => format!("{name}, {country}"),
            (_, None, Some(name)) if !name.is_empty() => name.to_string(),
            _ => "Current Location".to_string(),
        }
    }
}

impl From<&LocationSelection> for WeatherRequest {
    fn from(location: &LocationSelection) -> Self {
        Self {
            latitude: location.latitude,
            longitude: location.longitude,
            city: Some(location.city.clone()),
            country: Some(location.country.clone()),
        }
    }
}

/// Provider-independent view of the current weather.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub temperature_c: i32,
    pub humidity_pct: u8,
    pub location: String,
    pub description: String,
    pub icon: String,
    pub wind_speed: Option<i32>,
    pub cloud_cover: Option<u8>,
    pub precipitation_chance: u8,
    pub is_heavy_rain: bool,
    pub meets_flood_thresholds: bool,
}

impl WeatherSnapshot {
    /// Whether the flood monitor should warn about this snapshot.
    pub fn should_warn(&self) -> bool {
        self.is_heavy_rain || self.meets_flood_thresholds
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReadingStatus {
    Normal,
    Warning,
    Critical,
    #[serde(other)]
    Unknown,
}

/// A single sensor reading returned by the readings endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FireReading {
    #[serde(rename = "_id")]
    pub id: String,
    pub status: ReadingStatus,
    pub timestamp: String,
}

impl FireReading {
    /// Parsed observation time; `None` when the backend sent garbage.
    pub fn observed_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.timestamp)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    pub fn is_critical(&self) -> bool {
        self.status == ReadingStatus::Critical
    }
}

/// The location the user picked; feeds the weather client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationSelection {
    pub country: String,
    pub city: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl Default for LocationSelection {
    fn default() -> Self {
        Self {
            country: "Philippines".to_string(),
            city: "Cagayan de Oro".to_string(),
            latitude: 8.4542,
            longitude: 124.6319,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountryOption {
    pub name: String,
    pub code: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}
