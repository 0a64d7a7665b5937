//! Core library for the `homewatch` smart home companion.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - Weather providers with primary/fallback selection and flood-risk classification
//! - Clients for the fire readings backend and the location directories
//! - Shared notification/location state
//! - The fire, flood and reminder alert monitors
//!
//! It is used by `homewatch-cli`, but can also be embedded in other front ends.

pub mod classify;
pub mod client;
pub mod config;
pub mod locations;
pub mod model;
pub mod monitor;
pub mod provider;
pub mod readings;
pub mod settings;

pub use client::WeatherClient;
pub use config::{Config, PollingConfig, ProviderConfig};
pub use locations::DirectoryClient;
pub use model::{
    Coordinates, CountryOption, FireReading, LocationSelection, ReadingStatus, WeatherRequest,
    WeatherSnapshot,
};
pub use monitor::{AlertEvent, AlertKind, AlertSupervisor, HideReason, MonitorHandle};
pub use provider::{ProviderId, WeatherProvider};
pub use readings::{HttpReadingsClient, ReadingsSource};
pub use settings::{LocationStore, NotificationSettings, SettingsStore};
