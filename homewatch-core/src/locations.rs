//! Country and city directories used by the location picker.

use anyhow::{Context, Result, anyhow};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::{
    model::{Coordinates, CountryOption},
    provider::{ProviderError, fetch_json},
};

pub const REST_COUNTRIES_URL: &str = "https://restcountries.com";
pub const COUNTRIES_NOW_URL: &str = "https://countriesnow.space";
pub const GEOCODING_URL: &str = "https://geocoding-api.open-meteo.com";

#[derive(Debug, Clone)]
pub struct DirectoryClient {
    countries_url: String,
    cities_url: String,
    geocoding_url: String,
    http: Client,
}

impl Default for DirectoryClient {
    fn default() -> Self {
        Self::new(REST_COUNTRIES_URL, COUNTRIES_NOW_URL, GEOCODING_URL)
    }
}

impl DirectoryClient {
    pub fn new(countries_base: &str, cities_base: &str, geocoding_base: &str) -> Self {
        Self {
            countries_url: format!("{}/v3.1/all", countries_base.trim_end_matches('/')),
            cities_url: format!("{}/api/v0.1/countries/cities", cities_base.trim_end_matches('/')),
            geocoding_url: format!("{}/v1/search", geocoding_base.trim_end_matches('/')),
            http: Client::new(),
        }
    }

    /// All countries, sorted by common name.
    pub async fn fetch_countries(&self) -> Result<Vec<CountryOption>> {
        let request = self
            .http
            .get(&self.countries_url)
            .query(&[("fields", "name,cca2,capital,capitalInfo,latlng")]);

        let data: Vec<RestCountry> =
            fetch_json("REST Countries", request).await.context("Unable to load countries")?;

        let mut countries: Vec<CountryOption> = data
            .into_iter()
            .map(|c| CountryOption {
                name: c.name.and_then(|n| n.common).unwrap_or_else(|| c.cca2.clone()),
                code: c.cca2,
            })
            .collect();

        countries.sort_by_cached_key(|c| sort_key(&c.name));
        Ok(countries)
    }

    /// Cities of `country` (by name), de-duplicated and sorted alphabetically.
    pub async fn fetch_cities(&self, country: &str) -> Result<Vec<String>> {
        let request = self.http.post(&self.cities_url).json(&CityListRequest { country });

        let data: CityListResponse =
            fetch_json("CountriesNow", request).await.context("Unable to load cities")?;

        let cities = match data {
            CityListResponse { error: false, data: Some(cities), .. } => cities,
            CityListResponse { msg, .. } => {
                let msg = msg.filter(|m| !m.is_empty());
                return Err(anyhow!(msg.unwrap_or_else(|| "City list unavailable".to_string())));
            }
        };

        let unique: BTreeSet<String> = cities.into_iter().filter(|c| !c.is_empty()).collect();
        let mut cities: Vec<String> = unique.into_iter().collect();
        cities.sort_by_cached_key(|c| sort_key(c));

        Ok(cities)
    }

    /// First geocoding match for `city`, optionally restricted to an ISO country code.
    ///
    /// Lookup failures on the server side are reported as "no match".
    pub async fn fetch_coordinates(
        &self,
        city: &str,
        country_code: Option<&str>,
    ) -> Result<Option<Coordinates>> {
        let mut params = vec![
            ("count", "1"),
            ("language", "en"),
            ("format", "json"),
            ("name", city),
        ];
        if let Some(code) = country_code {
            params.push(("country", code));
        }

        let request = self.http.get(&self.geocoding_url).query(&params);

        let data: GeocodeResponse = match fetch_json("Open-Meteo geocoding", request).await {
            Ok(data) => data,
            Err(ProviderError::Status { .. }) => return Ok(None),
            Err(err) => return Err(err).context("Unable to resolve city coordinates"),
        };

        Ok(data.results.into_iter().next().map(|m| Coordinates {
            latitude: m.latitude,
            longitude: m.longitude,
        }))
    }
}

#[derive(Debug, Deserialize)]
struct RestCountryName {
    common: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RestCountry {
    name: Option<RestCountryName>,
    cca2: String,
}

#[derive(Debug, Serialize)]
struct CityListRequest<'a> {
    country: &'a str,
}

#[derive(Debug, Deserialize)]
struct CityListResponse {
    #[serde(default)]
    error: bool,
    msg: Option<String>,
    data: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct GeocodeMatch {
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    #[serde(default)]
    results: Vec<GeocodeMatch>,
}

/// Alphabetical ordering key: case-insensitive, with Latin accents folded
/// onto their base letter so "Åland" sorts with the A's.
fn sort_key(name: &str) -> String {
    name.chars()
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            'à'..='å' => 'a',
            'ç' => 'c',
            'è'..='ë' => 'e',
            'ì'..='ï' => 'i',
            'ñ' => 'n',
            'ò'..='ö' | 'ø' => 'o',
            'ù'..='ü' => 'u',
            'ý' | 'ÿ' => 'y',
            other => other,
        })
        .collect()
}
