//! Weather code tables and flood-risk rules.
//!
//! Both providers report conditions with their own code scheme: OpenWeather
//! uses numeric ranges, Open-Meteo uses WMO interpretation codes. The
//! thresholds below are fixed policy values.

use chrono::NaiveDateTime;

/// Precipitation probability (percent) at or above which flood risk is raised.
pub const FLOOD_PRECIPITATION_CHANCE_PCT: u8 = 70;
/// Wind speed at or above which flood risk is raised.
pub const FLOOD_WIND_SPEED: i32 = 60;
/// Precipitation volume (mm) that counts as heavy rain on its own.
pub const HEAVY_RAIN_VOLUME_MM: f64 = 10.0;

const OPENWEATHER_HEAVY_RAIN: [i64; 5] = [502, 503, 504, 522, 531];
const WMO_HEAVY_RAIN: [i64; 8] = [63, 65, 66, 67, 82, 95, 96, 99];

/// Which code scheme a condition code belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeTable {
    OpenWeather,
    Wmo,
}

/// Icon key and label for a weather condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConditionDisplay {
    pub icon: &'static str,
    pub description: &'static str,
}

const fn display(icon: &'static str, description: &'static str) -> ConditionDisplay {
    ConditionDisplay { icon, description }
}

pub const CLOUDY: ConditionDisplay = display("weather-cloudy", "Cloudy");

/// Look up `code` in `table`, falling back to the generic cloudy entry.
pub fn classify(code: Option<i64>, table: CodeTable) -> ConditionDisplay {
    let found = match table {
        CodeTable::OpenWeather => openweather_condition(code),
        CodeTable::Wmo => wmo_condition(code),
    };
    found.unwrap_or(CLOUDY)
}

/// OpenWeather condition ids, see <https://openweathermap.org/weather-conditions>.
pub fn openweather_condition(id: Option<i64>) -> Option<ConditionDisplay> {
    let id = id.filter(|id| *id != 0)?;

    let entry = match id {
        200..=299 => display("weather-lightning", "Thunderstorm"),
        300..=399 => display("weather-rainy", "Drizzle"),
        500..=503 => display("weather-rainy", "Rainy"),
        511 => display("weather-snowy-rainy", "Freezing Rain"),
        520..=599 => display("weather-pouring", "Rain Showers"),
        600..=699 => display("weather-snowy", "Snowy"),
        700..=799 => display("weather-fog", "Hazy"),
        800 => display("weather-sunny", "Clear"),
        801 => display("weather-partly-cloudy", "Mostly Sunny"),
        802 => display("weather-partly-cloudy", "Partly Cloudy"),
        803 => display("weather-cloudy", "Mostly Cloudy"),
        804 => display("weather-cloudy", "Overcast"),
        _ => return None,
    };

    Some(entry)
}

/// WMO weather interpretation codes as reported by Open-Meteo.
pub fn wmo_condition(code: Option<i64>) -> Option<ConditionDisplay> {
    let entry = match code? {
        0 => display("weather-sunny", "Clear"),
        1 => display("weather-sunny-alert", "Mostly Clear"),
        2 => display("weather-partly-cloudy", "Partly Cloudy"),
        3 => display("weather-cloudy", "Overcast"),
        45 | 48 => display("weather-fog", "Foggy"),
        51 | 53 | 55 => display("weather-rainy", "Drizzle"),
        56 | 57 => display("weather-snowy-rainy", "Freezing Drizzle"),
        61 | 63 | 65 => display("weather-pouring", "Rainy"),
        66 | 67 => display("weather-snowy-rainy", "Freezing Rain"),
        71 | 73 | 75 => display("weather-snowy", "Snowy"),
        77 => display("weather-snowy-heavy", "Snow Grains"),
        80..=82 => display("weather-pouring", "Rain Showers"),
        85 | 86 => display("weather-snowy-heavy", "Snow Showers"),
        95 => display("weather-lightning", "Thunderstorm"),
        96 | 99 => display("weather-hail", "Thunderstorm & Hail"),
        _ => return None,
    };

    Some(entry)
}

pub fn is_heavy_rain_code(code: Option<i64>, table: CodeTable) -> bool {
    let Some(code) = code else { return false };
    match table {
        CodeTable::OpenWeather => OPENWEATHER_HEAVY_RAIN.contains(&code),
        CodeTable::Wmo => WMO_HEAVY_RAIN.contains(&code),
    }
}

pub fn is_heavy_rain(code: Option<i64>, table: CodeTable, precipitation_mm: f64) -> bool {
    is_heavy_rain_code(code, table) || precipitation_mm >= HEAVY_RAIN_VOLUME_MM
}

/// Absent readings count as zero.
pub fn meets_flood_thresholds(precipitation_chance: Option<u8>, wind_speed: Option<i32>) -> bool {
    precipitation_chance.unwrap_or(0) >= FLOOD_PRECIPITATION_CHANCE_PCT
        || wind_speed.unwrap_or(0) >= FLOOD_WIND_SPEED
}

/// Rough chance of rain derived from the last hour's rain volume.
///
/// Returns `None` when there was no rain, so the caller can look it up elsewhere.
pub fn precipitation_chance_from_volume(volume_mm: f64) -> Option<u8> {
    if volume_mm > 0.0 {
        Some((volume_mm * 50.0).round().min(100.0) as u8)
    } else {
        None
    }
}

/// Pick the hourly probability whose timestamp is nearest to `target`.
///
/// Timestamps that fail to parse are skipped; ties go to the earliest entry.
pub fn nearest_precipitation_probability(
    times: &[String],
    probabilities: &[Option<f64>],
    target: NaiveDateTime,
) -> Option<u8> {
    let (index, _) = times
        .iter()
        .enumerate()
        .filter_map(|(i, t)| parse_hourly_time(t).map(|ts| (i, (ts - target).num_seconds().abs())))
        .min_by_key(|(_, delta)| *delta)?;

    let value = probabilities.get(index).copied().flatten()?;
    Some(value.round().clamp(0.0, 100.0) as u8)
}

/// Open-Meteo reports hourly times as `2024-05-01T13:00`, sometimes with seconds.
pub fn parse_hourly_time(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .ok()
}

/// Upper-case the first letter of each word, e.g. "light rain" -> "Light Rain".
pub fn capitalize_words(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut at_word_start = true;

    for ch in text.chars() {
        if at_word_start && ch.is_alphanumeric() {
            out.extend(ch.to_uppercase());
        } else {
            out.push(ch);
        }
        at_word_start = !(ch.is_alphanumeric() || ch == '_');
    }

    out
}
