use std::fmt::Write;

use homewatch_core::{AlertEvent, HideReason, NotificationSettings, WeatherSnapshot};

pub fn weather(s: &WeatherSnapshot) -> String {
    let mut out = String::new();
    let opt = |v: Option<String>| v.unwrap_or_else(|| "n/a".to_string());

    let _ = writeln!(out, "{}", s.location);
    let _ = writeln!(out, "  {} ({})", s.description, s.icon);
    let _ = writeln!(out, "  Temperature: {}°C   Humidity: {}%", s.temperature_c, s.humidity_pct);
    let _ = writeln!(
        out,
        "  Wind: {}   Clouds: {}   Rain chance: {}%",
        opt(s.wind_speed.map(|w| w.to_string())),
        opt(s.cloud_cover.map(|c| format!("{c}%"))),
        s.precipitation_chance,
    );
    let _ = writeln!(
        out,
        "  Flood risk: {}",
        match (s.is_heavy_rain, s.meets_flood_thresholds) {
            (true, true) => "HIGH (heavy rain, thresholds exceeded)",
            (true, false) => "HIGH (heavy rain)",
            (false, true) => "HIGH (thresholds exceeded)",
            (false, false) => "low",
        }
    );

    out
}

pub fn event(event: &AlertEvent) -> String {
    match event {
        AlertEvent::Shown { kind, title, message } => {
            format!("{title}\n  {message}\n  (type `ack {kind}` to acknowledge)")
        }
        AlertEvent::Hidden { kind, reason } => {
            let why = match reason {
                HideReason::Acknowledged => "acknowledged",
                HideReason::Disabled => "alerts turned off",
                HideReason::ConditionCleared => "conditions cleared",
            };
            format!("{kind} alert closed ({why})")
        }
        AlertEvent::Haptic { pattern, .. } => {
            let steps: Vec<String> = pattern.iter().map(|ms| ms.to_string()).collect();
            format!("* vibrate {} ms *", steps.join("/"))
        }
        AlertEvent::NavigateHome => "-> home".to_string(),
    }
}

pub fn status(settings: &NotificationSettings, fire_available: bool) -> String {
    let flag = |on: bool| if on { "on" } else { "off" };
    let fire = if fire_available { flag(settings.fire_alert_enabled) } else { "unavailable" };

    format!(
        "fire: {fire}   flood: {}   reminder: {}",
        flag(settings.flood_alert_enabled),
        flag(settings.reminder_enabled),
    )
}
