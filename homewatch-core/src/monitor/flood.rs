use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use tokio::{
    sync::{mpsc, watch},
    time::{self, Interval, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use crate::{
    config::PollingConfig,
    model::{LocationSelection, WeatherRequest, WeatherSnapshot},
    provider::WeatherProvider,
};

use super::{
    AlertCommand, AlertEvent, AlertKind, HideReason, MonitorContext, MonitorHandle, PollGuard,
    PollTicket, emit, next_tick,
};

pub const FLOOD_VIBRATION: &[u64] = &[500, 300, 500];

const TITLE: &str = "HEAVY RAIN WARNING";

/// Flood warning lifecycle.
///
/// Once acknowledged, the warning stays quiet until a poll reports calm
/// weather; only then can the next storm raise it again. A storm that
/// persists across polls never re-alerts.
#[derive(Debug, Clone, Default)]
pub struct FloodAlertState {
    visible: bool,
    acknowledged_at: Option<DateTime<Utc>>,
}

impl FloodAlertState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn acknowledged_at(&self) -> Option<DateTime<Utc>> {
        self.acknowledged_at
    }

    pub fn evaluate(&mut self, snapshot: &WeatherSnapshot, city: &str) -> Vec<AlertEvent> {
        if snapshot.should_warn() {
            if self.visible || self.acknowledged_at.is_some() {
                return Vec::new();
            }
            self.visible = true;
            return vec![
                AlertEvent::Shown { kind: AlertKind::Flood, title: TITLE, message: message(city) },
                AlertEvent::Haptic { kind: AlertKind::Flood, pattern: FLOOD_VIBRATION },
            ];
        }

        // Conditions cleared: re-arm for the next occurrence.
        self.acknowledged_at = None;
        if self.visible {
            self.visible = false;
            return vec![AlertEvent::Hidden {
                kind: AlertKind::Flood,
                reason: HideReason::ConditionCleared,
            }];
        }
        Vec::new()
    }

    pub fn acknowledge(&mut self, now: DateTime<Utc>) -> Vec<AlertEvent> {
        if !self.visible {
            return Vec::new();
        }
        self.visible = false;
        self.acknowledged_at = Some(now);
        vec![
            AlertEvent::Hidden { kind: AlertKind::Flood, reason: HideReason::Acknowledged },
            AlertEvent::NavigateHome,
        ]
    }

    /// Force-hide; an earlier acknowledgement is kept.
    pub fn disable(&mut self) -> Vec<AlertEvent> {
        if !self.visible {
            return Vec::new();
        }
        self.visible = false;
        vec![AlertEvent::Hidden { kind: AlertKind::Flood, reason: HideReason::Disabled }]
    }
}

fn message(city: &str) -> String {
    format!(
        "Severe rainfall has been detected near {city}. Flood alert is active. \
         Please secure low-lying areas and monitor water levels."
    )
}

type PollResult = (PollTicket, anyhow::Result<WeatherSnapshot>);

/// Polls current weather for the selected location while flood alerts are enabled.
#[derive(Debug)]
pub struct FloodMonitor {
    weather: Arc<dyn WeatherProvider>,
    interval: Duration,
    state: FloodAlertState,
}

impl FloodMonitor {
    pub fn new(weather: Arc<dyn WeatherProvider>, polling: &PollingConfig) -> Self {
        Self { weather, interval: polling.flood_interval(), state: FloodAlertState::new() }
    }

    pub fn spawn(
        self,
        ctx: MonitorContext,
        location: watch::Receiver<LocationSelection>,
    ) -> MonitorHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(self.run(ctx, location, rx));
        MonitorHandle::new(AlertKind::Flood, tx, task)
    }

    /// Polls immediately, then once per interval.
    fn ticker(&self) -> Interval {
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    }

    async fn run(
        mut self,
        ctx: MonitorContext,
        mut location: watch::Receiver<LocationSelection>,
        mut commands: mpsc::UnboundedReceiver<AlertCommand>,
    ) {
        let MonitorContext { mut settings, events, shutdown } = ctx;
        let (results_tx, mut results) = mpsc::unbounded_channel::<PollResult>();
        let mut guard = PollGuard::default();

        let mut enabled = settings.borrow_and_update().flood_alert_enabled;
        let mut ticker = enabled.then(|| self.ticker());
        info!(enabled, interval = ?self.interval, "flood monitor started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,

                changed = settings.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let now_enabled = settings.borrow_and_update().flood_alert_enabled;
                    if now_enabled == enabled {
                        continue;
                    }
                    enabled = now_enabled;
                    guard.invalidate();

                    if enabled {
                        ticker = Some(self.ticker());
                    } else {
                        ticker = None;
                        emit(&events, self.state.disable());
                    }
                }

                Ok(()) = location.changed() => {
                    location.borrow_and_update();
                    guard.invalidate();
                    if enabled {
                        ticker = Some(self.ticker());
                    }
                }

                Some(command) = commands.recv() => match command {
                    AlertCommand::Acknowledge => {
                        emit(&events, self.state.acknowledge(Utc::now()));
                    }
                },

                _ = next_tick(&mut ticker) => {
                    let ticket = guard.issue();
                    let request = WeatherRequest::from(&*location.borrow());
                    let weather = Arc::clone(&self.weather);
                    let tx = results_tx.clone();
                    tokio::spawn(async move {
                        let result = weather.current_weather(&request).await;
                        let _ = tx.send((ticket, result));
                    });
                }

                Some((ticket, result)) = results.recv() => {
                    if !guard.accept(ticket) {
                        debug!("discarding stale weather result");
                        continue;
                    }
                    match result {
                        Ok(snapshot) => {
                            debug!(
                                heavy_rain = snapshot.is_heavy_rain,
                                thresholds = snapshot.meets_flood_thresholds,
                                "flood check"
                            );
                            let city = location.borrow().city.clone();
                            emit(&events, self.state.evaluate(&snapshot, &city));
                        }
                        Err(err) => {
                            warn!(error = %format!("{err:#}"), "flood alert weather check failed");
                        }
                    }
                }
            }
        }

        debug!("flood monitor stopped");
    }
}
