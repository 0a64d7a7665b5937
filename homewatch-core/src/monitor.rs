//! Background alert monitors.
//!
//! Each monitor is a small state machine (what to show, when to stay
//! quiet) driven by a tokio task that owns at most one timer. The task
//! rebuilds its timer whenever the relevant notification toggle (or, for
//! floods, the location) changes, and stops when the shared
//! [`CancellationToken`] fires.
//!
//! Monitors never touch a UI. They emit [`AlertEvent`]s and accept
//! [`AlertCommand`]s through a [`MonitorHandle`].

use std::{future, pin::Pin, sync::Arc};

use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
    time::{Interval, Sleep},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{
    Config, WeatherClient,
    provider::WeatherProvider,
    readings::{HttpReadingsClient, ReadingsSource},
    settings::{LocationStore, NotificationSettings, SettingsStore},
};

pub mod fire;
pub mod flood;
pub mod reminder;

pub use fire::{FireAlertState, FireMonitor};
pub use flood::{FloodAlertState, FloodMonitor};
pub use reminder::{REMINDER_TIPS, ReminderMonitor, ReminderState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertKind {
    Fire,
    Flood,
    Reminder,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::Fire => "fire",
            AlertKind::Flood => "flood",
            AlertKind::Reminder => "reminder",
        }
    }
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for AlertKind {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "fire" => Ok(AlertKind::Fire),
            "flood" => Ok(AlertKind::Flood),
            "reminder" | "reminders" => Ok(AlertKind::Reminder),
            _ => Err(anyhow::anyhow!(
                "Unknown alert '{value}'. Supported alerts: fire, flood, reminder."
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HideReason {
    Acknowledged,
    Disabled,
    ConditionCleared,
}

/// Side effects requested by a monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertEvent {
    Shown { kind: AlertKind, title: &'static str, message: String },
    Hidden { kind: AlertKind, reason: HideReason },
    /// Vibration pattern in milliseconds, alternating on/off.
    Haptic { kind: AlertKind, pattern: &'static [u64] },
    NavigateHome,
}

/// User input routed to a single monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertCommand {
    Acknowledge,
}

pub type EventSender = mpsc::UnboundedSender<AlertEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<AlertEvent>;

/// What every monitor task needs from the outside world.
#[derive(Debug, Clone)]
pub struct MonitorContext {
    pub settings: watch::Receiver<NotificationSettings>,
    pub events: EventSender,
    pub shutdown: CancellationToken,
}

#[derive(Debug)]
pub struct MonitorHandle {
    kind: AlertKind,
    commands: mpsc::UnboundedSender<AlertCommand>,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    pub(crate) fn new(
        kind: AlertKind,
        commands: mpsc::UnboundedSender<AlertCommand>,
        task: JoinHandle<()>,
    ) -> Self {
        Self { kind, commands, task }
    }

    /// Acknowledge (dismiss) the visible alert. Returns false once the task is gone.
    pub fn acknowledge(&self) -> bool {
        self.commands.send(AlertCommand::Acknowledge).is_ok()
    }

    pub async fn join(self) {
        if let Err(err) = self.task.await {
            debug!(kind = %self.kind, error = %err, "monitor task ended abnormally");
        }
    }
}

pub(crate) fn emit(events: &EventSender, batch: Vec<AlertEvent>) {
    for event in batch {
        // A closed channel means nobody is listening any more; nothing to do.
        let _ = events.send(event);
    }
}

/// Resolves on the next tick, or never when there is no timer.
pub(crate) async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => future::pending::<()>().await,
    }
}

pub(crate) async fn next_deadline(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(sleep) => sleep.as_mut().await,
        None => future::pending::<()>().await,
    }
}

/// Identifies one poll so late results can be told apart from fresh ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PollTicket {
    generation: u64,
    seq: u64,
}

/// Discards poll results that were overtaken by a newer poll or issued
/// before the monitor was last reconfigured.
#[derive(Debug, Default)]
pub(crate) struct PollGuard {
    generation: u64,
    issued: u64,
    applied: u64,
}

impl PollGuard {
    pub(crate) fn issue(&mut self) -> PollTicket {
        self.issued += 1;
        PollTicket { generation: self.generation, seq: self.issued }
    }

    /// Forget every poll currently in flight.
    pub(crate) fn invalidate(&mut self) {
        self.generation += 1;
    }

    pub(crate) fn accept(&mut self, ticket: PollTicket) -> bool {
        if ticket.generation != self.generation || ticket.seq <= self.applied {
            return false;
        }
        self.applied = ticket.seq;
        true
    }
}

/// Owns the running monitors for one app session.
#[derive(Debug)]
pub struct AlertSupervisor {
    fire: Option<MonitorHandle>,
    flood: MonitorHandle,
    reminder: MonitorHandle,
    shutdown: CancellationToken,
}

impl AlertSupervisor {
    /// Start all monitors. The fire monitor only runs when `readings` is given.
    pub fn spawn(
        config: &Config,
        settings: &SettingsStore,
        location: &LocationStore,
        weather: Arc<dyn WeatherProvider>,
        readings: Option<Arc<dyn ReadingsSource>>,
    ) -> (Self, EventReceiver) {
        let (events, rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();

        let ctx = MonitorContext {
            settings: settings.subscribe(),
            events,
            shutdown: shutdown.clone(),
        };

        let fire = readings
            .map(|source| FireMonitor::new(source, &config.polling).spawn(ctx.clone()));
        if fire.is_none() {
            info!("fire monitoring unavailable in this build");
        }

        let flood = FloodMonitor::new(weather, &config.polling)
            .spawn(ctx.clone(), location.subscribe());
        let reminder = ReminderMonitor::new(&config.polling).spawn(ctx);

        (Self { fire, flood, reminder, shutdown }, rx)
    }

    /// Wire monitors to the real backends described by `config`.
    pub fn spawn_from_config(
        config: &Config,
        settings: &SettingsStore,
        location: &LocationStore,
    ) -> anyhow::Result<(Self, EventReceiver)> {
        let weather: Arc<dyn WeatherProvider> = Arc::new(WeatherClient::from_config(config));

        let readings = if config.fire_monitoring_possible() {
            Some(Arc::new(HttpReadingsClient::from_config(config)?) as Arc<dyn ReadingsSource>)
        } else {
            None
        };

        Ok(Self::spawn(config, settings, location, weather, readings))
    }

    pub fn handle(&self, kind: AlertKind) -> Option<&MonitorHandle> {
        match kind {
            AlertKind::Fire => self.fire.as_ref(),
            AlertKind::Flood => Some(&self.flood),
            AlertKind::Reminder => Some(&self.reminder),
        }
    }

    pub fn acknowledge(&self, kind: AlertKind) -> bool {
        self.handle(kind).is_some_and(MonitorHandle::acknowledge)
    }

    pub fn has_fire_monitor(&self) -> bool {
        self.fire.is_some()
    }

    /// Cancel every timer and wait for the tasks to finish.
    pub async fn shutdown(self) {
        self.shutdown.cancel();

        if let Some(fire) = self.fire {
            fire.join().await;
        }
        self.flood.join().await;
        self.reminder.join().await;
        info!("alert monitors stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_rejects_older_results() {
        let mut guard = PollGuard::default();
        let first = guard.issue();
        let second = guard.issue();

        assert!(guard.accept(second));
        assert!(!guard.accept(first));
    }

    #[test]
    fn guard_rejects_results_from_before_reconfiguration() {
        let mut guard = PollGuard::default();
        let before = guard.issue();
        guard.invalidate();
        let after = guard.issue();

        assert!(!guard.accept(before));
        assert!(guard.accept(after));
    }

    #[test]
    fn alert_kind_parses() {
        assert_eq!(AlertKind::try_from("FLOOD").unwrap(), AlertKind::Flood);
        assert!(AlertKind::try_from("earthquake").is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn supervisor_without_readings_has_no_fire_monitor() {
        let config = Config::default();
        let settings = SettingsStore::default();
        let location = LocationStore::default();
        let calm = Arc::new(flood::tests::Scripted::calm());
        let weather: Arc<dyn WeatherProvider> = Arc::new(WeatherClient::new(None, calm));

        let (supervisor, _events) =
            AlertSupervisor::spawn(&config, &settings, &location, weather, None);

        assert!(!supervisor.has_fire_monitor());
        assert!(!supervisor.acknowledge(AlertKind::Fire));
        assert!(supervisor.acknowledge(AlertKind::Reminder));

        supervisor.shutdown().await;
    }
}
