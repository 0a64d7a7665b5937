use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use tokio::{
    sync::mpsc,
    time::{self, Instant, Interval, MissedTickBehavior},
};
use tracing::{debug, info};

use crate::{config::PollingConfig, model::FireReading, readings::ReadingsSource};

use super::{
    AlertCommand, AlertEvent, AlertKind, HideReason, MonitorContext, MonitorHandle, PollGuard,
    emit, next_tick,
};

pub const FIRE_VIBRATION: &[u64] = &[500, 500, 500];

const TITLE: &str = "FIRE DETECTED!";
const MESSAGE: &str = "The system has detected a critical fire hazard in Camera 01.";

/// Decides when a fire reading deserves a modal.
///
/// A reading alerts once: it must be CRITICAL, younger than the freshness
/// window, and have an id other than the last one alerted on. The last id
/// survives acknowledgement and disabling.
#[derive(Debug, Clone)]
pub struct FireAlertState {
    visible: bool,
    last_alert_id: Option<String>,
    freshness: Duration,
}

impl FireAlertState {
    pub fn new(freshness: Duration) -> Self {
        Self { visible: false, last_alert_id: None, freshness }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn last_alert_id(&self) -> Option<&str> {
        self.last_alert_id.as_deref()
    }

    /// Whether `reading` was taken less than the freshness window before `now`.
    pub fn is_fresh(&self, reading: &FireReading, now: DateTime<Utc>) -> bool {
        let Some(observed) = reading.observed_at() else {
            return false;
        };
        let window_ms = i64::try_from(self.freshness.as_millis()).unwrap_or(i64::MAX);
        now.signed_duration_since(observed).num_milliseconds() < window_ms
    }

    /// Apply one poll result. `readings` is newest-first.
    pub fn evaluate(&mut self, readings: &[FireReading], now: DateTime<Utc>) -> Vec<AlertEvent> {
        let Some(latest) = readings.first() else {
            return Vec::new();
        };

        if !latest.is_critical()
            || !self.is_fresh(latest, now)
            || self.last_alert_id.as_deref() == Some(latest.id.as_str())
        {
            return Vec::new();
        }

        self.last_alert_id = Some(latest.id.clone());

        let mut events = Vec::with_capacity(2);
        if !self.visible {
            self.visible = true;
            events.push(AlertEvent::Shown {
                kind: AlertKind::Fire,
                title: TITLE,
                message: MESSAGE.to_string(),
            });
        }
        events.push(AlertEvent::Haptic { kind: AlertKind::Fire, pattern: FIRE_VIBRATION });
        events
    }

    pub fn acknowledge(&mut self) -> Vec<AlertEvent> {
        if !self.visible {
            return Vec::new();
        }
        self.visible = false;
        vec![
            AlertEvent::Hidden { kind: AlertKind::Fire, reason: HideReason::Acknowledged },
            AlertEvent::NavigateHome,
        ]
    }

    /// Force-hide without counting as an acknowledgement.
    pub fn disable(&mut self) -> Vec<AlertEvent> {
        if !self.visible {
            return Vec::new();
        }
        self.visible = false;
        vec![AlertEvent::Hidden { kind: AlertKind::Fire, reason: HideReason::Disabled }]
    }
}

type PollResult = (super::PollTicket, anyhow::Result<Vec<FireReading>>);

/// Polls the readings endpoint while fire alerts are enabled.
#[derive(Debug)]
pub struct FireMonitor {
    source: Arc<dyn ReadingsSource>,
    interval: Duration,
    state: FireAlertState,
}

impl FireMonitor {
    pub fn new(source: Arc<dyn ReadingsSource>, polling: &PollingConfig) -> Self {
        Self {
            source,
            interval: polling.fire_interval(),
            state: FireAlertState::new(polling.fire_freshness()),
        }
    }

    pub fn spawn(self, ctx: MonitorContext) -> MonitorHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(self.run(ctx, rx));
        MonitorHandle::new(AlertKind::Fire, tx, task)
    }

    /// First poll one period after enabling, like a plain repeating timer.
    fn ticker(&self) -> Interval {
        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    }

    async fn run(
        mut self,
        ctx: MonitorContext,
        mut commands: mpsc::UnboundedReceiver<AlertCommand>,
    ) {
        let MonitorContext { mut settings, events, shutdown } = ctx;
        let (results_tx, mut results) = mpsc::unbounded_channel::<PollResult>();
        let mut guard = PollGuard::default();

        let mut enabled = settings.borrow_and_update().fire_alert_enabled;
        let mut ticker = enabled.then(|| self.ticker());
        info!(enabled, interval = ?self.interval, "fire monitor started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,

                changed = settings.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let now_enabled = settings.borrow_and_update().fire_alert_enabled;
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

                Some(command) = commands.recv() => match command {
                    AlertCommand::Acknowledge => emit(&events, self.state.acknowledge()),
                },

                _ = next_tick(&mut ticker) => {
                    let ticket = guard.issue();
                    let source = Arc::clone(&self.source);
                    let tx = results_tx.clone();
                    tokio::spawn(async move {
                        let result = source.fetch_readings().await;
                        let _ = tx.send((ticket, result));
                    });
                }

                Some((ticket, result)) = results.recv() => {
                    if !guard.accept(ticket) {
                        debug!("discarding stale fire readings");
                        continue;
                    }
                    match result {
                        Ok(readings) => emit(&events, self.state.evaluate(&readings, Utc::now())),
                        // Backend offline: stay quiet and try again on the next tick.
                        Err(err) => {
                            debug!(error = %format!("{err:#}"), "fire readings poll failed");
                        }
                    }
                }
            }
        }

        debug!("fire monitor stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{model::ReadingStatus, monitor::EventReceiver, settings::SettingsStore};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tokio::sync::mpsc::error::TryRecvError;
    use tokio_util::sync::CancellationToken;

    fn reading(id: &str, status: ReadingStatus, at: DateTime<Utc>) -> FireReading {
        FireReading { id: id.to_string(), status, timestamp: at.to_rfc3339() }
    }

    fn critical(id: &str, at: DateTime<Utc>) -> FireReading {
        reading(id, ReadingStatus::Critical, at)
    }

    fn haptic() -> AlertEvent {
        AlertEvent::Haptic { kind: AlertKind::Fire, pattern: FIRE_VIBRATION }
    }

    fn state() -> FireAlertState {
        FireAlertState::new(Duration::from_secs(30))
    }

    #[test]
    fn fresh_critical_reading_alerts_once() {
        let now = Utc::now();
        let mut st = state();
        let readings = vec![critical("a", now - chrono::Duration::seconds(5))];

        let events = st.evaluate(&readings, now);
        assert!(matches!(events[0], AlertEvent::Shown { kind: AlertKind::Fire, .. }));
        assert_eq!(events[1], haptic());
        assert!(st.is_visible());

        assert!(st.evaluate(&readings, now).is_empty());
        st.acknowledge();
        assert!(st.evaluate(&readings, now).is_empty());
        assert_eq!(st.last_alert_id(), Some("a"));
    }

    #[test]
    fn stale_reading_never_alerts() {
        let now = Utc::now();
        let mut st = state();

        let events = st.evaluate(&[critical("old", now - chrono::Duration::seconds(30))], now);
        assert!(events.is_empty());

        let events = st.evaluate(&[critical("older", now - chrono::Duration::hours(20))], now);
        assert!(events.is_empty());
        assert!(!st.is_visible());
        assert_eq!(st.last_alert_id(), None);
    }

    #[test]
    fn only_latest_reading_counts() {
        let now = Utc::now();
        let mut st = state();
        let readings = vec![
            reading("n", ReadingStatus::Normal, now),
            critical("c", now),
        ];

        assert!(st.evaluate(&readings, now).is_empty());
        assert!(st.evaluate(&[], now).is_empty());
    }

    #[test]
    fn unparseable_timestamp_is_not_fresh() {
        let now = Utc::now();
        let mut st = state();
        let bad = FireReading {
            id: "x".into(),
            status: ReadingStatus::Critical,
            timestamp: "yesterday".into(),
        };

        assert!(st.evaluate(&[bad], now).is_empty());
    }

    #[test]
    fn new_reading_while_visible_vibrates_without_second_modal() {
        let now = Utc::now();
        let mut st = state();
        st.evaluate(&[critical("a", now)], now);

        let events = st.evaluate(&[critical("b", now)], now);
        assert_eq!(events, vec![haptic()]);
        assert_eq!(st.last_alert_id(), Some("b"));
    }

    #[test]
    fn disable_hides_without_forgetting_reading() {
        let now = Utc::now();
        let mut st = state();
        let readings = vec![critical("a", now)];
        st.evaluate(&readings, now);

        assert_eq!(
            st.disable(),
            vec![AlertEvent::Hidden { kind: AlertKind::Fire, reason: HideReason::Disabled }]
        );
        assert!(st.evaluate(&readings, now).is_empty());
        assert!(st.disable().is_empty());
        assert!(st.acknowledge().is_empty());
    }

    #[derive(Debug)]
    struct FakeReadings {
        readings: Mutex<Vec<FireReading>>,
    }

    impl FakeReadings {
        fn new(readings: Vec<FireReading>) -> Arc<Self> {
            Arc::new(Self { readings: Mutex::new(readings) })
        }
    }

    #[async_trait]
    impl ReadingsSource for FakeReadings {
        async fn fetch_readings(&self) -> anyhow::Result<Vec<FireReading>> {
            Ok(self.readings.lock().unwrap().clone())
        }
    }

    #[derive(Debug)]
    struct Offline;

    #[async_trait]
    impl ReadingsSource for Offline {
        async fn fetch_readings(&self) -> anyhow::Result<Vec<FireReading>> {
            Err(anyhow::anyhow!("connection refused"))
        }
    }

    /// First call answers after `delay`; every later call answers at once.
    #[derive(Debug)]
    struct SlowFirst {
        calls: Mutex<usize>,
        delay: Duration,
        first: Vec<FireReading>,
        rest: Vec<FireReading>,
    }

    #[async_trait]
    impl ReadingsSource for SlowFirst {
        async fn fetch_readings(&self) -> anyhow::Result<Vec<FireReading>> {
            let call = {
                let mut calls = self.calls.lock().unwrap();
                *calls += 1;
                *calls
            };
            if call == 1 {
                time::sleep(self.delay).await;
                return Ok(self.first.clone());
            }
            Ok(self.rest.clone())
        }
    }

    fn slow_critical_then(rest: Vec<FireReading>) -> Arc<SlowFirst> {
        Arc::new(SlowFirst {
            calls: Mutex::new(0),
            delay: Duration::from_secs(10),
            first: vec![critical("late", Utc::now())],
            rest,
        })
    }

    fn start(
        source: Arc<dyn ReadingsSource>,
        settings: &SettingsStore,
    ) -> (MonitorHandle, EventReceiver, CancellationToken) {
        let (events, rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let ctx = MonitorContext {
            settings: settings.subscribe(),
            events,
            shutdown: shutdown.clone(),
        };
        let handle = FireMonitor::new(source, &PollingConfig::default()).spawn(ctx);
        (handle, rx, shutdown)
    }

    #[tokio::test(start_paused = true)]
    async fn polls_and_alerts_once_per_reading() {
        let settings = SettingsStore::default();
        settings.set_fire_alert_enabled(true);
        let (handle, mut rx, shutdown) =
            start(FakeReadings::new(vec![critical("r1", Utc::now())]), &settings);

        let started = Instant::now();
        let shown = rx.recv().await;
        assert!(matches!(shown, Some(AlertEvent::Shown { kind: AlertKind::Fire, .. })));
        assert!(started.elapsed() >= Duration::from_secs(3));
        assert!(matches!(rx.recv().await, Some(AlertEvent::Haptic { .. })));

        time::sleep(Duration::from_secs(12)).await;
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));

        assert!(handle.acknowledge());
        assert_eq!(
            rx.recv().await,
            Some(AlertEvent::Hidden { kind: AlertKind::Fire, reason: HideReason::Acknowledged })
        );
        assert_eq!(rx.recv().await, Some(AlertEvent::NavigateHome));

        time::sleep(Duration::from_secs(9)).await;
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));

        shutdown.cancel();
        handle.join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_monitor_does_not_poll() {
        let settings = SettingsStore::default();
        let (handle, mut rx, shutdown) =
            start(FakeReadings::new(vec![critical("r1", Utc::now())]), &settings);

        time::sleep(Duration::from_secs(30)).await;
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));

        shutdown.cancel();
        handle.join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn toggling_off_hides_and_toggling_on_does_not_realert() {
        let settings = SettingsStore::default();
        settings.set_fire_alert_enabled(true);
        let (handle, mut rx, shutdown) =
            start(FakeReadings::new(vec![critical("r1", Utc::now())]), &settings);

        assert!(matches!(rx.recv().await, Some(AlertEvent::Shown { .. })));
        assert!(matches!(rx.recv().await, Some(AlertEvent::Haptic { .. })));

        settings.set_fire_alert_enabled(false);
        assert_eq!(
            rx.recv().await,
            Some(AlertEvent::Hidden { kind: AlertKind::Fire, reason: HideReason::Disabled })
        );

        settings.set_fire_alert_enabled(true);
        time::sleep(Duration::from_secs(10)).await;
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));

        shutdown.cancel();
        handle.join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn backend_failures_are_silent() {
        let settings = SettingsStore::default();
        settings.set_fire_alert_enabled(true);
        let (handle, mut rx, shutdown) = start(Arc::new(Offline), &settings);

        time::sleep(Duration::from_secs(20)).await;
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));

        shutdown.cancel();
        handle.join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn late_reading_from_before_a_toggle_is_ignored() {
        let settings = SettingsStore::default();
        settings.set_fire_alert_enabled(true);
        let source = slow_critical_then(Vec::new());
        let (handle, mut rx, shutdown) = start(source.clone(), &settings);

        // First poll at t=3 answers at t=13.
        time::sleep(Duration::from_secs(4)).await;
        settings.set_fire_alert_enabled(false);
        time::sleep(Duration::from_secs(1)).await;
        settings.set_fire_alert_enabled(true);

        time::sleep(Duration::from_secs(15)).await;
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
        assert!(*source.calls.lock().unwrap() >= 2);

        shutdown.cancel();
        handle.join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn slow_poll_overtaken_by_newer_one_is_ignored() {
        let settings = SettingsStore::default();
        settings.set_fire_alert_enabled(true);
        let normal = vec![reading("calm", ReadingStatus::Normal, Utc::now())];
        let source = slow_critical_then(normal);
        let (handle, mut rx, shutdown) = start(source.clone(), &settings);

        // Polls at t=3 (slow), 6, 9 and 12 (normal); the critical answer lands at t=13.
        time::sleep(Duration::from_secs(14)).await;
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
        assert!(*source.calls.lock().unwrap() >= 4);

        shutdown.cancel();
        handle.join().await;
    }
}
