use std::{pin::Pin, time::Duration};

use tokio::{
    sync::mpsc,
    time::{self, Instant, Sleep},
};
use tracing::{debug, info};

use crate::config::PollingConfig;

use super::{
    AlertCommand, AlertEvent, AlertKind, HideReason, MonitorContext, MonitorHandle, emit,
    next_deadline,
};

const TITLE: &str = "Smart Reminder";

pub const REMINDER_TIPS: &[&str] = &[
    "Check the stove before sleeping.",
    "Close the LPG tank valve after cooking.",
    "Don't charge your phone on the bed overnight.",
    "Turn off lights when no one is in the room.",
    "Unplug gadgets once they're fully charged.",
    "Avoid plugging too many appliances into one extension cord.",
    "Don't leave the refrigerator door slightly open.",
    "Make sure all faucets are fully closed before going to bed.",
];

/// Rotating household tips with a cool-down after each dismissal.
///
/// The tip index advances right before a tip is shown and is never reset,
/// so toggling reminders off and on continues where the rotation left off.
#[derive(Debug, Clone)]
pub struct ReminderState {
    tips: &'static [&'static str],
    tip_index: usize,
    visible: bool,
    paused_until: Option<Instant>,
    cooldown: Duration,
}

impl ReminderState {
    pub fn new(cooldown: Duration) -> Self {
        Self::with_tips(REMINDER_TIPS, cooldown)
    }

    pub fn with_tips(tips: &'static [&'static str], cooldown: Duration) -> Self {
        Self { tips, tip_index: 0, visible: false, paused_until: None, cooldown }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn tip_index(&self) -> usize {
        self.tip_index
    }

    pub fn current_tip(&self) -> Option<&'static str> {
        self.tips.get(self.tip_index).copied()
    }

    /// How long to wait before the next tip, or `None` while one is on screen.
    pub fn delay(&self, now: Instant) -> Option<Duration> {
        if self.visible {
            return None;
        }
        Some(self.paused_until.map_or(Duration::ZERO, |until| until.saturating_duration_since(now)))
    }

    pub fn show_next(&mut self) -> Vec<AlertEvent> {
        if self.tips.is_empty() {
            return Vec::new();
        }
        self.tip_index = (self.tip_index + 1) % self.tips.len();
        self.visible = true;
        vec![AlertEvent::Shown {
            kind: AlertKind::Reminder,
            title: TITLE,
            message: self.tips[self.tip_index].to_string(),
        }]
    }

    pub fn dismiss(&mut self, now: Instant) -> Vec<AlertEvent> {
        if !self.visible {
            return Vec::new();
        }
        self.visible = false;
        self.paused_until = Some(now + self.cooldown);
        vec![AlertEvent::Hidden { kind: AlertKind::Reminder, reason: HideReason::Acknowledged }]
    }

    /// Hide and drop any pending cool-down; the rotation position is kept.
    pub fn disable(&mut self) -> Vec<AlertEvent> {
        self.paused_until = None;
        if !self.visible {
            return Vec::new();
        }
        self.visible = false;
        vec![AlertEvent::Hidden { kind: AlertKind::Reminder, reason: HideReason::Disabled }]
    }
}

/// Local timer that surfaces a tip whenever reminders are on and none is showing.
#[derive(Debug)]
pub struct ReminderMonitor {
    state: ReminderState,
}

impl ReminderMonitor {
    pub fn new(polling: &PollingConfig) -> Self {
        Self { state: ReminderState::new(polling.reminder_cooldown()) }
    }

    pub fn spawn(self, ctx: MonitorContext) -> MonitorHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(self.run(ctx, rx));
        MonitorHandle::new(AlertKind::Reminder, tx, task)
    }

    fn schedule(&self, enabled: bool) -> Option<Pin<Box<Sleep>>> {
        if !enabled {
            return None;
        }
        self.state.delay(Instant::now()).map(|wait| Box::pin(time::sleep(wait)))
    }

    async fn run(
        mut self,
        ctx: MonitorContext,
        mut commands: mpsc::UnboundedReceiver<AlertCommand>,
    ) {
        let MonitorContext { mut settings, events, shutdown } = ctx;

        let mut enabled = settings.borrow_and_update().reminder_enabled;
        let mut timer = self.schedule(enabled);
        info!(enabled, "reminder monitor started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,

                changed = settings.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let now_enabled = settings.borrow_and_update().reminder_enabled;
                    if now_enabled == enabled {
                        continue;
                    }
                    enabled = now_enabled;
                    if !enabled {
                        emit(&events, self.state.disable());
                    }
                    timer = self.schedule(enabled);
                }

                Some(command) = commands.recv() => match command {
                    AlertCommand::Acknowledge => {
                        emit(&events, self.state.dismiss(Instant::now()));
                        timer = self.schedule(enabled);
                    }
                },

                _ = next_deadline(&mut timer) => {
                    timer = None;
                    emit(&events, self.state.show_next());
                    debug!(tip = self.state.tip_index(), "reminder shown");
                }
            }
        }

        debug!("reminder monitor stopped");
    }
}
