//! Process-wide notification toggles and location selection.
//!
//! Each store has a single writer API and any number of readers. Readers
//! subscribe to a `watch` channel so the monitors can react to changes
//! without polling the store.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

use crate::{model::LocationSelection, monitor::AlertKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NotificationSettings {
    pub fire_alert_enabled: bool,
    pub flood_alert_enabled: bool,
    pub reminder_enabled: bool,
}

impl NotificationSettings {
    pub fn get(&self, kind: AlertKind) -> bool {
        match kind {
            AlertKind::Fire => self.fire_alert_enabled,
            AlertKind::Flood => self.flood_alert_enabled,
            AlertKind::Reminder => self.reminder_enabled,
        }
    }

    fn slot(&mut self, kind: AlertKind) -> &mut bool {
        match kind {
            AlertKind::Fire => &mut self.fire_alert_enabled,
            AlertKind::Flood => &mut self.flood_alert_enabled,
            AlertKind::Reminder => &mut self.reminder_enabled,
        }
    }
}

/// Shared handle to the notification toggles. All flags start disabled.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    tx: Arc<watch::Sender<NotificationSettings>>,
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::new(NotificationSettings::default())
    }
}

impl SettingsStore {
    pub fn new(initial: NotificationSettings) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    pub fn current(&self) -> NotificationSettings {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<NotificationSettings> {
        self.tx.subscribe()
    }

    /// Returns whether the value actually changed. Unchanged writes wake nobody.
    pub fn set(&self, kind: AlertKind, enabled: bool) -> bool {
        let changed = self.tx.send_if_modified(|settings| {
            let slot = settings.slot(kind);
            if *slot == enabled {
                false
            } else {
                *slot = enabled;
                true
            }
        });

        if changed {
            info!(alert = %kind, enabled, "notification setting changed");
        }
        changed
    }

    /// Flip one alert's flag and return its new value.
    pub fn toggle(&self, kind: AlertKind) -> bool {
        let enabled = !self.current().get(kind);
        self.set(kind, enabled);
        enabled
    }

    pub fn set_fire_alert_enabled(&self, enabled: bool) -> bool {
        self.set(AlertKind::Fire, enabled)
    }

    pub fn set_flood_alert_enabled(&self, enabled: bool) -> bool {
        self.set(AlertKind::Flood, enabled)
    }

    pub fn set_reminder_enabled(&self, enabled: bool) -> bool {
        self.set(AlertKind::Reminder, enabled)
    }
}

/// Shared handle to the user's location selection.
#[derive(Debug, Clone)]
pub struct LocationStore {
    tx: Arc<watch::Sender<LocationSelection>>,
}

impl Default for LocationStore {
    fn default() -> Self {
        Self::new(LocationSelection::default())
    }
}

impl LocationStore {
    pub fn new(initial: LocationSelection) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    pub fn current(&self) -> LocationSelection {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<LocationSelection> {
        self.tx.subscribe()
    }

    pub fn set_location(&self, location: LocationSelection) -> bool {
        let changed = self.tx.send_if_modified(|current| {
            if *current == location {
                false
            } else {
                *current = location;
                true
            }
        });

        if changed {
            let loc = self.tx.borrow();
            info!(city = %loc.city, country = %loc.country, "location changed");
        }
        changed
    }
}
