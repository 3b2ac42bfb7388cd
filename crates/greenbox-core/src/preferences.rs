//! Notification preferences.
//!
//! A flat map from preference key (`temperature`, `humidity`, `light`,
//! `water`, `reminders`) to an enabled flag, persisted independently of any
//! entity. Keys missing from the map count as enabled, and absent or
//! malformed stored preferences load as "all enabled".

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use greenbox_store::{KeyValueStore, KeyValueStoreExt};
use greenbox_types::{Notification, NotificationKind, SensorKind};

use crate::error::{Error, Result};

/// Store key for the persisted preferences.
pub const PREFERENCES_KEY: &str = "greenbox.notificationPreferences";

/// Preference key gating reminder notifications.
pub const REMINDERS_KEY: &str = "reminders";

/// Per-category notification switches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationPreferences {
    flags: BTreeMap<String, bool>,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        let flags = Self::keys().map(|k| (k.to_string(), true)).collect();
        Self { flags }
    }
}

impl NotificationPreferences {
    /// Every recognised preference key.
    pub fn keys() -> impl Iterator<Item = &'static str> {
        SensorKind::ALL
            .into_iter()
            .map(|k| k.as_str())
            .chain(std::iter::once(REMINDERS_KEY))
    }

    /// Whether `key` is enabled. Unknown or missing keys are enabled.
    pub fn is_enabled(&self, key: &str) -> bool {
        self.flags.get(key).copied().unwrap_or(true)
    }

    /// Turn a preference on or off.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for a key outside [`Self::keys`].
    pub fn set(&mut self, key: &str, enabled: bool) -> Result<()> {
        if !Self::keys().any(|k| k == key) {
            return Err(Error::InvalidConfig(format!(
                "unknown preference '{key}' (expected one of: {})",
                Self::keys().collect::<Vec<_>>().join(", ")
            )));
        }
        self.flags.insert(key.to_string(), enabled);
        Ok(())
    }

    /// Builder form of [`Self::set`] for known-good keys.
    #[must_use]
    pub fn with(mut self, key: &str, enabled: bool) -> Self {
        self.flags.insert(key.to_string(), enabled);
        self
    }

    /// All recognised keys with their effective flag.
    pub fn entries(&self) -> Vec<(&'static str, bool)> {
        Self::keys().map(|k| (k, self.is_enabled(k))).collect()
    }

    /// Whether `notification` passes these preferences.
    ///
    /// Sensor notifications follow their sensor's switch, reminders follow
    /// `reminders`, and everything else always passes.
    pub fn allows(&self, notification: &Notification) -> bool {
        if let Some(sensor) = notification.sensor_kind {
            return self.is_enabled(sensor.as_str());
        }
        match notification.kind {
            NotificationKind::Reminder => self.is_enabled(REMINDERS_KEY),
            NotificationKind::Alert | NotificationKind::System | NotificationKind::Info => true,
        }
    }

    /// Load from `store`, falling back to all-enabled.
    pub fn load(store: &dyn KeyValueStore) -> Self {
        match store.get_json::<Self>(PREFERENCES_KEY) {
            Ok(Some(prefs)) => prefs,
            Ok(None) => Self::default(),
            Err(e) => {
                warn!("Stored notification preferences unreadable, using defaults: {}", e);
                Self::default()
            }
        }
    }

    /// Persist to `store`.
    pub fn save(&self, store: &dyn KeyValueStore) -> Result<()> {
        store.set_json(PREFERENCES_KEY, self)?;
        Ok(())
    }
}
