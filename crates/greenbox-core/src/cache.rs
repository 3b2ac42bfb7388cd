//! The active-entity cache.
//!
//! Single source of truth for which box/plant is selected, persisted through
//! a [`KeyValueStore`]. The entity's last-known data (latest reading,
//! actuator status, raw series, inbox) live in side slots under the same
//! `greenbox.` key namespace, so a read after a successful write always
//! observes that write.
//!
//! Reads never fail: malformed stored data is logged and treated as absent.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use greenbox_store::{KeyValueStore, KeyValueStoreExt};
use greenbox_types::{ActiveEntity, ActuatorStatus, Period, SensorReading};

use crate::error::Result;
use crate::inbox::StoredInbox;

/// Key holding the selected entity.
pub const ACTIVE_ENTITY_KEY: &str = "greenbox.activeEntity";

/// Per-entity cache slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Latest,
    Actuators,
    Series(Period),
    Inbox,
}

impl Slot {
    /// Every slot kept for an entity.
    pub fn all() -> impl Iterator<Item = Slot> {
        [Slot::Latest, Slot::Actuators, Slot::Inbox]
            .into_iter()
            .chain(Period::ALL.into_iter().map(Slot::Series))
    }

    /// Store key of this slot for `entity_id`.
    pub fn key(&self, entity_id: &str) -> String {
        match self {
            Slot::Latest => format!("greenbox.latest.{entity_id}"),
            Slot::Actuators => format!("greenbox.actuators.{entity_id}"),
            Slot::Series(period) => format!("greenbox.series.{entity_id}.{period}"),
            Slot::Inbox => format!("greenbox.inbox.{entity_id}"),
        }
    }
}

/// Persisted selection plus per-entity side slots.
#[derive(Clone)]
pub struct ActiveEntityCache {
    store: Arc<dyn KeyValueStore>,
}

impl fmt::Debug for ActiveEntityCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveEntityCache").finish_non_exhaustive()
    }
}

impl ActiveEntityCache {
    /// Create a cache over `store`.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    /// The persisted selection, or `None` when absent or unreadable.
    pub fn get_active(&self) -> Option<ActiveEntity> {
        self.read(ACTIVE_ENTITY_KEY)
    }

    /// Identifier of the persisted selection.
    pub fn active_id(&self) -> Option<String> {
        self.get_active().map(|e| e.id)
    }

    /// Persist `entity` as the sole active one, superseding any previous one.
    pub fn set_active(&self, entity: &ActiveEntity) -> Result<()> {
        self.store.set_json(ACTIVE_ENTITY_KEY, entity)?;
        debug!("Active entity set to {}", entity.id);
        Ok(())
    }

    /// Remove the selection and everything cached for it.
    pub fn clear(&self) -> Result<()> {
        if let Some(id) = self.active_id() {
            for slot in Slot::all() {
                self.store.remove(&slot.key(&id))?;
            }
        }
        self.store.remove(ACTIVE_ENTITY_KEY)?;
        debug!("Active entity cleared");
        Ok(())
    }

    /// Last-known reading for `entity_id`.
    pub fn latest_reading(&self, entity_id: &str) -> Option<SensorReading> {
        self.read(&Slot::Latest.key(entity_id))
    }

    pub fn store_latest_reading(&self, entity_id: &str, reading: &SensorReading) -> Result<()> {
        self.write(&Slot::Latest.key(entity_id), reading)
    }

    /// Last-known actuator status for `entity_id`.
    pub fn actuators(&self, entity_id: &str) -> Option<ActuatorStatus> {
        self.read(&Slot::Actuators.key(entity_id))
    }

    pub fn store_actuators(&self, entity_id: &str, status: &ActuatorStatus) -> Result<()> {
        self.write(&Slot::Actuators.key(entity_id), status)
    }

    /// Last-known raw series for `entity_id` over `period`.
    ///
    /// Empty stored series count as absent.
    pub fn series(&self, entity_id: &str, period: Period) -> Option<Vec<SensorReading>> {
        self.read::<Vec<SensorReading>>(&Slot::Series(period).key(entity_id))
            .filter(|s| !s.is_empty())
    }

    pub fn store_series(
        &self,
        entity_id: &str,
        period: Period,
        readings: &[SensorReading],
    ) -> Result<()> {
        self.write(&Slot::Series(period).key(entity_id), readings)
    }

    /// Persisted inbox for `entity_id`.
    pub fn inbox(&self, entity_id: &str) -> Option<StoredInbox> {
        self.read(&Slot::Inbox.key(entity_id))
    }

    pub fn store_inbox(&self, entity_id: &str, inbox: &StoredInbox) -> Result<()> {
        self.write(&Slot::Inbox.key(entity_id), inbox)
    }

    fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.store.get_json(key) {
            Ok(value) => value,
            Err(e) => {
                warn!("Ignoring unreadable cache entry {}: {}", key, e);
                None
            }
        }
    }

    fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        self.store.set_json(key, value)?;
        Ok(())
    }
}
