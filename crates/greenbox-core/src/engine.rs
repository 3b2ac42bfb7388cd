//! The engine facade.
//!
//! [`Engine`] owns the scheduler, the active-entity cache and the inbox, and
//! publishes an immutable [`Snapshot`] through a `watch` channel after every
//! applied cycle or local mutation. Consumers render whatever was published
//! last.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use greenbox_core::{Engine, MockGateway, SyncConfig, Trigger};
//! use greenbox_store::MemoryStore;
//! use greenbox_types::ActiveEntity;
//!
//! #[tokio::main]
//! async fn main() -> greenbox_core::Result<()> {
//!     let engine = Engine::new(
//!         Arc::new(MockGateway::new()),
//!         Arc::new(MemoryStore::new()),
//!         SyncConfig::default(),
//!     )?;
//!
//!     engine.select_entity(ActiveEntity::new("strawberry", "Strawberry")).await?;
//!     let snapshot = engine.refresh(Trigger::Mount).await.published().unwrap();
//!     assert!(snapshot.online);
//!     Ok(())
//! }
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use time::OffsetDateTime;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use greenbox_store::KeyValueStore;
use greenbox_types::{AccessValidation, ActiveEntity, ActuatorStatus, SensorReading};

use crate::cache::ActiveEntityCache;
use crate::error::{Error, Result};
use crate::events::{EngineEvent, EventDispatcher, EventReceiver};
use crate::gateway::TelemetryGateway;
use crate::health::{self, HealthReport};
use crate::inbox::{InboxView, NotificationInbox, RemoteAck};
use crate::notifications::Category;
use crate::poller::PeriodicSync;
use crate::preferences::NotificationPreferences;
use crate::status::OnlineStatus;
use crate::sync::{
    Clock, CycleData, CycleOutcome, SeriesMap, StreamStatus, SyncConfig, SyncScheduler, Trigger,
    system_clock,
};

/// Everything a view renders, as of one publish.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub active_entity: Option<ActiveEntity>,
    pub latest_reading: Option<SensorReading>,
    pub actuators: Option<ActuatorStatus>,
    /// Present when both an entity and a reading are known.
    pub health: Option<HealthReport>,
    pub series: SeriesMap,
    pub online: bool,
    /// Preference-filtered inbox, all categories.
    pub notifications: InboxView,
    pub streams: Vec<StreamStatus>,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(skip)]
    inbox: NotificationInbox,
}

impl Snapshot {
    fn build(data: CycleData, prefs: &NotificationPreferences) -> Self {
        let health = match (&data.entity, &data.latest_reading) {
            (Some(entity), Some(reading)) => Some(health::evaluate(entity, reading)),
            _ => None,
        };
        Self {
            notifications: data.inbox.view(prefs, Category::All, data.completed_at),
            active_entity: data.entity,
            latest_reading: data.latest_reading,
            actuators: data.actuators,
            health,
            series: data.series,
            online: data.online,
            streams: data.streams,
            updated_at: data.completed_at,
            inbox: data.inbox,
        }
    }

    fn with_inbox(
        &self,
        inbox: NotificationInbox,
        prefs: &NotificationPreferences,
        now: OffsetDateTime,
    ) -> Self {
        Self {
            notifications: inbox.view(prefs, Category::All, now),
            inbox,
            updated_at: now,
            ..self.clone()
        }
    }

    /// The full, unfiltered inbox.
    pub fn inbox(&self) -> &NotificationInbox {
        &self.inbox
    }
}

/// Result of [`Engine::refresh`].
pub type RefreshOutcome = CycleOutcome<Arc<Snapshot>>;

impl RefreshOutcome {
    /// The published snapshot, unless the cycle was discarded.
    pub fn published(self) -> Option<Arc<Snapshot>> {
        match self {
            CycleOutcome::Applied(snapshot) => Some(snapshot),
            CycleOutcome::Discarded { .. } => None,
        }
    }
}

/// Result of a remote acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AckOutcome {
    /// Nothing changed locally, so nothing was sent.
    Unchanged,
    /// Changed locally; the inbox holds placeholder data, so nothing was sent.
    LocalOnly,
    /// The gateway accepted the acknowledgement.
    Acknowledged,
    /// The gateway call failed; the local change stands.
    Failed(String),
}

struct Inner {
    gateway: Arc<dyn TelemetryGateway>,
    scheduler: SyncScheduler,
    events: EventDispatcher,
    snapshot: watch::Sender<Arc<Snapshot>>,
}

/// The sync engine. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<Inner>,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("scheduler", &self.inner.scheduler)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Create an engine using the wall clock in the configured time zone.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `config` does not validate.
    pub fn new(
        gateway: Arc<dyn TelemetryGateway>,
        store: Arc<dyn KeyValueStore>,
        config: SyncConfig,
    ) -> Result<Self> {
        let clock = system_clock(config.utc_offset);
        Self::with_clock(gateway, store, config, clock)
    }

    /// Create an engine with an explicit clock.
    pub fn with_clock(
        gateway: Arc<dyn TelemetryGateway>,
        store: Arc<dyn KeyValueStore>,
        config: SyncConfig,
        clock: Clock,
    ) -> Result<Self> {
        config.validate()?;

        let events = EventDispatcher::default();
        let scheduler = SyncScheduler::new(
            gateway.clone(),
            ActiveEntityCache::new(store.clone()),
            OnlineStatus::new(),
            events.clone(),
            config,
            clock,
        );

        let prefs = NotificationPreferences::load(store.as_ref());
        let initial = Snapshot::build(scheduler.cached_data(), &prefs);
        let (snapshot, _) = watch::channel(Arc::new(initial));

        Ok(Self {
            inner: Arc::new(Inner {
                gateway,
                scheduler,
                events,
                snapshot,
            }),
        })
    }

    fn cache(&self) -> &ActiveEntityCache {
        self.inner.scheduler.cache()
    }

    fn store(&self) -> &dyn KeyValueStore {
        self.cache().store().as_ref()
    }

    fn publish(&self, snapshot: Snapshot) -> Arc<Snapshot> {
        let snapshot = Arc::new(snapshot);
        self.inner.snapshot.send_replace(snapshot.clone());
        snapshot
    }

    /// Publish the cache-only view, keeping the last stream statistics.
    fn publish_cached(&self) -> Arc<Snapshot> {
        let mut data = self.inner.scheduler.cached_data();
        data.streams = self.snapshot().streams.clone();
        self.publish(Snapshot::build(data, &self.preferences()))
    }

    // --- Observation ---

    /// The last published snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.inner.snapshot.borrow().clone()
    }

    /// Subscribe to published snapshots.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.inner.snapshot.subscribe()
    }

    /// Subscribe to engine events.
    pub fn subscribe_events(&self) -> EventReceiver {
        self.inner.events.subscribe()
    }

    /// The online flag.
    pub fn online_status(&self) -> OnlineStatus {
        self.inner.scheduler.online_status().clone()
    }

    pub fn is_online(&self) -> bool {
        self.inner.scheduler.online_status().get()
    }

    pub fn config(&self) -> &SyncConfig {
        self.inner.scheduler.config()
    }

    // --- Sync ---

    /// Run one refresh cycle and publish its result.
    pub async fn refresh(&self, trigger: Trigger) -> RefreshOutcome {
        self.inner
            .scheduler
            .run_cycle(trigger, |data| {
                let prefs = self.preferences();
                self.publish(Snapshot::build(data, &prefs))
            })
            .await
    }

    /// Start periodic refreshes at the configured interval.
    pub fn start_polling(&self) -> PeriodicSync {
        self.start_polling_with(self.config().poll_interval)
    }

    /// Start periodic refreshes at `interval`.
    pub fn start_polling_with(&self, interval: Duration) -> PeriodicSync {
        PeriodicSync::new(self.clone(), interval)
    }

    // --- Active entity ---

    /// The persisted selection.
    pub fn active_entity(&self) -> Option<ActiveEntity> {
        self.cache().get_active()
    }

    /// Make `entity` the active one and publish its cached view.
    ///
    /// Cycles still in flight for the previous entity are discarded when
    /// they complete.
    pub async fn select_entity(&self, entity: ActiveEntity) -> Result<Arc<Snapshot>> {
        let id = entity.id.clone();
        let snapshot = self
            .inner
            .scheduler
            .exclusive(|| -> Result<_> {
                self.cache().set_active(&entity)?;
                Ok(self.publish_cached())
            })
            .await?;
        info!("Selected entity {}", id);
        self.inner.events.send(EngineEvent::EntityChanged {
            entity_id: Some(id),
        });
        Ok(snapshot)
    }

    /// Clear the selection and everything cached for it.
    pub async fn logout(&self) -> Result<Arc<Snapshot>> {
        let snapshot = self
            .inner
            .scheduler
            .exclusive(|| -> Result<_> {
                self.cache().clear()?;
                Ok(self.publish_cached())
            })
            .await?;
        info!("Logged out");
        self.inner
            .events
            .send(EngineEvent::EntityChanged { entity_id: None });
        Ok(snapshot)
    }

    /// Validate an access code with the gateway.
    ///
    /// A blank code is rejected without a request.
    ///
    /// # Errors
    ///
    /// Unlike telemetry failures, transport failures are returned to the
    /// caller.
    pub async fn validate_code(&self, code: &str) -> Result<AccessValidation> {
        let code = code.trim();
        if code.is_empty() {
            debug!("Rejecting blank access code locally");
            return Ok(AccessValidation::default());
        }

        let duration = self.config().request_timeout;
        let validation = tokio::time::timeout(duration, self.inner.gateway.validate_code(code))
            .await
            .map_err(|_| Error::Timeout {
                operation: "validate_code".to_string(),
                duration,
            })??;
        debug!("Access code valid: {}", validation.valid);
        Ok(validation)
    }

    // --- Notifications ---

    /// Current notification preferences.
    pub fn preferences(&self) -> NotificationPreferences {
        NotificationPreferences::load(self.store())
    }

    /// Persist `prefs` and republish the inbox view.
    pub async fn set_preferences(&self, prefs: NotificationPreferences) -> Result<Arc<Snapshot>> {
        self.inner
            .scheduler
            .exclusive(|| -> Result<_> {
                prefs.save(self.store())?;
                let current = self.snapshot();
                let now = self.inner.scheduler.now();
                Ok(self.publish(current.with_inbox(current.inbox.clone(), &prefs, now)))
            })
            .await
    }

    /// The inbox filtered by preferences and `category`.
    pub fn notifications_view(&self, category: Category) -> InboxView {
        let now = self.inner.scheduler.now();
        self.snapshot()
            .inbox
            .view(&self.preferences(), category, now)
    }

    /// Mark one notification read locally, then acknowledge remotely.
    pub async fn mark_read(&self, notification_id: &str) -> Result<AckOutcome> {
        self.mutate_inbox(|inbox| inbox.commit_mark_read(notification_id))
            .await
    }

    /// Mark every notification read locally, then acknowledge remotely.
    pub async fn mark_all_read(&self) -> Result<AckOutcome> {
        self.mutate_inbox(NotificationInbox::commit_mark_all_read)
            .await
    }

    /// Remove one notification locally, then delete it remotely.
    pub async fn dismiss(&self, notification_id: &str) -> Result<AckOutcome> {
        self.mutate_inbox(|inbox| inbox.commit_dismiss(notification_id))
            .await
    }

    /// Commit locally, persist, publish, then acknowledge.
    ///
    /// The stored copy of a placeholder inbox stays marked as such, so the
    /// next successful fetch discards it instead of merging it.
    async fn mutate_inbox(
        &self,
        commit: impl FnOnce(&mut NotificationInbox) -> Option<RemoteAck>,
    ) -> Result<AckOutcome> {
        let pending = self
            .inner
            .scheduler
            .exclusive(|| -> Result<_> {
                let current = self.snapshot();
                let mut inbox = current.inbox.clone();
                let Some(ack) = commit(&mut inbox) else {
                    return Ok(None);
                };
                if let Some(id) = inbox.entity_id() {
                    self.cache().store_inbox(id, &inbox.to_stored())?;
                }
                let synthetic = inbox.is_synthetic();
                let now = self.inner.scheduler.now();
                self.publish(current.with_inbox(inbox, &self.preferences(), now));
                Ok(Some((ack, synthetic)))
            })
            .await?;

        match pending {
            Some((ack, true)) => {
                debug!("Not sending {} for placeholder inbox", ack.operation());
                Ok(AckOutcome::LocalOnly)
            }
            Some((ack, false)) => Ok(self.acknowledge(ack).await),
            None => Ok(AckOutcome::Unchanged),
        }
    }

    /// Send one acknowledgement. Never touches local state, so it can be
    /// retried independently.
    pub async fn acknowledge(&self, ack: RemoteAck) -> AckOutcome {
        let duration = self.config().request_timeout;
        let send = ack.send(self.inner.gateway.as_ref());
        let result = match tokio::time::timeout(duration, send).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout {
                operation: ack.operation().to_string(),
                duration,
            }),
        };

        match result {
            Ok(()) => {
                debug!("Remote {} acknowledged", ack.operation());
                self.inner.events.send(EngineEvent::AckSucceeded { ack });
                AckOutcome::Acknowledged
            }
            Err(e) => {
                warn!("Remote {} failed, keeping local state: {}", ack.operation(), e);
                let error = e.to_string();
                self.inner.events.send(EngineEvent::AckFailed {
                    ack,
                    error: error.clone(),
                });
                AckOutcome::Failed(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockGateway;
    use greenbox_store::MemoryStore;
    use greenbox_types::{OptimalRange, SensorKind};
    use time::macros::datetime;

    const NOW: OffsetDateTime = datetime!(2025-03-09 12:00 UTC);

    fn engine(gateway: Arc<MockGateway>) -> Engine {
        Engine::with_clock(
            gateway,
            Arc::new(MemoryStore::new()),
            SyncConfig::default(),
            Arc::new(|| NOW),
        )
        .unwrap()
    }

    fn strawberry() -> ActiveEntity {
        ActiveEntity::new("strawberry", "Strawberry")
            .with_range(SensorKind::Temperature, OptimalRange::between(18.0, 25.0))
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = Engine::new(
            Arc::new(MockGateway::new()),
            Arc::new(MemoryStore::new()),
            SyncConfig::new().periods([]),
        );
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_refresh_publishes_snapshot() {
        let engine = engine(Arc::new(MockGateway::new()));
        let mut rx = engine.subscribe();
        engine.select_entity(strawberry()).await.unwrap();

        let snapshot = engine.refresh(Trigger::Mount).await.published().unwrap();
        assert!(snapshot.online);
        assert_eq!(snapshot.active_entity.as_ref().unwrap().id, "strawberry");
        // Latest temperature 26 is above 25
        assert_eq!(
            snapshot.health.as_ref().unwrap().overall,
            health::OverallHealth::Caution
        );
        assert!(rx.has_changed().unwrap());
        assert!(Arc::ptr_eq(&rx.borrow_and_update(), &snapshot));
    }

    #[tokio::test]
    async fn test_select_publishes_cached_view() {
        let engine = engine(Arc::new(MockGateway::new()));
        engine.select_entity(strawberry()).await.unwrap();
        engine.refresh(Trigger::Mount).await;

        let other = engine
            .select_entity(ActiveEntity::new("basil", "Basil"))
            .await
            .unwrap();
        assert_eq!(other.active_entity.as_ref().unwrap().id, "basil");
        assert!(other.latest_reading.is_none());

        let back = engine.select_entity(strawberry()).await.unwrap();
        assert!(back.latest_reading.is_some());
    }

    #[tokio::test]
    async fn test_logout_clears_everything() {
        let engine = engine(Arc::new(MockGateway::new()));
        let mut events = engine.subscribe_events();
        engine.select_entity(strawberry()).await.unwrap();
        engine.refresh(Trigger::Mount).await;

        let snapshot = engine.logout().await.unwrap();
        assert!(snapshot.active_entity.is_none());
        assert!(snapshot.latest_reading.is_none());
        assert!(engine.active_entity().is_none());

        let mut saw_logout = false;
        while let Ok(event) = events.try_recv() {
            saw_logout |= event == EngineEvent::EntityChanged { entity_id: None };
        }
        assert!(saw_logout);
    }

    #[tokio::test]
    async fn test_validate_code() {
        let gateway = Arc::new(MockGateway::builder().code("1234", Some("strawberry")).build());
        let engine = engine(gateway.clone());

        let ok = engine.validate_code(" 1234 ").await.unwrap();
        assert!(ok.valid);
        assert_eq!(ok.entity_id.as_deref(), Some("strawberry"));

        assert!(!engine.validate_code("9999").await.unwrap().valid);
        assert!(!engine.validate_code("   ").await.unwrap().valid);
        assert_eq!(gateway.validate_count(), 2);

        gateway.set_should_fail(true, None).await;
        assert!(engine.validate_code("1234").await.unwrap_err().is_transport());
    }

    fn remote_notifications() -> Vec<serde_json::Value> {
        vec![
            serde_json::json!({"id": 1, "type": "alert", "priority": "high",
                "title": "Frost risk", "timestamp": "2025-03-09T09:00:00Z"}),
            serde_json::json!({"id": 2, "type": "alert", "priority": "high",
                "title": "Pump failure", "timestamp": "2025-03-09T08:00:00Z"}),
        ]
    }

    #[tokio::test]
    async fn test_mark_read_persists_and_acknowledges() {
        let gateway = Arc::new(
            MockGateway::builder()
                .notifications(remote_notifications())
                .build(),
        );
        let engine = engine(gateway.clone());
        engine.select_entity(strawberry()).await.unwrap();
        engine.refresh(Trigger::Mount).await;
        assert_eq!(engine.snapshot().notifications.unread_count, 2);

        let outcome = engine.mark_read("1").await.unwrap();
        assert_eq!(outcome, AckOutcome::Acknowledged);
        assert_eq!(engine.snapshot().notifications.unread_count, 1);
        assert_eq!(gateway.ack_count(), 1);

        // Persisted, so the next offline cycle starts from the stored inbox
        gateway.set_should_fail(true, None).await;
        let snapshot = engine.refresh(Trigger::PullToRefresh).await.published().unwrap();
        assert_eq!(snapshot.notifications.unread_count, 1);

        assert_eq!(engine.mark_read("1").await.unwrap(), AckOutcome::Unchanged);
    }

    #[tokio::test]
    async fn test_placeholder_inbox_is_never_acknowledged() {
        let gateway = Arc::new(MockGateway::builder().fail(true).build());
        let engine = engine(gateway.clone());
        engine.select_entity(strawberry()).await.unwrap();
        engine.refresh(Trigger::Mount).await;
        assert!(engine.snapshot().inbox().is_synthetic());

        gateway.set_should_fail(false, None).await;
        // Stay on the placeholder inbox without refreshing
        assert_eq!(engine.mark_read("1").await.unwrap(), AckOutcome::LocalOnly);
        assert_eq!(engine.dismiss("2").await.unwrap(), AckOutcome::LocalOnly);
        assert_eq!(engine.mark_all_read().await.unwrap(), AckOutcome::LocalOnly);
        assert_eq!(engine.mark_all_read().await.unwrap(), AckOutcome::Unchanged);
        assert_eq!(gateway.ack_count(), 0);
        assert_eq!(engine.snapshot().notifications.unread_count, 0);
    }

    #[tokio::test]
    async fn test_placeholder_state_does_not_leak_onto_remote_inbox() {
        let gateway = Arc::new(
            MockGateway::builder()
                .fail(true)
                .notifications(remote_notifications())
                .build(),
        );
        let engine = engine(gateway.clone());
        engine.select_entity(strawberry()).await.unwrap();
        engine.refresh(Trigger::Mount).await;

        engine.dismiss("2").await.unwrap();
        engine.mark_read("1").await.unwrap();

        // Still offline: the stored placeholder state is what we show
        let offline = engine.refresh(Trigger::Periodic).await.published().unwrap();
        assert!(offline.inbox().is_synthetic());
        assert!(offline.inbox().items().iter().all(|n| n.id() != "2"));

        gateway.set_should_fail(false, None).await;
        let online = engine.refresh(Trigger::PullToRefresh).await.published().unwrap();
        assert!(online.online);
        let titles: Vec<(&str, bool)> = online
            .inbox()
            .items()
            .iter()
            .map(|n| (n.notification.title.as_str(), n.notification.read))
            .collect();
        assert_eq!(titles, [("Frost risk", false), ("Pump failure", false)]);
        assert_eq!(online.notifications.unread_count, 2);
        assert_eq!(gateway.ack_count(), 0);
    }

    #[tokio::test]
    async fn test_dismiss_survives_remote_failure() {
        let gateway = Arc::new(
            MockGateway::builder()
                .notifications(remote_notifications())
                .build(),
        );
        let engine = engine(gateway.clone());
        let mut events = engine.subscribe_events();
        engine.select_entity(strawberry()).await.unwrap();
        engine.refresh(Trigger::Mount).await;

        gateway.set_ack_failure(true);
        let outcome = engine.dismiss("2").await.unwrap();
        assert!(matches!(outcome, AckOutcome::Failed(_)));
        let inbox = engine.snapshot();
        assert!(inbox.inbox().items().iter().all(|n| n.id() != "2"));

        let mut saw_failure = false;
        while let Ok(event) = events.try_recv() {
            saw_failure |= matches!(event, EngineEvent::AckFailed { .. });
        }
        assert!(saw_failure);
    }

    #[tokio::test]
    async fn test_preferences_filter_view_not_unread_count() {
        let gateway = Arc::new(MockGateway::builder().fail(true).build());
        let engine = engine(gateway);
        engine.select_entity(strawberry()).await.unwrap();
        engine.refresh(Trigger::Mount).await;

        let prefs = NotificationPreferences::default().with("temperature", false);
        let snapshot = engine.set_preferences(prefs.clone()).await.unwrap();
        assert_eq!(engine.preferences(), prefs);

        let visible = snapshot.notifications.today.len() + snapshot.notifications.older.len();
        assert_eq!(visible, 5);
        assert_eq!(snapshot.notifications.unread_count, 3);

        let alerts = engine.notifications_view(Category::Alerts);
        assert_eq!(alerts.today.len() + alerts.older.len(), 1);
    }

    #[tokio::test]
    async fn test_snapshot_serializes() {
        let engine = engine(Arc::new(MockGateway::new()));
        engine.select_entity(strawberry()).await.unwrap();
        let snapshot = engine.refresh(Trigger::Mount).await.published().unwrap();

        let json = serde_json::to_value(&*snapshot).unwrap();
        assert_eq!(json["online"], true);
        assert!(json["series"]["7d"]["temperature"]["points"].is_array());
        assert!(json.get("inbox").is_none());
    }
}
