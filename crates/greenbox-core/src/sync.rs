//! The sync scheduler.
//!
//! A refresh cycle fetches every stream of the active entity concurrently,
//! then applies the results in one step: successful streams are cached and
//! normalized, failed ones are replaced according to the [`FallbackPolicy`],
//! and the [`OnlineStatus`] flag is updated.
//!
//! Fetching and applying are separated by an apply-time check. A cycle whose
//! originating entity is no longer the active one when its responses arrive
//! is discarded without touching the cache, the online flag or the stream
//! statistics.
//!
//! There is no automatic retry: a failure stays visible through the online
//! flag until the next periodic or manual cycle.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::{Deserialize, Serialize, Serializer};
use time::{OffsetDateTime, UtcOffset};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use greenbox_types::{ActiveEntity, ActuatorStatus, Period, SensorKind, SensorReading};

use crate::cache::ActiveEntityCache;
use crate::error::{Error, Result};
use crate::events::{EngineEvent, EventDispatcher};
use crate::fallback::{self, DataSource, FallbackPolicy};
use crate::gateway::TelemetryGateway;
use crate::inbox::{NotificationInbox, StoredInbox};
use crate::normalize::{NormalizedSeries, normalize_readings};
use crate::notifications::{self, synthetic_notifications};
use crate::status::OnlineStatus;

/// Source of the current time; its offset is the display time zone.
pub type Clock = Arc<dyn Fn() -> OffsetDateTime + Send + Sync>;

/// Wall clock rendered in `offset`.
pub fn system_clock(offset: UtcOffset) -> Clock {
    Arc::new(move || OffsetDateTime::now_utc().to_offset(offset))
}

/// Per-stream fetch state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    #[default]
    Idle,
    Fetching,
    Succeeded,
    Failed,
}

/// What started a refresh cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// A view was opened.
    Mount,
    /// The periodic timer fired.
    Periodic,
    /// The user asked for a refresh.
    PullToRefresh,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Trigger::Mount => "mount",
            Trigger::Periodic => "periodic",
            Trigger::PullToRefresh => "pull-to-refresh",
        })
    }
}

/// A tracked stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StreamId {
    Latest,
    Actuators,
    Series(Period),
    Notifications,
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamId::Latest => f.write_str("latest"),
            StreamId::Actuators => f.write_str("actuators"),
            StreamId::Series(period) => write!(f, "series:{period}"),
            StreamId::Notifications => f.write_str("notifications"),
        }
    }
}

impl Serialize for StreamId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Statistics for one stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamStatus {
    pub stream: StreamId,
    pub state: SyncState,
    /// Where the currently published value came from.
    pub source: Option<DataSource>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_success_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_error_at: Option<OffsetDateTime>,
    pub last_error: Option<String>,
    pub success_count: u64,
    pub failure_count: u64,
}

impl StreamStatus {
    pub fn new(stream: StreamId) -> Self {
        Self {
            stream,
            state: SyncState::Idle,
            source: None,
            last_success_at: None,
            last_error_at: None,
            last_error: None,
            success_count: 0,
            failure_count: 0,
        }
    }

    fn begin(&mut self) {
        self.state = SyncState::Fetching;
    }

    fn succeed(&mut self, at: OffsetDateTime) {
        self.state = SyncState::Succeeded;
        self.source = Some(DataSource::Remote);
        self.last_success_at = Some(at);
        self.success_count += 1;
    }

    fn fail(&mut self, at: OffsetDateTime, error: &Error, fallback: Option<DataSource>) {
        self.state = SyncState::Failed;
        self.source = fallback;
        self.last_error_at = Some(at);
        self.last_error = Some(error.to_string());
        self.failure_count += 1;
    }

    fn settle(&mut self) {
        self.state = SyncState::Idle;
    }
}

/// Scheduler configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    /// Interval between periodic cycles.
    pub poll_interval: Duration,
    /// Upper bound on each gateway call.
    pub request_timeout: Duration,
    /// History windows fetched every cycle.
    pub periods: Vec<Period>,
    pub fallback: FallbackPolicy,
    /// Display time zone.
    pub utc_offset: UtcOffset,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            request_timeout: Duration::from_secs(10),
            periods: vec![Period::Week],
            fallback: FallbackPolicy::default(),
            utc_offset: UtcOffset::UTC,
        }
    }
}

impl SyncConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the polling interval.
    #[must_use]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the per-call timeout.
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the history windows fetched every cycle.
    #[must_use]
    pub fn periods(mut self, periods: impl IntoIterator<Item = Period>) -> Self {
        self.periods = periods.into_iter().collect();
        self
    }

    /// Set the fallback policy.
    #[must_use]
    pub fn fallback(mut self, policy: FallbackPolicy) -> Self {
        self.fallback = policy;
        self
    }

    /// Set the display time zone.
    #[must_use]
    pub fn utc_offset(mut self, offset: UtcOffset) -> Self {
        self.utc_offset = offset;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(Error::InvalidConfig(
                "poll interval must be greater than zero".to_string(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(Error::InvalidConfig(
                "request timeout must be greater than zero".to_string(),
            ));
        }
        if self.periods.is_empty() {
            return Err(Error::InvalidConfig(
                "at least one history period is required".to_string(),
            ));
        }
        Ok(())
    }

    fn distinct_periods(&self) -> Vec<Period> {
        self.periods
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// Normalized series per period, then per sensor.
pub type SeriesMap = BTreeMap<Period, BTreeMap<SensorKind, NormalizedSeries>>;

/// Everything one applied cycle produced.
#[derive(Debug, Clone)]
pub struct CycleData {
    pub entity: Option<ActiveEntity>,
    pub latest_reading: Option<SensorReading>,
    pub actuators: Option<ActuatorStatus>,
    pub series: SeriesMap,
    pub inbox: NotificationInbox,
    pub online: bool,
    pub streams: Vec<StreamStatus>,
    pub completed_at: OffsetDateTime,
}

/// Result of [`SyncScheduler::run_cycle`].
#[derive(Debug, Clone)]
pub enum CycleOutcome<T> {
    /// Applied; carries what the publish step returned.
    Applied(T),
    /// The active entity changed while the cycle was in flight.
    Discarded { origin: Option<String> },
}

impl<T> CycleOutcome<T> {
    pub fn is_applied(&self) -> bool {
        matches!(self, CycleOutcome::Applied(_))
    }
}

struct Fetched {
    latest: Result<SensorReading>,
    actuators: Result<ActuatorStatus>,
    series: Vec<(Period, Result<Vec<SensorReading>>)>,
    notifications: Result<Vec<serde_json::Value>>,
}

/// Drives refresh cycles against a [`TelemetryGateway`].
pub struct SyncScheduler {
    gateway: Arc<dyn TelemetryGateway>,
    cache: ActiveEntityCache,
    status: OnlineStatus,
    events: EventDispatcher,
    config: SyncConfig,
    clock: Clock,
    /// Stream statistics. Holding the lock also serializes apply steps.
    streams: Mutex<BTreeMap<StreamId, StreamStatus>>,
}

impl fmt::Debug for SyncScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncScheduler")
            .field("config", &self.config)
            .field("online", &self.status.get())
            .finish_non_exhaustive()
    }
}

impl SyncScheduler {
    /// Create a scheduler.
    pub fn new(
        gateway: Arc<dyn TelemetryGateway>,
        cache: ActiveEntityCache,
        status: OnlineStatus,
        events: EventDispatcher,
        config: SyncConfig,
        clock: Clock,
    ) -> Self {
        Self {
            gateway,
            cache,
            status,
            events,
            config,
            clock,
            streams: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn cache(&self) -> &ActiveEntityCache {
        &self.cache
    }

    pub fn online_status(&self) -> &OnlineStatus {
        &self.status
    }

    /// Current time in the display time zone.
    pub fn now(&self) -> OffsetDateTime {
        (self.clock)()
    }

    /// Snapshot of the per-stream statistics.
    pub async fn stream_statuses(&self) -> Vec<StreamStatus> {
        self.streams.lock().await.values().cloned().collect()
    }

    /// Run `f` with no cycle applying concurrently.
    pub async fn exclusive<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.streams.lock().await;
        f()
    }

    /// Run one refresh cycle for the currently active entity.
    ///
    /// `publish` is called with the applied data before any other cycle
    /// can apply, so publishes happen in apply order.
    pub async fn run_cycle<R>(
        &self,
        trigger: Trigger,
        publish: impl FnOnce(CycleData) -> R,
    ) -> CycleOutcome<R> {
        let entity = self.cache.get_active();
        let origin = entity.as_ref().map(|e| e.id.clone());
        debug!(
            "Starting {} sync for {}",
            trigger,
            origin.as_deref().unwrap_or("<none>")
        );

        self.begin_streams().await;
        let mut in_flight = InFlight {
            streams: &self.streams,
            done: false,
        };
        let fetched = self.fetch(origin.as_deref()).await;

        let mut streams = self.streams.lock().await;
        in_flight.done = true;
        let active = self.cache.active_id();
        if active != origin {
            info!(
                "Discarding {} sync for {} (active entity is now {})",
                trigger,
                origin.as_deref().unwrap_or("<none>"),
                active.as_deref().unwrap_or("<none>")
            );
            for status in streams.values_mut() {
                status.settle();
            }
            self.events.send(EngineEvent::ResponseDiscarded {
                origin_entity_id: origin.clone(),
                active_entity_id: active,
            });
            return CycleOutcome::Discarded { origin };
        }

        let data = self.apply(entity, fetched, &mut streams);
        for status in streams.values_mut() {
            status.settle();
        }

        self.events.send(EngineEvent::SyncCompleted {
            entity_id: origin,
            trigger,
            online: data.online,
            at: data.completed_at,
        });
        CycleOutcome::Applied(publish(data))
    }

    /// Build cycle data from the cache alone, without contacting the gateway.
    pub fn cached_data(&self) -> CycleData {
        let now = self.now();
        let entity = self.cache.get_active();
        let id = entity.as_ref().map(|e| e.id.clone());

        let (latest_reading, actuators, raw_series, inbox) = match id.as_deref() {
            Some(id) => (
                self.cache.latest_reading(id),
                self.cache.actuators(id),
                self.config
                    .distinct_periods()
                    .into_iter()
                    .filter_map(|p| self.cache.series(id, p).map(|s| (p, s)))
                    .collect(),
                self.cache
                    .inbox(id)
                    .map(|stored| NotificationInbox::from_stored(Some(id.to_string()), stored, now))
                    .unwrap_or_else(|| NotificationInbox::new(Some(id.to_string()), Vec::new())),
            ),
            None => (None, None, Vec::new(), NotificationInbox::default()),
        };

        CycleData {
            entity,
            latest_reading,
            actuators,
            series: self.normalize_all(raw_series),
            inbox,
            online: self.status.get(),
            streams: Vec::new(),
            completed_at: now,
        }
    }

    async fn begin_streams(&self) {
        let mut streams = self.streams.lock().await;
        let ids = [StreamId::Latest, StreamId::Actuators, StreamId::Notifications]
            .into_iter()
            .chain(self.config.distinct_periods().into_iter().map(StreamId::Series));
        for id in ids {
            streams
                .entry(id)
                .or_insert_with(|| StreamStatus::new(id))
                .begin();
        }
    }

    async fn bounded<T>(&self, operation: &str, fut: impl Future<Output = Result<T>>) -> Result<T> {
        let duration = self.config.request_timeout;
        match tokio::time::timeout(duration, fut).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout {
                operation: operation.to_string(),
                duration,
            }),
        }
    }

    async fn fetch_history(&self, entity_id: &str, period: Period) -> Result<Vec<SensorReading>> {
        let mut readings = self
            .bounded("history", self.gateway.history(entity_id, period))
            .await?;
        if readings.is_empty() {
            return Err(Error::MalformedData(format!(
                "gateway returned an empty {period} history"
            )));
        }
        let keep = period.window_len();
        if readings.len() > keep {
            readings.drain(..readings.len() - keep);
        }
        Ok(readings)
    }

    async fn fetch(&self, entity_id: Option<&str>) -> Fetched {
        let periods = self.config.distinct_periods();
        let Some(id) = entity_id else {
            return Fetched {
                latest: Err(Error::NoActiveEntity),
                actuators: Err(Error::NoActiveEntity),
                series: periods
                    .into_iter()
                    .map(|p| (p, Err(Error::NoActiveEntity)))
                    .collect(),
                notifications: Err(Error::NoActiveEntity),
            };
        };

        let (latest, actuators, series, notifications) = futures::join!(
            self.bounded("latest_reading", self.gateway.latest_reading(id)),
            self.bounded("actuator_status", self.gateway.actuator_status(id)),
            join_all(
                periods
                    .iter()
                    .map(|&p| async move { (p, self.fetch_history(id, p).await) })
            ),
            self.bounded("notifications", self.gateway.notifications(id)),
        );

        Fetched {
            latest,
            actuators,
            series,
            notifications,
        }
    }

    fn normalize_all(&self, raw: Vec<(Period, Vec<SensorReading>)>) -> SeriesMap {
        raw.into_iter()
            .map(|(period, readings)| {
                let per_sensor = SensorKind::ALL
                    .into_iter()
                    .filter_map(|sensor| {
                        match normalize_readings(&readings, sensor, period, self.config.utc_offset)
                        {
                            Ok(series) => Some((sensor, series)),
                            Err(e) => {
                                warn!("Cannot normalize {} {}: {}", period, sensor, e);
                                None
                            }
                        }
                    })
                    .collect();
                (period, per_sensor)
            })
            .collect()
    }

    #[allow(clippy::too_many_arguments)]
    fn record<T>(
        &self,
        streams: &mut BTreeMap<StreamId, StreamStatus>,
        stream: StreamId,
        entity_id: Option<&str>,
        result: Result<T>,
        persist: impl FnOnce(&str, &T) -> Result<()>,
        cached: impl FnOnce(&str) -> Option<T>,
        synthetic: impl FnOnce() -> T,
    ) -> Option<T> {
        let now = self.now();
        let status = streams
            .entry(stream)
            .or_insert_with(|| StreamStatus::new(stream));
        match result {
            Ok(value) => {
                if let Some(id) = entity_id
                    && let Err(e) = persist(id, &value)
                {
                    warn!("Failed to cache {} for {}: {}", stream, id, e);
                }
                status.succeed(now);
                Some(value)
            }
            Err(e) => {
                warn!("{} fetch failed: {}", stream, e);
                let fallback = self
                    .config
                    .fallback
                    .resolve(entity_id.and_then(cached), synthetic);
                status.fail(now, &e, fallback.as_ref().map(|(_, source)| *source));
                fallback.map(|(value, _)| value)
            }
        }
    }

    fn apply(
        &self,
        entity: Option<ActiveEntity>,
        fetched: Fetched,
        streams: &mut BTreeMap<StreamId, StreamStatus>,
    ) -> CycleData {
        let now = self.now();
        let id = entity.as_ref().map(|e| e.id.as_str());
        let cache = &self.cache;

        let mut online = fetched.latest.is_ok() && fetched.actuators.is_ok();

        let latest_reading = self.record(
            streams,
            StreamId::Latest,
            id,
            fetched.latest,
            |id, r| cache.store_latest_reading(id, r),
            |id| cache.latest_reading(id),
            || fallback::synthetic_reading(now),
        );

        let actuators = self.record(
            streams,
            StreamId::Actuators,
            id,
            fetched.actuators,
            |id, a| cache.store_actuators(id, a),
            |id| cache.actuators(id),
            fallback::synthetic_actuators,
        );

        let mut raw_series = Vec::new();
        for (period, result) in fetched.series {
            online &= result.is_ok();
            let readings = self.record(
                streams,
                StreamId::Series(period),
                id,
                result,
                |id, s: &Vec<SensorReading>| cache.store_series(id, period, s),
                |id| cache.series(id, period),
                || fallback::synthetic_series(period, now),
            );
            if let Some(readings) = readings {
                raw_series.push((period, readings));
            }
        }

        let inbox = self.apply_notifications(streams, id, fetched.notifications, now);

        self.status.set(online);
        if online {
            debug!("Sync succeeded for {}", id.unwrap_or("<none>"));
        } else {
            warn!(
                "Sync for {} fell back to offline data",
                id.unwrap_or("<none>")
            );
        }

        CycleData {
            series: self.normalize_all(raw_series),
            latest_reading,
            actuators,
            inbox,
            online,
            streams: streams.values().cloned().collect(),
            completed_at: now,
            entity,
        }
    }

    fn apply_notifications(
        &self,
        streams: &mut BTreeMap<StreamId, StreamStatus>,
        entity_id: Option<&str>,
        result: Result<Vec<serde_json::Value>>,
        now: OffsetDateTime,
    ) -> NotificationInbox {
        let owner = entity_id.map(str::to_string);
        let status = streams
            .entry(StreamId::Notifications)
            .or_insert_with(|| StreamStatus::new(StreamId::Notifications));

        match result {
            Ok(raw) => {
                let previous = entity_id.and_then(|id| self.cache.inbox(id));
                let inbox = NotificationInbox::reconcile(
                    owner,
                    notifications::ingest(&raw, now),
                    previous,
                );
                if let Some(id) = entity_id
                    && let Err(e) = self.cache.store_inbox(id, &inbox.to_stored())
                {
                    warn!("Failed to cache inbox for {}: {}", id, e);
                }
                status.succeed(now);
                inbox
            }
            Err(e) => {
                warn!("notifications fetch failed: {}", e);
                let cached = entity_id.and_then(|id| self.cache.inbox(id));
                let fallback = self.config.fallback.resolve(cached, || StoredInbox {
                    items: synthetic_notifications(now, entity_id),
                    dismissed: BTreeSet::new(),
                    synthetic: true,
                });
                let substituted = fallback.is_some();
                let inbox = match fallback {
                    Some((stored, _)) => NotificationInbox::from_stored(owner, stored, now),
                    None => NotificationInbox::new(owner, Vec::new()),
                };
                // A cached placeholder inbox is still placeholder data
                status.fail(now, &e, fallback_source(&inbox, substituted));
                inbox
            }
        }
    }
}

/// Settles the streams of a cycle dropped before it could apply.
struct InFlight<'a> {
    streams: &'a Mutex<BTreeMap<StreamId, StreamStatus>>,
    done: bool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        // A cycle holding the lock settles every stream itself
        if let Ok(mut streams) = self.streams.try_lock() {
            debug!("Cycle cancelled before applying, settling streams");
            for status in streams.values_mut() {
                status.settle();
            }
        }
    }
}

fn fallback_source(inbox: &NotificationInbox, substituted: bool) -> Option<DataSource> {
    match (substituted, inbox.is_synthetic()) {
        (false, _) => None,
        (true, true) => Some(DataSource::Synthetic),
        (true, false) => Some(DataSource::Cache),
    }
}
