//! Mock gateway implementation for testing.
//!
//! [`MockGateway`] implements [`TelemetryGateway`] entirely in memory so the
//! scheduler, the inbox and the engine can be exercised without a backend.
//!
//! # Features
//!
//! - **Per-entity data**: different readings for different boxes
//! - **Failure injection**: permanent, transient, or acknowledgement-only failures
//! - **Latency simulation**: global or per-entity delays (works with paused tokio time)
//! - **Call counters**: verify how often each endpoint was hit

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;
use time::macros::datetime;
use tokio::sync::RwLock;

use greenbox_types::{AccessValidation, ActuatorStatus, Period, SensorReading};

use crate::error::{Error, Result};
use crate::gateway::TelemetryGateway;

/// Everything the mock serves for one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct MockEntityData {
    pub latest: SensorReading,
    /// Served for every period.
    pub history: Vec<SensorReading>,
    pub actuators: ActuatorStatus,
    pub notifications: Vec<serde_json::Value>,
}

impl Default for MockEntityData {
    fn default() -> Self {
        let history = MockGateway::weekly_history();
        let latest = history
            .last()
            .cloned()
            .unwrap_or_else(|| MockGateway::reading_at(datetime!(2025-03-09 08:00 UTC), 25.0));
        Self {
            latest,
            history,
            actuators: ActuatorStatus {
                led_on: true,
                pump_on: false,
                watering_count: 12,
                last_watering_timestamp: Some(datetime!(2025-03-09 07:30 UTC)),
            },
            notifications: Vec::new(),
        }
    }
}

/// A mock telemetry gateway for testing.
///
/// # Example
///
/// ```
/// use greenbox_core::{MockGateway, TelemetryGateway};
///
/// #[tokio::main]
/// async fn main() {
///     let gateway = MockGateway::builder().temperature(31.0).build();
///     let reading = gateway.latest_reading("strawberry").await.unwrap();
///     assert_eq!(reading.temperature, 31.0);
/// }
/// ```
pub struct MockGateway {
    default_data: RwLock<MockEntityData>,
    entities: RwLock<HashMap<String, MockEntityData>>,
    entity_latency: RwLock<HashMap<String, Duration>>,
    codes: RwLock<HashMap<String, Option<String>>>,
    /// Simulated latency in milliseconds for every call (0 = no delay).
    latency_ms: AtomicU64,
    should_fail: AtomicBool,
    fail_message: RwLock<String>,
    /// Calls left to fail before succeeding again.
    remaining_failures: AtomicU32,
    fail_acks: AtomicBool,
    read_count: AtomicU32,
    notification_count: AtomicU32,
    validate_count: AtomicU32,
    ack_count: AtomicU32,
}

impl std::fmt::Debug for MockGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockGateway")
            .field("should_fail", &self.should_fail.load(Ordering::Relaxed))
            .field("read_count", &self.read_count.load(Ordering::Relaxed))
            .field("ack_count", &self.ack_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGateway {
    /// Create a gateway serving the sample week for every entity.
    pub fn new() -> Self {
        Self::from_data(MockEntityData::default())
    }

    fn from_data(data: MockEntityData) -> Self {
        Self {
            default_data: RwLock::new(data),
            entities: RwLock::new(HashMap::new()),
            entity_latency: RwLock::new(HashMap::new()),
            codes: RwLock::new(HashMap::new()),
            latency_ms: AtomicU64::new(0),
            should_fail: AtomicBool::new(false),
            fail_message: RwLock::new("Mock gateway unreachable".to_string()),
            remaining_failures: AtomicU32::new(0),
            fail_acks: AtomicBool::new(false),
            read_count: AtomicU32::new(0),
            notification_count: AtomicU32::new(0),
            validate_count: AtomicU32::new(0),
            ack_count: AtomicU32::new(0),
        }
    }

    /// Create a builder.
    pub fn builder() -> MockGatewayBuilder {
        MockGatewayBuilder::new()
    }

    /// A reading with the sample humidity, light and water levels.
    pub fn reading_at(timestamp: OffsetDateTime, temperature: f64) -> SensorReading {
        SensorReading {
            timestamp,
            temperature,
            humidity: 60.0,
            light: 80.0,
            water: 74.0,
        }
    }

    /// Seven daily readings, Monday 2025-03-03 through Sunday 2025-03-09.
    pub fn weekly_history() -> Vec<SensorReading> {
        const TEMPERATURE: [f64; 7] = [24.0, 26.0, 25.0, 27.0, 26.0, 25.0, 26.0];
        const HUMIDITY: [f64; 7] = [58.0, 62.0, 60.0, 65.0, 61.0, 60.0, 63.0];
        const LIGHT: [f64; 7] = [75.0, 80.0, 78.0, 85.0, 82.0, 79.0, 81.0];
        const WATER: [f64; 7] = [70.0, 75.0, 72.0, 78.0, 76.0, 74.0, 73.0];

        let start = datetime!(2025-03-03 08:00 UTC);
        (0..7)
            .map(|i| SensorReading {
                timestamp: start + time::Duration::days(i as i64),
                temperature: TEMPERATURE[i],
                humidity: HUMIDITY[i],
                light: LIGHT[i],
                water: WATER[i],
            })
            .collect()
    }

    // --- Test control methods ---

    /// Serve `data` for `entity_id` instead of the defaults.
    pub async fn set_entity(&self, entity_id: &str, data: MockEntityData) {
        self.entities.write().await.insert(entity_id.to_string(), data);
    }

    /// Replace the defaults served to entities without their own data.
    pub async fn set_default_data(&self, data: MockEntityData) {
        *self.default_data.write().await = data;
    }

    /// Replace the history served to entities without their own data.
    pub async fn set_history(&self, history: Vec<SensorReading>) {
        self.default_data.write().await.history = history;
    }

    /// Replace the notifications served to entities without their own data.
    pub async fn set_notifications(&self, notifications: Vec<serde_json::Value>) {
        self.default_data.write().await.notifications = notifications;
    }

    /// Accept `code`, optionally unlocking `entity_id`.
    pub async fn add_code(&self, code: &str, entity_id: Option<&str>) {
        self.codes
            .write()
            .await
            .insert(code.to_string(), entity_id.map(str::to_string));
    }

    /// Make every call fail (or succeed again).
    pub async fn set_should_fail(&self, fail: bool, message: Option<&str>) {
        self.should_fail.store(fail, Ordering::Relaxed);
        if let Some(msg) = message {
            *self.fail_message.write().await = msg.to_string();
        }
    }

    /// Fail the next `count` calls, then succeed.
    pub fn set_transient_failures(&self, count: u32) {
        self.remaining_failures.store(count, Ordering::Relaxed);
    }

    /// Make acknowledgements (read, read-all, delete) fail.
    pub fn set_ack_failure(&self, fail: bool) {
        self.fail_acks.store(fail, Ordering::Relaxed);
    }

    /// Delay every call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::Relaxed);
    }

    /// Delay calls scoped to `entity_id` by `latency`.
    pub async fn set_entity_latency(&self, entity_id: &str, latency: Duration) {
        self.entity_latency
            .write()
            .await
            .insert(entity_id.to_string(), latency);
    }

    /// Telemetry reads performed (latest, history, actuators).
    pub fn read_count(&self) -> u32 {
        self.read_count.load(Ordering::Relaxed)
    }

    /// Notification list requests performed.
    pub fn notification_count(&self) -> u32 {
        self.notification_count.load(Ordering::Relaxed)
    }

    /// Access-code validations performed.
    pub fn validate_count(&self) -> u32 {
        self.validate_count.load(Ordering::Relaxed)
    }

    /// Successful acknowledgements received.
    pub fn ack_count(&self) -> u32 {
        self.ack_count.load(Ordering::Relaxed)
    }

    async fn simulate(&self, entity_id: Option<&str>) -> Result<()> {
        let entity_latency = match entity_id {
            Some(id) => self.entity_latency.read().await.get(id).copied(),
            None => None,
        };
        let latency = entity_latency
            .unwrap_or_else(|| Duration::from_millis(self.latency_ms.load(Ordering::Relaxed)));
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        if self.remaining_failures.load(Ordering::Relaxed) > 0 {
            self.remaining_failures.fetch_sub(1, Ordering::Relaxed);
            return Err(Error::Transport(self.fail_message.read().await.clone()));
        }

        if self.should_fail.load(Ordering::Relaxed) {
            Err(Error::Transport(self.fail_message.read().await.clone()))
        } else {
            Ok(())
        }
    }

    async fn data_for(&self, entity_id: &str) -> MockEntityData {
        if let Some(data) = self.entities.read().await.get(entity_id) {
            return data.clone();
        }
        self.default_data.read().await.clone()
    }

    async fn acknowledge(&self) -> Result<()> {
        self.simulate(None).await?;
        if self.fail_acks.load(Ordering::Relaxed) {
            return Err(Error::Transport("Mock acknowledgement rejected".to_string()));
        }
        self.ack_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[async_trait]
impl TelemetryGateway for MockGateway {
    async fn latest_reading(&self, entity_id: &str) -> Result<SensorReading> {
        self.simulate(Some(entity_id)).await?;
        self.read_count.fetch_add(1, Ordering::Relaxed);
        Ok(self.data_for(entity_id).await.latest)
    }

    async fn history(&self, entity_id: &str, _period: Period) -> Result<Vec<SensorReading>> {
        self.simulate(Some(entity_id)).await?;
        self.read_count.fetch_add(1, Ordering::Relaxed);
        Ok(self.data_for(entity_id).await.history)
    }

    async fn actuator_status(&self, entity_id: &str) -> Result<ActuatorStatus> {
        self.simulate(Some(entity_id)).await?;
        self.read_count.fetch_add(1, Ordering::Relaxed);
        Ok(self.data_for(entity_id).await.actuators)
    }

    async fn validate_code(&self, code: &str) -> Result<AccessValidation> {
        self.simulate(None).await?;
        self.validate_count.fetch_add(1, Ordering::Relaxed);
        Ok(match self.codes.read().await.get(code) {
            Some(entity_id) => AccessValidation {
                valid: true,
                entity_id: entity_id.clone(),
            },
            None => AccessValidation::default(),
        })
    }

    async fn notifications(&self, entity_id: &str) -> Result<Vec<serde_json::Value>> {
        self.simulate(Some(entity_id)).await?;
        self.notification_count.fetch_add(1, Ordering::Relaxed);
        Ok(self.data_for(entity_id).await.notifications)
    }

    async fn mark_read(&self, _notification_id: &str) -> Result<()> {
        self.acknowledge().await
    }

    async fn mark_all_read(&self, _entity_id: &str) -> Result<()> {
        self.acknowledge().await
    }

    async fn delete_notification(&self, _notification_id: &str) -> Result<()> {
        self.acknowledge().await
    }
}

/// Builder for [`MockGateway`].
#[derive(Debug, Clone, Default)]
pub struct MockGatewayBuilder {
    data: MockEntityData,
    codes: Vec<(String, Option<String>)>,
    latency: Duration,
    fail: bool,
}

impl MockGatewayBuilder {
    /// Create a builder with the sample data.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the latest reading.
    #[must_use]
    pub fn latest(mut self, reading: SensorReading) -> Self {
        self.data.latest = reading;
        self
    }

    /// Set the latest temperature.
    #[must_use]
    pub fn temperature(mut self, temperature: f64) -> Self {
        self.data.latest.temperature = temperature;
        self
    }

    /// Set the history served for every period.
    #[must_use]
    pub fn history(mut self, history: Vec<SensorReading>) -> Self {
        self.data.history = history;
        self
    }

    /// Set the actuator status.
    #[must_use]
    pub fn actuators(mut self, status: ActuatorStatus) -> Self {
        self.data.actuators = status;
        self
    }

    /// Set the raw notification records.
    #[must_use]
    pub fn notifications(mut self, notifications: Vec<serde_json::Value>) -> Self {
        self.data.notifications = notifications;
        self
    }

    /// Accept an access code.
    #[must_use]
    pub fn code(mut self, code: &str, entity_id: Option<&str>) -> Self {
        self.codes
            .push((code.to_string(), entity_id.map(str::to_string)));
        self
    }

    /// Delay every call.
    #[must_use]
    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Start in failing mode.
    #[must_use]
    pub fn fail(mut self, fail: bool) -> Self {
        self.fail = fail;
        self
    }

    /// Build the gateway.
    #[must_use]
    pub fn build(self) -> MockGateway {
        let mut gateway = MockGateway::from_data(self.data);
        gateway.codes = RwLock::new(self.codes.into_iter().collect());
        gateway.set_latency(self.latency);
        gateway.should_fail.store(self.fail, Ordering::Relaxed);
        gateway
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_data() {
        let gateway = MockGateway::new();
        let latest = gateway.latest_reading("any").await.unwrap();
        assert_eq!(latest.temperature, 26.0);

        let history = gateway.history("any", Period::Week).await.unwrap();
        assert_eq!(history.len(), 7);
        assert!(history.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        assert_eq!(gateway.read_count(), 2);
    }

    #[tokio::test]
    async fn test_per_entity_data() {
        let gateway = MockGateway::new();
        let mut data = MockEntityData::default();
        data.latest.temperature = 19.0;
        gateway.set_entity("basil", data).await;

        assert_eq!(gateway.latest_reading("basil").await.unwrap().temperature, 19.0);
        assert_eq!(gateway.latest_reading("other").await.unwrap().temperature, 26.0);
    }

    #[tokio::test]
    async fn test_should_fail() {
        let gateway = MockGateway::new();
        gateway.set_should_fail(true, Some("boom")).await;

        let err = gateway.actuator_status("a").await.unwrap_err();
        assert!(err.is_transport());
        assert!(err.to_string().contains("boom"));
        assert_eq!(gateway.read_count(), 0);

        gateway.set_should_fail(false, None).await;
        assert!(gateway.actuator_status("a").await.is_ok());
    }

    #[tokio::test]
    async fn test_transient_failures() {
        let gateway = MockGateway::new();
        gateway.set_transient_failures(2);

        assert!(gateway.latest_reading("a").await.is_err());
        assert!(gateway.latest_reading("a").await.is_err());
        assert!(gateway.latest_reading("a").await.is_ok());
    }

    #[tokio::test]
    async fn test_ack_failure_does_not_affect_reads() {
        let gateway = MockGateway::new();
        gateway.set_ack_failure(true);

        assert!(gateway.mark_read("1").await.is_err());
        assert!(gateway.latest_reading("a").await.is_ok());
        assert_eq!(gateway.ack_count(), 0);

        gateway.set_ack_failure(false);
        gateway.delete_notification("1").await.unwrap();
        assert_eq!(gateway.ack_count(), 1);
    }

    #[tokio::test]
    async fn test_validate_code() {
        let gateway = MockGateway::builder().code("GB-1234", Some("box-7")).build();

        let ok = gateway.validate_code("GB-1234").await.unwrap();
        assert!(ok.valid);
        assert_eq!(ok.entity_id.as_deref(), Some("box-7"));

        let bad = gateway.validate_code("nope").await.unwrap();
        assert!(!bad.valid);
        assert_eq!(gateway.validate_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entity_latency() {
        let gateway = MockGateway::new();
        gateway
            .set_entity_latency("slow", Duration::from_secs(5))
            .await;

        let start = tokio::time::Instant::now();
        gateway.latest_reading("fast").await.unwrap();
        assert!(start.elapsed() < Duration::from_secs(1));

        gateway.latest_reading("slow").await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_builder_all_options() {
        let gateway = MockGateway::builder()
            .temperature(30.0)
            .history(Vec::new())
            .actuators(ActuatorStatus::default())
            .notifications(vec![serde_json::json!({"id": "1"})])
            .fail(false)
            .build();

        assert_eq!(gateway.latest_reading("a").await.unwrap().temperature, 30.0);
        assert!(gateway.history("a", Period::Day).await.unwrap().is_empty());
        assert!(!gateway.actuator_status("a").await.unwrap().led_on);
        assert_eq!(gateway.notifications("a").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_builder_fail() {
        let gateway = MockGateway::builder().fail(true).build();
        assert!(gateway.notifications("a").await.is_err());
        assert_eq!(gateway.notification_count(), 0);
    }
}
