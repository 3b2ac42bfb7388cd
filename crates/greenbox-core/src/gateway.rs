//! The remote telemetry gateway abstraction.
//!
//! [`TelemetryGateway`] is implemented by the HTTP client (feature `http`)
//! and by [`MockGateway`](crate::MockGateway) for tests.

use async_trait::async_trait;

use greenbox_types::{AccessValidation, ActuatorStatus, Period, SensorReading};

use crate::error::Result;

/// Read and acknowledgement endpoints of the backend, addressed by entity id.
///
/// # Example
///
/// ```
/// use greenbox_core::{MockGateway, Result, TelemetryGateway};
///
/// async fn print_latest(gateway: &dyn TelemetryGateway, id: &str) -> Result<()> {
///     let reading = gateway.latest_reading(id).await?;
///     println!("{:.1} °C", reading.temperature);
///     Ok(())
/// }
/// # let _ = print_latest(&MockGateway::new(), "strawberry");
/// ```
#[async_trait]
pub trait TelemetryGateway: Send + Sync {
    // --- Telemetry ---

    /// Most recent reading of the entity.
    async fn latest_reading(&self, entity_id: &str) -> Result<SensorReading>;

    /// Chronological readings over `period`, oldest first.
    async fn history(&self, entity_id: &str, period: Period) -> Result<Vec<SensorReading>>;

    /// Current actuator status.
    async fn actuator_status(&self, entity_id: &str) -> Result<ActuatorStatus>;

    // --- Access ---

    /// Check an access code.
    async fn validate_code(&self, code: &str) -> Result<AccessValidation>;

    // --- Notifications ---

    /// Raw notification records; decoded by the notification pipeline.
    async fn notifications(&self, entity_id: &str) -> Result<Vec<serde_json::Value>>;

    /// Acknowledge that one notification was read.
    async fn mark_read(&self, notification_id: &str) -> Result<()>;

    /// Acknowledge that every notification of the entity was read.
    async fn mark_all_read(&self, entity_id: &str) -> Result<()>;

    /// Delete one notification.
    async fn delete_notification(&self, notification_id: &str) -> Result<()>;
}
