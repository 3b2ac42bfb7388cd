//! Plant health evaluation against the active entity's optimal ranges.
//!
//! # Example
//!
//! ```
//! use greenbox_core::health::{evaluate, OverallHealth, SensorStatus};
//! use greenbox_core::MockGateway;
//! use greenbox_types::{ActiveEntity, OptimalRange, SensorKind};
//!
//! let entity = ActiveEntity::new("strawberry", "Strawberry")
//!     .with_range(SensorKind::Temperature, OptimalRange::between(18.0, 24.0));
//! let reading = MockGateway::reading_at(time::OffsetDateTime::UNIX_EPOCH, 26.0);
//!
//! let report = evaluate(&entity, &reading);
//! assert_eq!(report.overall, OverallHealth::Caution);
//! assert_eq!(report.status(SensorKind::Temperature), SensorStatus::OutOfRange);
//! println!("{}", report.overall.action());
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use greenbox_types::{ActiveEntity, SensorKind, SensorReading};

/// Status of one sensor value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorStatus {
    /// Within the configured band.
    Optimal,
    /// Outside the configured band.
    OutOfRange,
    /// No band configured for this sensor.
    Unconstrained,
}

impl SensorStatus {
    /// Get a human-readable description of the status.
    pub fn description(&self) -> &'static str {
        match self {
            SensorStatus::Optimal => "Optimal",
            SensorStatus::OutOfRange => "Out of range",
            SensorStatus::Unconstrained => "No target",
        }
    }
}

/// Overall plant health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallHealth {
    /// Every constrained sensor is optimal.
    Healthy,
    /// At least one constrained sensor is out of range.
    Caution,
}

impl OverallHealth {
    /// Get a human-readable description of the health.
    pub fn description(&self) -> &'static str {
        match self {
            OverallHealth::Healthy => "Healthy - all conditions optimal",
            OverallHealth::Caution => "Caution - some conditions out of range",
        }
    }

    /// Get the suggested action.
    pub fn action(&self) -> &'static str {
        match self {
            OverallHealth::Healthy => "No action needed",
            OverallHealth::Caution => "Check the highlighted sensors",
        }
    }
}

/// Health of one reading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub overall: OverallHealth,
    /// Every sensor, in display order.
    pub sensors: BTreeMap<SensorKind, SensorStatus>,
}

impl HealthReport {
    /// Status of one sensor.
    pub fn status(&self, kind: SensorKind) -> SensorStatus {
        self.sensors
            .get(&kind)
            .copied()
            .unwrap_or(SensorStatus::Unconstrained)
    }

    /// Sensors currently out of range.
    pub fn out_of_range(&self) -> impl Iterator<Item = SensorKind> + '_ {
        self.sensors
            .iter()
            .filter(|(_, s)| **s == SensorStatus::OutOfRange)
            .map(|(k, _)| *k)
    }
}

/// Evaluate `reading` against `entity`'s optimal ranges.
///
/// Bounds are inclusive; a range without an upper bound only checks the
/// minimum.
pub fn evaluate(entity: &ActiveEntity, reading: &SensorReading) -> HealthReport {
    let sensors: BTreeMap<SensorKind, SensorStatus> = SensorKind::ALL
        .into_iter()
        .map(|kind| {
            let status = match entity.range(kind) {
                Some(range) if range.contains(reading.value(kind)) => SensorStatus::Optimal,
                Some(_) => SensorStatus::OutOfRange,
                None => SensorStatus::Unconstrained,
            };
            (kind, status)
        })
        .collect();

    let overall = if sensors.values().any(|s| *s == SensorStatus::OutOfRange) {
        OverallHealth::Caution
    } else {
        OverallHealth::Healthy
    };

    HealthReport { overall, sensors }
}
