//! Core types for Greenbox telemetry data.

use core::fmt;
use core::str::FromStr;
use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::error::ParseError;

/// One of the four sensors fitted to a grow box.
///
/// Variants are ordered so that maps keyed by sensor iterate in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum SensorKind {
    /// Air temperature in °C.
    Temperature,
    /// Relative humidity in %.
    Humidity,
    /// Light level in %.
    Light,
    /// Reservoir water level in %.
    Water,
}

impl SensorKind {
    /// All sensors, in display order.
    pub const ALL: [SensorKind; 4] = [
        SensorKind::Temperature,
        SensorKind::Humidity,
        SensorKind::Light,
        SensorKind::Water,
    ];

    /// Stable lowercase key, also used as the notification preference key.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SensorKind::Temperature => "temperature",
            SensorKind::Humidity => "humidity",
            SensorKind::Light => "light",
            SensorKind::Water => "water",
        }
    }

    /// Physical unit of the sensor's values.
    ///
    /// ```
    /// use greenbox_types::SensorKind;
    ///
    /// assert_eq!(SensorKind::Temperature.unit(), "°C");
    /// assert_eq!(SensorKind::Humidity.unit(), "%");
    /// ```
    #[must_use]
    pub fn unit(&self) -> &'static str {
        match self {
            SensorKind::Temperature => "°C",
            SensorKind::Humidity | SensorKind::Light | SensorKind::Water => "%",
        }
    }

    /// Human-readable title.
    #[must_use]
    pub fn title(&self) -> &'static str {
        match self {
            SensorKind::Temperature => "Temperature",
            SensorKind::Humidity => "Humidity",
            SensorKind::Light => "Light",
            SensorKind::Water => "Water level",
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SensorKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "temperature" | "temp" => Ok(SensorKind::Temperature),
            "humidity" | "hum" => Ok(SensorKind::Humidity),
            "light" => Ok(SensorKind::Light),
            "water" => Ok(SensorKind::Water),
            other => Err(ParseError::UnknownSensorKind(other.to_string())),
        }
    }
}

/// A single telemetry sample from a grow box.
///
/// Immutable once created; produced by the gateway or synthesized locally.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SensorReading {
    /// When the sample was taken.
    #[cfg_attr(feature = "serde", serde(with = "time::serde::rfc3339"))]
    pub timestamp: OffsetDateTime,
    /// Temperature in °C.
    #[cfg_attr(feature = "serde", serde(alias = "temp"))]
    pub temperature: f64,
    /// Relative humidity in %.
    #[cfg_attr(feature = "serde", serde(alias = "hum"))]
    pub humidity: f64,
    /// Light level in %.
    pub light: f64,
    /// Water level in %.
    pub water: f64,
}

impl SensorReading {
    /// Value of a single sensor.
    #[must_use]
    pub fn value(&self, kind: SensorKind) -> f64 {
        match kind {
            SensorKind::Temperature => self.temperature,
            SensorKind::Humidity => self.humidity,
            SensorKind::Light => self.light,
            SensorKind::Water => self.water,
        }
    }
}

/// History window requested from the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Period {
    /// Last 24 hours, hourly points.
    #[cfg_attr(feature = "serde", serde(rename = "24h"))]
    Day,
    /// Last 7 days, daily points.
    #[default]
    #[cfg_attr(feature = "serde", serde(rename = "7d"))]
    Week,
    /// Last 30 days, daily points.
    #[cfg_attr(feature = "serde", serde(rename = "30d"))]
    Month,
}

impl Period {
    /// All periods, shortest first.
    pub const ALL: [Period; 3] = [Period::Day, Period::Week, Period::Month];

    /// Wire form used in gateway routes and cache keys.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Day => "24h",
            Period::Week => "7d",
            Period::Month => "30d",
        }
    }

    /// Number of points kept for a window of this period.
    #[must_use]
    pub fn window_len(&self) -> usize {
        match self {
            Period::Day => 24,
            Period::Week => 7,
            Period::Month => 30,
        }
    }

    /// Spacing between consecutive points.
    #[must_use]
    pub fn step(&self) -> Duration {
        match self {
            Period::Day => Duration::hours(1),
            Period::Week | Period::Month => Duration::days(1),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = ParseError;

    /// Parse a period from its wire form or a plain name.
    ///
    /// ```
    /// use greenbox_types::Period;
    ///
    /// assert_eq!("7d".parse::<Period>(), Ok(Period::Week));
    /// assert_eq!("day".parse::<Period>(), Ok(Period::Day));
    /// assert!("1y".parse::<Period>().is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "24h" | "day" | "daily" => Ok(Period::Day),
            "7d" | "week" | "weekly" => Ok(Period::Week),
            "30d" | "month" | "monthly" => Ok(Period::Month),
            other => Err(ParseError::UnknownPeriod(other.to_string())),
        }
    }
}

/// Actuator state reported by the box.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct ActuatorStatus {
    /// Grow light on.
    #[cfg_attr(feature = "serde", serde(alias = "led", alias = "ledStatus"))]
    pub led_on: bool,
    /// Water pump running.
    #[cfg_attr(feature = "serde", serde(alias = "pump", alias = "pumpStatus"))]
    pub pump_on: bool,
    /// Number of completed watering cycles.
    #[cfg_attr(feature = "serde", serde(default))]
    pub watering_count: u32,
    /// When the last watering cycle ran, if ever.
    #[cfg_attr(
        feature = "serde",
        serde(
            default,
            alias = "lastWateringDate",
            with = "time::serde::rfc3339::option"
        )
    )]
    pub last_watering_timestamp: Option<OffsetDateTime>,
}

/// Inclusive optimal band for one sensor.
///
/// A range without an upper bound only constrains the minimum (water level
/// is "at least" a value).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OptimalRange {
    /// Lowest optimal value.
    pub min: f64,
    /// Highest optimal value, if bounded.
    #[cfg_attr(feature = "serde", serde(default))]
    pub max: Option<f64>,
}

impl OptimalRange {
    /// A band bounded on both sides.
    #[must_use]
    pub fn between(min: f64, max: f64) -> Self {
        Self {
            min,
            max: Some(max),
        }
    }

    /// A band with only a lower bound.
    #[must_use]
    pub fn at_least(min: f64) -> Self {
        Self { min, max: None }
    }

    /// Whether `value` falls within the band.
    ///
    /// ```
    /// use greenbox_types::OptimalRange;
    ///
    /// let range = OptimalRange::between(18.0, 26.0);
    /// assert!(range.contains(18.0));
    /// assert!(range.contains(26.0));
    /// assert!(!range.contains(26.5));
    /// assert!(OptimalRange::at_least(70.0).contains(100.0));
    /// ```
    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && self.max.is_none_or(|max| value <= max)
    }
}

/// The currently selected box/plant.
///
/// Exactly one entity is active at a time; all sensor and notification
/// queries are scoped to its `id`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct ActiveEntity {
    /// Identifier used to address the gateway.
    pub id: String,
    /// Name shown to the user.
    #[cfg_attr(feature = "serde", serde(alias = "name"))]
    pub display_name: String,
    /// Optimal band per sensor. Sensors without an entry are unconstrained.
    #[cfg_attr(feature = "serde", serde(default))]
    pub optimal_range: BTreeMap<SensorKind, OptimalRange>,
}

impl ActiveEntity {
    /// Create an entity with no optimal ranges.
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            optimal_range: BTreeMap::new(),
        }
    }

    /// Set the optimal band for one sensor.
    #[must_use]
    pub fn with_range(mut self, kind: SensorKind, range: OptimalRange) -> Self {
        self.optimal_range.insert(kind, range);
        self
    }

    /// Optimal band for one sensor, if configured.
    #[must_use]
    pub fn range(&self, kind: SensorKind) -> Option<&OptimalRange> {
        self.optimal_range.get(&kind)
    }
}

/// Category of an inbox notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum NotificationKind {
    /// A sensor left its optimal band.
    Alert,
    /// A scheduled care task.
    Reminder,
    /// Platform or firmware message.
    System,
    /// Tip or informational message.
    Info,
}

impl NotificationKind {
    /// Lowercase wire form.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Alert => "alert",
            NotificationKind::Reminder => "reminder",
            NotificationKind::System => "system",
            NotificationKind::Info => "info",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "alert" => Ok(NotificationKind::Alert),
            "reminder" => Ok(NotificationKind::Reminder),
            "system" => Ok(NotificationKind::System),
            "info" => Ok(NotificationKind::Info),
            other => Err(ParseError::UnknownNotificationKind(other.to_string())),
        }
    }
}

/// Notification urgency.
///
/// Ordered by urgency: `Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Priority {
    #[default]
    Low,
    Medium,
    High,
}

impl Priority {
    /// Lowercase wire form.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            other => Err(ParseError::UnknownPriority(other.to_string())),
        }
    }
}

/// An inbox notification.
///
/// Identity is `id`; the only mutations are flipping `read` and removal.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Notification {
    pub id: String,
    #[cfg_attr(feature = "serde", serde(rename = "type", alias = "kind"))]
    pub kind: NotificationKind,
    #[cfg_attr(feature = "serde", serde(default))]
    pub priority: Priority,
    pub title: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub message: String,
    /// Box/plant the notification refers to.
    #[cfg_attr(
        feature = "serde",
        serde(default, alias = "plantId", skip_serializing_if = "Option::is_none")
    )]
    pub related_entity_id: Option<String>,
    /// Sensor that raised the notification, for sensor alerts.
    #[cfg_attr(
        feature = "serde",
        serde(default, alias = "sensorType", skip_serializing_if = "Option::is_none")
    )]
    pub sensor_kind: Option<SensorKind>,
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub sensor_value: Option<f64>,
    #[cfg_attr(feature = "serde", serde(with = "time::serde::rfc3339"))]
    pub timestamp: OffsetDateTime,
    #[cfg_attr(feature = "serde", serde(default))]
    pub read: bool,
}

/// Result of validating an access code.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct AccessValidation {
    /// Whether the code was accepted.
    #[cfg_attr(feature = "serde", serde(alias = "ok"))]
    pub valid: bool,
    /// Entity the code unlocks, when valid.
    #[cfg_attr(
        feature = "serde",
        serde(default, alias = "boxId", skip_serializing_if = "Option::is_none")
    )]
    pub entity_id: Option<String>,
}
