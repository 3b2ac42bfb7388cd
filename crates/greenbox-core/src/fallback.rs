//! Offline fallback: the precedence between cached and synthetic data.
//!
//! When a stream fails, the scheduler asks the [`FallbackPolicy`] which
//! substitute to publish. The synthetic data here is deterministic for a
//! given `now` so an offline chart never renders empty.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, Time};

use greenbox_types::{ActuatorStatus, ParseError, Period, SensorReading};

/// Sample week cycled to fill synthetic windows.
const TEMPERATURE: [f64; 7] = [24.0, 26.0, 25.0, 27.0, 26.0, 25.0, 26.0];
const HUMIDITY: [f64; 7] = [58.0, 62.0, 60.0, 65.0, 61.0, 60.0, 63.0];
const LIGHT: [f64; 7] = [75.0, 80.0, 78.0, 85.0, 82.0, 79.0, 81.0];
const WATER: [f64; 7] = [70.0, 75.0, 72.0, 78.0, 76.0, 74.0, 73.0];

/// Where a published value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    /// Fetched from the gateway this cycle.
    Remote,
    /// Last-known value from the active-entity cache.
    Cache,
    /// Deterministic placeholder.
    Synthetic,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DataSource::Remote => "remote",
            DataSource::Cache => "cache",
            DataSource::Synthetic => "synthetic",
        })
    }
}

/// What to publish for a stream whose fetch failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FallbackPolicy {
    /// Last-known cache first, synthetic data only when nothing is cached.
    #[default]
    CacheThenSynthetic,
    /// Last-known cache only; a stream with no cache stays empty.
    CacheOnly,
}

impl FallbackPolicy {
    /// Pick the substitute for a failed stream.
    ///
    /// `synthetic` is only evaluated when the policy needs it.
    ///
    /// ```
    /// use greenbox_core::{DataSource, FallbackPolicy};
    ///
    /// let policy = FallbackPolicy::CacheThenSynthetic;
    /// assert_eq!(policy.resolve(Some(1), || 2), Some((1, DataSource::Cache)));
    /// assert_eq!(policy.resolve(None, || 2), Some((2, DataSource::Synthetic)));
    /// assert_eq!(FallbackPolicy::CacheOnly.resolve(None, || 2), None);
    /// ```
    pub fn resolve<T>(
        &self,
        cached: Option<T>,
        synthetic: impl FnOnce() -> T,
    ) -> Option<(T, DataSource)> {
        match (cached, self) {
            (Some(value), _) => Some((value, DataSource::Cache)),
            (None, FallbackPolicy::CacheThenSynthetic) => {
                Some((synthetic(), DataSource::Synthetic))
            }
            (None, FallbackPolicy::CacheOnly) => None,
        }
    }
}

impl fmt::Display for FallbackPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FallbackPolicy::CacheThenSynthetic => "cache-then-synthetic",
            FallbackPolicy::CacheOnly => "cache-only",
        })
    }
}

impl FromStr for FallbackPolicy {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cache-then-synthetic" | "synthetic" => Ok(FallbackPolicy::CacheThenSynthetic),
            "cache-only" | "cache" => Ok(FallbackPolicy::CacheOnly),
            other => Err(ParseError::InvalidData(format!(
                "unknown fallback policy '{other}' (expected cache-then-synthetic or cache-only)"
            ))),
        }
    }
}

fn sample(index: usize, timestamp: OffsetDateTime) -> SensorReading {
    let i = index % TEMPERATURE.len();
    SensorReading {
        timestamp,
        temperature: TEMPERATURE[i],
        humidity: HUMIDITY[i],
        light: LIGHT[i],
        water: WATER[i],
    }
}

/// Placeholder latest reading stamped at `now`.
pub fn synthetic_reading(now: OffsetDateTime) -> SensorReading {
    sample(TEMPERATURE.len() - 1, now)
}

/// Placeholder window for `period`, ending at the current hour (`24h`) or
/// today's local midnight (`7d`, `30d`), oldest first.
pub fn synthetic_series(period: Period, now: OffsetDateTime) -> Vec<SensorReading> {
    let anchor = match period {
        Period::Day => now.replace_time(Time::from_hms(now.hour(), 0, 0).unwrap_or(Time::MIDNIGHT)),
        Period::Week | Period::Month => now.replace_time(Time::MIDNIGHT),
    };
    let len = period.window_len();
    (0..len)
        .map(|i| {
            let steps_back = i32::try_from(len - 1 - i).unwrap_or(0);
            sample(i, anchor - period.step() * steps_back)
        })
        .collect()
}

/// Placeholder actuator status: everything off, no waterings.
pub fn synthetic_actuators() -> ActuatorStatus {
    ActuatorStatus::default()
}
