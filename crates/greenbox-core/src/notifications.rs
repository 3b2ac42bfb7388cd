//! Notification pipeline: ingestion, preference and category filtering,
//! and day bucketing.
//!
//! Every function takes an explicit `now`; its offset is the local time zone
//! used for display strings and for the midnight that separates "today" from
//! "older".

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize, Serializer};
use time::{Duration, OffsetDateTime, Time};
use tracing::warn;

use greenbox_types::{Notification, NotificationKind, ParseError, Priority, SensorKind};

use crate::preferences::NotificationPreferences;

/// A notification with display fields derived at ingestion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaggedNotification {
    #[serde(flatten)]
    pub notification: Notification,
    /// Local `HH:MM`.
    pub time: String,
    pub date: DayLabel,
}

impl TaggedNotification {
    /// Derive display fields for `notification` relative to `now`.
    pub fn tag(notification: Notification, now: OffsetDateTime) -> Self {
        let local = notification.timestamp.to_offset(now.offset());
        Self {
            time: format!("{:02}:{:02}", local.hour(), local.minute()),
            date: DayLabel::for_timestamp(notification.timestamp, now),
            notification,
        }
    }

    pub fn id(&self) -> &str {
        &self.notification.id
    }
}

/// Relative day of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayLabel {
    Today,
    Yesterday,
    /// Any earlier day, rendered `DD/MM`.
    Date { day: u8, month: u8 },
}

impl DayLabel {
    /// Classify `timestamp` against local midnight of `now`.
    pub fn for_timestamp(timestamp: OffsetDateTime, now: OffsetDateTime) -> Self {
        let today = local_midnight(now);
        if timestamp >= today {
            DayLabel::Today
        } else if timestamp >= today - Duration::days(1) {
            DayLabel::Yesterday
        } else {
            let local = timestamp.to_offset(now.offset());
            DayLabel::Date {
                day: local.day(),
                month: u8::from(local.month()),
            }
        }
    }
}

impl fmt::Display for DayLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DayLabel::Today => f.write_str("Today"),
            DayLabel::Yesterday => f.write_str("Yesterday"),
            DayLabel::Date { day, month } => write!(f, "{day:02}/{month:02}"),
        }
    }
}

impl Serialize for DayLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Midnight at the start of `now`'s local day.
pub fn local_midnight(now: OffsetDateTime) -> OffsetDateTime {
    now.replace_time(Time::MIDNIGHT)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(i64),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Text(String),
    EpochMillis(i64),
}

/// Wire shape accepted from the gateway.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawNotification {
    id: RawId,
    #[serde(rename = "type", alias = "kind")]
    kind: NotificationKind,
    #[serde(default)]
    priority: Priority,
    title: String,
    #[serde(default)]
    message: String,
    #[serde(default, alias = "plantId")]
    related_entity_id: Option<String>,
    #[serde(default, alias = "sensorType")]
    sensor_kind: Option<SensorKind>,
    #[serde(default)]
    sensor_value: Option<f64>,
    timestamp: RawTimestamp,
    #[serde(default)]
    read: bool,
}

impl RawNotification {
    fn into_notification(self) -> Result<Notification, String> {
        let timestamp = match self.timestamp {
            RawTimestamp::Text(s) => {
                OffsetDateTime::parse(&s, &time::format_description::well_known::Rfc3339)
                    .map_err(|e| format!("bad timestamp '{s}': {e}"))?
            }
            RawTimestamp::EpochMillis(ms) => {
                OffsetDateTime::from_unix_timestamp_nanos(i128::from(ms) * 1_000_000)
                    .map_err(|e| format!("bad timestamp {ms}: {e}"))?
            }
        };
        let id = match self.id {
            RawId::Text(s) => s,
            RawId::Number(n) => n.to_string(),
        };

        Ok(Notification {
            id,
            kind: self.kind,
            priority: self.priority,
            title: self.title,
            message: self.message,
            related_entity_id: self.related_entity_id,
            sensor_kind: self.sensor_kind,
            sensor_value: self.sensor_value,
            timestamp,
            read: self.read,
        })
    }
}

/// Decode one raw record.
pub fn parse_raw(raw: &serde_json::Value) -> Result<Notification, String> {
    RawNotification::deserialize(raw)
        .map_err(|e| e.to_string())?
        .into_notification()
}

/// Decode raw gateway records, tag them, and order newest first.
///
/// Records that fail to decode are logged and skipped.
pub fn ingest(raw: &[serde_json::Value], now: OffsetDateTime) -> Vec<TaggedNotification> {
    let notifications = raw
        .iter()
        .enumerate()
        .filter_map(|(i, record)| match parse_raw(record) {
            Ok(n) => Some(n),
            Err(e) => {
                warn!("Skipping malformed notification #{}: {}", i, e);
                None
            }
        })
        .collect();
    tag_all(notifications, now)
}

/// Tag already-decoded notifications and order newest first.
pub fn tag_all(notifications: Vec<Notification>, now: OffsetDateTime) -> Vec<TaggedNotification> {
    let mut tagged: Vec<TaggedNotification> = notifications
        .into_iter()
        .map(|n| TaggedNotification::tag(n, now))
        .collect();
    // Stable: equal timestamps keep their source order
    tagged.sort_by(|a, b| b.notification.timestamp.cmp(&a.notification.timestamp));
    tagged
}

/// Keep the notifications `prefs` allows.
pub fn apply_preferences(
    notifications: &[TaggedNotification],
    prefs: &NotificationPreferences,
) -> Vec<TaggedNotification> {
    notifications
        .iter()
        .filter(|n| prefs.allows(&n.notification))
        .cloned()
        .collect()
}

/// Inbox tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[default]
    All,
    Alerts,
    Reminders,
    /// System and info notifications.
    System,
}

impl Category {
    pub fn matches(&self, kind: NotificationKind) -> bool {
        match self {
            Category::All => true,
            Category::Alerts => kind == NotificationKind::Alert,
            Category::Reminders => kind == NotificationKind::Reminder,
            Category::System => matches!(kind, NotificationKind::System | NotificationKind::Info),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Category::All => "all",
            Category::Alerts => "alerts",
            Category::Reminders => "reminders",
            Category::System => "system",
        })
    }
}

impl FromStr for Category {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Category::All),
            "alerts" | "alert" => Ok(Category::Alerts),
            "reminders" | "reminder" => Ok(Category::Reminders),
            "system" => Ok(Category::System),
            other => Err(ParseError::InvalidData(format!(
                "unknown category '{other}' (expected all, alerts, reminders or system)"
            ))),
        }
    }
}

/// Keep the notifications belonging to `category`.
pub fn apply_category_filter(
    notifications: &[TaggedNotification],
    category: Category,
) -> Vec<TaggedNotification> {
    notifications
        .iter()
        .filter(|n| category.matches(n.notification.kind))
        .cloned()
        .collect()
}

/// Notifications split at local midnight.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DateBuckets {
    pub today: Vec<TaggedNotification>,
    pub older: Vec<TaggedNotification>,
}

/// Partition into today (at or after local midnight of `now`) and older.
pub fn bucket_by_date(notifications: &[TaggedNotification], now: OffsetDateTime) -> DateBuckets {
    let midnight = local_midnight(now);
    let (today, older) = notifications
        .iter()
        .cloned()
        .partition(|n| n.notification.timestamp >= midnight);
    DateBuckets { today, older }
}

/// Unread notifications, independent of any filter.
pub fn unread_count(notifications: &[TaggedNotification]) -> usize {
    notifications.iter().filter(|n| !n.notification.read).count()
}

/// Deterministic inbox used when the gateway is unreachable and nothing is
/// cached.
pub fn synthetic_notifications(now: OffsetDateTime, entity_id: Option<&str>) -> Vec<Notification> {
    let yesterday = now - Duration::days(1);
    let two_days_ago = now - Duration::days(2);
    let entity = entity_id.map(str::to_string);

    let entry = |id: &str,
                 kind: NotificationKind,
                 priority: Priority,
                 title: &str,
                 message: &str,
                 timestamp: OffsetDateTime,
                 read: bool| Notification {
        id: id.to_string(),
        kind,
        priority,
        title: title.to_string(),
        message: message.to_string(),
        related_entity_id: entity.clone(),
        sensor_kind: None,
        sensor_value: None,
        timestamp,
        read,
    };

    let mut high_temp = entry(
        "1",
        NotificationKind::Alert,
        Priority::High,
        "High temperature",
        "Temperature is above the optimal range (28°C). Check the ventilation.",
        now,
        false,
    );
    high_temp.sensor_kind = Some(SensorKind::Temperature);
    high_temp.sensor_value = Some(28.0);

    let mut low_humidity = entry(
        "3",
        NotificationKind::Alert,
        Priority::Medium,
        "Low humidity",
        "Humidity dropped to 45%. Consider raising the ambient humidity.",
        yesterday,
        false,
    );
    low_humidity.sensor_kind = Some(SensorKind::Humidity);
    low_humidity.sensor_value = Some(45.0);

    let mut system = entry(
        "4",
        NotificationKind::System,
        Priority::Low,
        "System updated",
        "Greenbox was updated to version 2.1.0.",
        yesterday,
        true,
    );
    system.related_entity_id = None;

    vec![
        high_temp,
        entry(
            "2",
            NotificationKind::Reminder,
            Priority::Medium,
            "Time to water",
            "Check the water level of your plant.",
            now,
            false,
        ),
        low_humidity,
        system,
        entry(
            "5",
            NotificationKind::Info,
            Priority::Low,
            "Tip of the day",
            "Strawberries need at least 6 hours of direct light to grow well.",
            two_days_ago,
            true,
        ),
        entry(
            "6",
            NotificationKind::Reminder,
            Priority::Medium,
            "Fertilization scheduled",
            "According to your calendar it is time to fertilize.",
            two_days_ago,
            true,
        ),
    ]
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use time::macros::datetime;

    const NOW: OffsetDateTime = datetime!(2025-03-05 14:30 +01:00);

    fn arb_notification() -> impl Strategy<Value = Notification> {
        let kinds = prop_oneof![
            Just(NotificationKind::Alert),
            Just(NotificationKind::Reminder),
            Just(NotificationKind::System),
            Just(NotificationKind::Info),
        ];
        let sensors = prop_oneof![
            Just(None),
            Just(Some(SensorKind::Temperature)),
            Just(Some(SensorKind::Humidity)),
            Just(Some(SensorKind::Light)),
            Just(Some(SensorKind::Water)),
        ];
        (0u32..10_000, kinds, sensors, -10 * 86_400i64..86_400, any::<bool>()).prop_map(
            |(id, kind, sensor_kind, offset_secs, read)| Notification {
                id: id.to_string(),
                kind,
                priority: Priority::Low,
                title: "t".into(),
                message: String::new(),
                related_entity_id: None,
                sensor_kind,
                sensor_value: None,
                timestamp: NOW + Duration::seconds(offset_secs),
                read,
            },
        )
    }

    fn arb_prefs() -> impl Strategy<Value = NotificationPreferences> {
        prop::collection::vec(any::<bool>(), 5).prop_map(|flags| {
            NotificationPreferences::keys()
                .zip(flags)
                .fold(NotificationPreferences::default(), |p, (k, on)| p.with(k, on))
        })
    }

    proptest! {
        /// Applying preferences twice equals applying them once.
        #[test]
        fn preferences_are_idempotent(
            items in prop::collection::vec(arb_notification(), 0..40),
            prefs in arb_prefs(),
        ) {
            let tagged = tag_all(items, NOW);
            let once = apply_preferences(&tagged, &prefs);
            let twice = apply_preferences(&once, &prefs);
            prop_assert_eq!(once, twice);
        }

        /// Every notification lands in exactly one bucket.
        #[test]
        fn buckets_partition_input(items in prop::collection::vec(arb_notification(), 0..40)) {
            let tagged = tag_all(items, NOW);
            let buckets = bucket_by_date(&tagged, NOW);
            prop_assert_eq!(buckets.today.len() + buckets.older.len(), tagged.len());

            let midnight = local_midnight(NOW);
            prop_assert!(buckets.today.iter().all(|n| n.notification.timestamp >= midnight));
            prop_assert!(buckets.older.iter().all(|n| n.notification.timestamp < midnight));
            for n in &tagged {
                let in_today = buckets.today.contains(n);
                let in_older = buckets.older.contains(n);
                prop_assert!(in_today != in_older);
            }
        }
    }
}
