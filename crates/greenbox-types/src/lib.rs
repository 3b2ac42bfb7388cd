//! Platform-agnostic types for Greenbox grow-box telemetry.
//!
//! This crate provides the shared data model used by the sync engine
//! (greenbox-core), the local store (greenbox-store) and the CLI.
//!
//! # Features
//!
//! - Sensor readings and history periods
//! - Actuator status
//! - The active entity (selected box/plant) with its optimal ranges
//! - Inbox notifications and access-code validation results
//! - Error types for parsing identifiers
//!
//! # Example
//!
//! ```
//! use greenbox_types::{ActiveEntity, OptimalRange, SensorKind};
//!
//! let entity = ActiveEntity::new("box-7", "Strawberry")
//!     .with_range(SensorKind::Temperature, OptimalRange::between(18.0, 26.0));
//! assert!(entity.range(SensorKind::Temperature).is_some());
//! ```

pub mod error;
pub mod types;

pub use error::{ParseError, ParseResult};
pub use types::{
    AccessValidation, ActiveEntity, ActuatorStatus, Notification, NotificationKind, OptimalRange,
    Period, Priority, SensorKind, SensorReading,
};

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    // --- SensorKind tests ---

    #[test]
    fn test_sensor_kind_parse_accepts_short_aliases() {
        assert_eq!("temp".parse::<SensorKind>(), Ok(SensorKind::Temperature));
        assert_eq!("HUM".parse::<SensorKind>(), Ok(SensorKind::Humidity));
        assert_eq!(" light ".parse::<SensorKind>(), Ok(SensorKind::Light));
    }

    #[test]
    fn test_sensor_kind_parse_unknown() {
        let err = "co2".parse::<SensorKind>().unwrap_err();
        assert_eq!(err, ParseError::UnknownSensorKind("co2".to_string()));
        assert_eq!(err.to_string(), "Unknown sensor kind: co2");
    }

    #[test]
    fn test_sensor_kind_order_matches_display_order() {
        let mut kinds = vec![SensorKind::Water, SensorKind::Temperature, SensorKind::Light];
        kinds.sort();
        assert_eq!(
            kinds,
            vec![SensorKind::Temperature, SensorKind::Light, SensorKind::Water]
        );
    }

    #[test]
    fn test_units_are_fixed_per_sensor() {
        assert_eq!(SensorKind::Temperature.unit(), "°C");
        for kind in [SensorKind::Humidity, SensorKind::Light, SensorKind::Water] {
            assert_eq!(kind.unit(), "%");
        }
    }

    // --- SensorReading tests ---

    #[test]
    fn test_reading_value_by_kind() {
        let reading = SensorReading {
            timestamp: datetime!(2025-03-01 10:00 UTC),
            temperature: 24.5,
            humidity: 61.0,
            light: 78.0,
            water: 73.0,
        };

        assert_eq!(reading.value(SensorKind::Temperature), 24.5);
        assert_eq!(reading.value(SensorKind::Humidity), 61.0);
        assert_eq!(reading.value(SensorKind::Light), 78.0);
        assert_eq!(reading.value(SensorKind::Water), 73.0);
    }

    #[test]
    fn test_reading_deserialization_accepts_short_field_names() {
        let json = r#"{"timestamp":"2025-03-01T10:00:00Z","temp":22.0,"hum":55,"light":60,"water":70}"#;
        let reading: SensorReading = serde_json::from_str(json).unwrap();
        assert_eq!(reading.temperature, 22.0);
        assert_eq!(reading.humidity, 55.0);
        assert_eq!(reading.timestamp, datetime!(2025-03-01 10:00 UTC));
    }

    #[test]
    fn test_reading_deserialization_missing_field_fails() {
        let json = r#"{"timestamp":"2025-03-01T10:00:00Z","temperature":22.0}"#;
        assert!(serde_json::from_str::<SensorReading>(json).is_err());
    }

    // --- Period tests ---

    #[test]
    fn test_period_wire_form() {
        assert_eq!(serde_json::to_string(&Period::Day).unwrap(), "\"24h\"");
        assert_eq!(serde_json::to_string(&Period::Week).unwrap(), "\"7d\"");
        assert_eq!(serde_json::to_string(&Period::Month).unwrap(), "\"30d\"");
        assert_eq!(Period::default(), Period::Week);
    }

    #[test]
    fn test_period_window_lengths() {
        assert_eq!(Period::Day.window_len(), 24);
        assert_eq!(Period::Week.window_len(), 7);
        assert_eq!(Period::Month.window_len(), 30);
        assert_eq!(Period::Day.step(), time::Duration::hours(1));
    }

    #[test]
    fn test_period_parse_error_message() {
        let err = "2w".parse::<Period>().unwrap_err();
        assert!(err.to_string().contains("expected 24h, 7d or 30d"));
    }

    // --- ActuatorStatus tests ---

    #[test]
    fn test_actuator_status_accepts_legacy_field_names() {
        let json = r#"{"led":true,"pump":false,"wateringCount":4,"lastWateringDate":"2025-02-28T07:30:00Z"}"#;
        let status: ActuatorStatus = serde_json::from_str(json).unwrap();
        assert!(status.led_on);
        assert!(!status.pump_on);
        assert_eq!(status.watering_count, 4);
        assert_eq!(
            status.last_watering_timestamp,
            Some(datetime!(2025-02-28 07:30 UTC))
        );
    }

    #[test]
    fn test_actuator_status_null_last_watering() {
        let json = r#"{"ledOn":false,"pumpOn":true,"wateringCount":0,"lastWateringTimestamp":null}"#;
        let status: ActuatorStatus = serde_json::from_str(json).unwrap();
        assert!(status.pump_on);
        assert!(status.last_watering_timestamp.is_none());
    }

    // --- OptimalRange / ActiveEntity tests ---

    #[test]
    fn test_range_bounds_are_inclusive() {
        let range = OptimalRange::between(60.0, 80.0);
        assert!(range.contains(60.0));
        assert!(range.contains(80.0));
        assert!(!range.contains(59.9));
        assert!(!range.contains(80.1));
    }

    #[test]
    fn test_lower_bound_only_range() {
        let range = OptimalRange::at_least(70.0);
        assert!(!range.contains(69.0));
        assert!(range.contains(70.0));
        assert!(range.contains(1_000.0));
    }

    #[test]
    fn test_active_entity_json_shape() {
        let entity = ActiveEntity::new("strawberry", "Strawberry")
            .with_range(SensorKind::Water, OptimalRange::at_least(70.0));

        let json = serde_json::to_value(&entity).unwrap();
        assert_eq!(json["id"], "strawberry");
        assert_eq!(json["displayName"], "Strawberry");
        assert_eq!(json["optimalRange"]["water"]["min"], 70.0);

        let back: ActiveEntity = serde_json::from_value(json).unwrap();
        assert_eq!(back, entity);
    }

    #[test]
    fn test_active_entity_accepts_name_alias_without_ranges() {
        let entity: ActiveEntity = serde_json::from_str(r#"{"id":"b1","name":"Basil"}"#).unwrap();
        assert_eq!(entity.display_name, "Basil");
        assert!(entity.optimal_range.is_empty());
        assert!(entity.range(SensorKind::Light).is_none());
    }

    // --- Notification tests ---

    #[test]
    fn test_notification_deserialization_with_source_field_names() {
        let json = r#"{
            "id": "3",
            "type": "alert",
            "priority": "medium",
            "title": "Low humidity",
            "message": "Humidity dropped to 45%",
            "plantId": "strawberry",
            "sensorType": "humidity",
            "sensorValue": 45,
            "timestamp": "2025-03-01T09:15:00Z",
            "read": false
        }"#;

        let n: Notification = serde_json::from_str(json).unwrap();
        assert_eq!(n.kind, NotificationKind::Alert);
        assert_eq!(n.priority, Priority::Medium);
        assert_eq!(n.related_entity_id.as_deref(), Some("strawberry"));
        assert_eq!(n.sensor_kind, Some(SensorKind::Humidity));
        assert_eq!(n.sensor_value, Some(45.0));
        assert!(!n.read);
    }

    #[test]
    fn test_notification_defaults() {
        let json = r#"{"id":"9","type":"system","title":"Updated","timestamp":"2025-03-01T09:15:00Z"}"#;
        let n: Notification = serde_json::from_str(json).unwrap();
        assert_eq!(n.priority, Priority::Low);
        assert!(n.message.is_empty());
        assert!(!n.read);
        assert!(n.sensor_kind.is_none());

        let out = serde_json::to_value(&n).unwrap();
        assert_eq!(out["type"], "system");
        assert!(out.get("sensorKind").is_none());
    }

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::High > Priority::Medium);
        assert!(Priority::Medium > Priority::Low);
        assert_eq!("HIGH".parse::<Priority>(), Ok(Priority::High));
    }

    #[test]
    fn test_access_validation_accepts_ok_alias() {
        let v: AccessValidation = serde_json::from_str(r#"{"ok":true,"boxId":"b-12"}"#).unwrap();
        assert!(v.valid);
        assert_eq!(v.entity_id.as_deref(), Some("b-12"));

        let v: AccessValidation = serde_json::from_str(r#"{"valid":false}"#).unwrap();
        assert!(!v.valid);
        assert!(v.entity_id.is_none());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Parsing arbitrary strings never panics.
        #[test]
        fn parse_identifiers_never_panic(s in ".*") {
            let _ = s.parse::<SensorKind>();
            let _ = s.parse::<Period>();
            let _ = s.parse::<NotificationKind>();
            let _ = s.parse::<Priority>();
        }

        /// A bounded range contains exactly the values between its bounds.
        #[test]
        fn bounded_range_membership(
            min in -100.0f64..100.0,
            width in 0.0f64..100.0,
            v in -300.0f64..300.0,
        ) {
            let range = OptimalRange::between(min, min + width);
            prop_assert_eq!(range.contains(v), v >= min && v <= min + width);
        }
    }
}
