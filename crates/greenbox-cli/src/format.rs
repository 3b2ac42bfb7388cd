//! Output formatting for text and JSON output.

use std::fmt::Write as _;

use anyhow::Result;
use greenbox_core::{
    DataSource, HealthReport, InboxView, NormalizedSeries, NotificationPreferences, OverallHealth,
    SensorStatus, Snapshot, StreamStatus, SyncState, TaggedNotification,
};
use greenbox_types::{ActuatorStatus, Priority, SensorKind, SensorReading};
use owo_colors::OwoColorize;
use serde::Serialize;

use crate::cli::OutputFormat;

/// Formatting options for output.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormatOptions {
    /// Disable colored output.
    pub no_color: bool,
    pub format: OutputFormat,
    /// Suppress informational lines on stderr.
    pub quiet: bool,
}

impl FormatOptions {
    pub fn new(no_color: bool, format: OutputFormat, quiet: bool) -> Self {
        Self {
            no_color,
            format,
            quiet,
        }
    }

    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    /// Serialize value to pretty JSON.
    pub fn as_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<String> {
        Ok(serde_json::to_string_pretty(value)? + "\n")
    }

    fn title(&self, text: &str) -> String {
        if self.no_color {
            text.to_string()
        } else {
            text.bold().to_string()
        }
    }

    fn dim(&self, text: &str) -> String {
        if self.no_color {
            text.to_string()
        } else {
            text.dimmed().to_string()
        }
    }
}

/// `[ONLINE]` or `[OFFLINE]`.
pub fn format_online(online: bool, no_color: bool) -> String {
    let label = if online { "ONLINE" } else { "OFFLINE" };
    if no_color {
        format!("[{}]", label)
    } else if online {
        format!("[{}]", label.green())
    } else {
        format!("[{}]", label.red())
    }
}

pub fn format_sensor_status(status: SensorStatus, no_color: bool) -> String {
    let label = match status {
        SensorStatus::Optimal => "optimal",
        SensorStatus::OutOfRange => "out of range",
        SensorStatus::Unconstrained => "-",
    };
    if no_color {
        return label.to_string();
    }
    match status {
        SensorStatus::Optimal => label.green().to_string(),
        SensorStatus::OutOfRange => label.yellow().to_string(),
        SensorStatus::Unconstrained => label.dimmed().to_string(),
    }
}

fn format_source(source: Option<DataSource>) -> &'static str {
    match source {
        Some(DataSource::Remote) => "remote",
        Some(DataSource::Cache) => "cache",
        Some(DataSource::Synthetic) => "synthetic",
        None => "-",
    }
}

fn format_value(kind: SensorKind, value: f64) -> String {
    format!("{:.1}{}", value, kind.unit())
}

fn format_time(timestamp: time::OffsetDateTime) -> String {
    format!(
        "{:04}-{:02}-{:02} {:02}:{:02}",
        timestamp.year(),
        u8::from(timestamp.month()),
        timestamp.day(),
        timestamp.hour(),
        timestamp.minute()
    )
}

fn format_reading(
    out: &mut String,
    reading: &SensorReading,
    health: Option<&HealthReport>,
    opts: &FormatOptions,
) {
    let _ = writeln!(
        out,
        "{}",
        opts.dim(&format!("Reading at {}", format_time(reading.timestamp)))
    );
    for kind in SensorKind::ALL {
        let status = health
            .map(|h| format_sensor_status(h.status(kind), opts.no_color))
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "  {:<12} {:>8}  {}",
            kind.title(),
            format_value(kind, reading.value(kind)),
            status
        );
    }
}

fn format_actuators(out: &mut String, actuators: &ActuatorStatus) {
    let on_off = |on: bool| if on { "on" } else { "off" };
    let _ = writeln!(
        out,
        "  Light {}  Pump {}  Waterings {}",
        on_off(actuators.led_on),
        on_off(actuators.pump_on),
        actuators.watering_count
    );
    if let Some(last) = actuators.last_watering_timestamp {
        let _ = writeln!(out, "  Last watering {}", format_time(last));
    }
}

/// Full status block: entity, health, latest reading and actuators.
pub fn format_status_text(snapshot: &Snapshot, opts: &FormatOptions) -> String {
    let mut out = String::new();
    let Some(entity) = &snapshot.active_entity else {
        let _ = writeln!(
            out,
            "No box selected. Use `greenbox login <code>` or `greenbox select <id>`."
        );
        return out;
    };

    let _ = writeln!(
        out,
        "{} {}",
        opts.title(&entity.display_name),
        format_online(snapshot.online, opts.no_color)
    );

    if let Some(health) = &snapshot.health {
        let overall = match health.overall {
            OverallHealth::Healthy if !opts.no_color => {
                health.overall.description().green().to_string()
            }
            OverallHealth::Caution if !opts.no_color => {
                health.overall.description().yellow().to_string()
            }
            _ => health.overall.description().to_string(),
        };
        let _ = writeln!(out, "{}", overall);
        let _ = writeln!(out, "{}", opts.dim(health.overall.action()));
    }

    match &snapshot.latest_reading {
        Some(reading) => format_reading(&mut out, reading, snapshot.health.as_ref(), opts),
        None => {
            let _ = writeln!(out, "No reading available");
        }
    }

    if let Some(actuators) = &snapshot.actuators {
        format_actuators(&mut out, actuators);
    }

    if snapshot.notifications.unread_count > 0 {
        let _ = writeln!(
            out,
            "{} unread notification(s)",
            snapshot.notifications.unread_count
        );
    }
    out
}

/// One line per stream.
pub fn format_streams_text(streams: &[StreamStatus], opts: &FormatOptions) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{}",
        opts.title(&format!(
            "{:<14} {:<9} {:<10} {:>4} {:>4}  {}",
            "STREAM", "STATE", "SOURCE", "OK", "FAIL", "LAST ERROR"
        ))
    );
    for status in streams {
        let state = match status.state {
            SyncState::Idle => "idle",
            SyncState::Fetching => "fetching",
            SyncState::Succeeded => "ok",
            SyncState::Failed => "failed",
        };
        let _ = writeln!(
            out,
            "{:<14} {:<9} {:<10} {:>4} {:>4}  {}",
            status.stream.to_string(),
            state,
            format_source(status.source),
            status.success_count,
            status.failure_count,
            status.last_error.as_deref().unwrap_or("-")
        );
    }
    out
}

/// A chart series as label, value, delta and bar.
pub fn format_series_text(series: &NormalizedSeries, opts: &FormatOptions) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} ({})",
        opts.title(series.sensor.title()),
        series.period
    );
    for point in &series.points {
        let bar_len = (point.percentage / 5.0).round() as usize;
        let bar = "#".repeat(bar_len);
        let bar = if opts.no_color {
            bar
        } else {
            bar.cyan().to_string()
        };
        let _ = writeln!(
            out,
            "  {:<6} {:>8} {:>+7.1}  {:<20} {:>5.1}%",
            point.label,
            format!("{:.1}{}", point.value, series.unit),
            point.delta,
            bar,
            point.percentage
        );
    }
    let summary = &series.summary;
    let _ = writeln!(
        out,
        "  {}",
        opts.dim(&format!(
            "min {:.1}  max {:.1}  avg {:.1}  change {:+.1}",
            summary.min, summary.max, summary.average, summary.change
        ))
    );
    out
}

fn format_priority(priority: Priority, no_color: bool) -> String {
    let label = priority.as_str();
    if no_color {
        return label.to_string();
    }
    match priority {
        Priority::High => label.red().to_string(),
        Priority::Medium => label.yellow().to_string(),
        Priority::Low => label.dimmed().to_string(),
    }
}

fn format_notification(out: &mut String, item: &TaggedNotification, opts: &FormatOptions) {
    let n = &item.notification;
    let marker = if n.read { " " } else { "*" };
    let _ = writeln!(
        out,
        "{} {} {:<9} {:<6} {} [{}]",
        marker,
        item.time,
        n.kind.as_str(),
        format_priority(n.priority, opts.no_color),
        n.title,
        opts.dim(&n.id)
    );
    if !n.message.is_empty() {
        let _ = writeln!(out, "        {}", n.message);
    }
}

/// Today/older buckets and the unread count.
pub fn format_inbox_text(view: &InboxView, opts: &FormatOptions) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} unread", view.unread_count);
    if view.today.is_empty() && view.older.is_empty() {
        let _ = writeln!(out, "No notifications");
        return out;
    }
    for (heading, items) in [("Today", &view.today), ("Older", &view.older)] {
        if items.is_empty() {
            continue;
        }
        let _ = writeln!(out, "{}", opts.title(heading));
        for item in items {
            format_notification(&mut out, item, opts);
        }
    }
    out
}

pub fn format_prefs_text(prefs: &NotificationPreferences, opts: &FormatOptions) -> String {
    let mut out = String::new();
    for (key, enabled) in prefs.entries() {
        let state = match (enabled, opts.no_color) {
            (true, true) => "on".to_string(),
            (false, true) => "off".to_string(),
            (true, false) => "on".green().to_string(),
            (false, false) => "off".dimmed().to_string(),
        };
        let _ = writeln!(out, "{:<12} {}", key, state);
    }
    out
}

/// Compact single line for watch mode.
pub fn format_watch_line(snapshot: &Snapshot, opts: &FormatOptions) -> String {
    let timestamp = chrono::Local::now().format("%H:%M:%S");
    let mut line = format!(
        "[{}] {}",
        timestamp,
        format_online(snapshot.online, opts.no_color)
    );
    if let Some(reading) = &snapshot.latest_reading {
        for kind in SensorKind::ALL {
            let _ = write!(line, " {}", format_value(kind, reading.value(kind)));
        }
    } else {
        line.push_str(" no reading");
    }
    if snapshot.notifications.unread_count > 0 {
        let _ = write!(line, " ({} unread)", snapshot.notifications.unread_count);
    }
    line.push('\n');
    line
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use greenbox_core::{Engine, MockGateway, SyncConfig, Trigger};
    use greenbox_store::MemoryStore;
    use greenbox_types::{ActiveEntity, OptimalRange, Period};
    use time::macros::datetime;

    use super::*;

    fn plain() -> FormatOptions {
        FormatOptions::new(true, OutputFormat::Text, false)
    }

    async fn snapshot(gateway: MockGateway) -> Arc<Snapshot> {
        let engine = Engine::with_clock(
            Arc::new(gateway),
            Arc::new(MemoryStore::new()),
            SyncConfig::default(),
            Arc::new(|| datetime!(2025-03-09 12:00 UTC)),
        )
        .unwrap();
        engine
            .select_entity(
                ActiveEntity::new("strawberry", "Strawberry")
                    .with_range(SensorKind::Temperature, OptimalRange::between(18.0, 24.0)),
            )
            .await
            .unwrap();
        engine.refresh(Trigger::Mount).await.published().unwrap()
    }

    #[test]
    fn test_format_online_plain() {
        assert_eq!(format_online(true, true), "[ONLINE]");
        assert_eq!(format_online(false, true), "[OFFLINE]");
    }

    #[test]
    fn test_format_sensor_status_plain() {
        assert_eq!(format_sensor_status(SensorStatus::Optimal, true), "optimal");
        assert_eq!(
            format_sensor_status(SensorStatus::OutOfRange, true),
            "out of range"
        );
    }

    #[test]
    fn test_format_colored_contains_ansi() {
        assert!(format_online(true, false).contains("\x1b["));
    }

    #[tokio::test]
    async fn test_status_text_shows_entity_and_out_of_range_sensor() {
        let snapshot = snapshot(MockGateway::new()).await;
        let text = format_status_text(&snapshot, &plain());
        assert!(text.starts_with("Strawberry [ONLINE]"));
        // The mock's latest temperature of 26 is above the 24 ceiling
        assert!(text.contains("Temperature"));
        assert!(text.contains("26.0°C"));
        assert!(text.contains("out of range"));
        assert!(text.contains("Light on"));
    }

    #[tokio::test]
    async fn test_status_text_without_entity() {
        let engine = Engine::new(
            Arc::new(MockGateway::new()),
            Arc::new(MemoryStore::new()),
            SyncConfig::default(),
        )
        .unwrap();
        let text = format_status_text(&engine.snapshot(), &plain());
        assert!(text.contains("No box selected"));
    }

    #[tokio::test]
    async fn test_series_text_lists_weekdays() {
        let snapshot = snapshot(MockGateway::new()).await;
        let series = &snapshot.series[&Period::Week][&SensorKind::Temperature];
        let text = format_series_text(series, &plain());
        for day in ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"] {
            assert!(text.contains(day), "missing {day}");
        }
        assert!(text.contains("avg 25.6"));
    }

    #[tokio::test]
    async fn test_streams_text_offline_shows_synthetic_source() {
        let snapshot = snapshot(MockGateway::builder().fail(true).build()).await;
        let text = format_streams_text(&snapshot.streams, &plain());
        assert!(text.contains("series:7d"));
        assert!(text.contains("synthetic"));
        assert!(text.contains("Mock gateway unreachable"));
    }

    #[test]
    fn test_inbox_text_empty() {
        let text = format_inbox_text(&InboxView::default(), &plain());
        assert!(text.contains("0 unread"));
        assert!(text.contains("No notifications"));
    }

    #[test]
    fn test_prefs_text_lists_every_key() {
        let prefs = NotificationPreferences::default().with("water", false);
        let text = format_prefs_text(&prefs, &plain());
        for key in NotificationPreferences::keys() {
            assert!(text.contains(key));
        }
        assert!(text.lines().any(|l| l.starts_with("water") && l.ends_with("off")));
    }

    #[tokio::test]
    async fn test_watch_line_is_single_line() {
        let snapshot = snapshot(MockGateway::new()).await;
        let line = format_watch_line(&snapshot, &plain());
        assert_eq!(line.matches('\n').count(), 1);
        assert!(line.contains("[ONLINE]"));
    }

    #[tokio::test]
    async fn test_snapshot_json_has_no_raw_inbox() {
        let snapshot = snapshot(MockGateway::new()).await;
        let json = plain().as_json(snapshot.as_ref()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["online"], true);
        assert!(value.get("inbox").is_none());
        assert!(value["notifications"]["unread_count"].is_number());
    }
}
