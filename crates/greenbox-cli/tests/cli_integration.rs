//! CLI Integration Tests
//!
//! These tests run the `greenbox` binary against an isolated config file and
//! state database. The gateway URL points at a closed local port, so every
//! command exercises the offline path.
//!
//! ```
//! cargo test --package greenbox-cli --test cli_integration
//! ```

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use serde_json::Value;
use tempfile::TempDir;

/// Nothing listens on the discard port.
const UNREACHABLE_GATEWAY: &str = "http://127.0.0.1:9";

/// An isolated home for one test.
struct Sandbox {
    dir: TempDir,
}

impl Sandbox {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("Failed to create temp dir"),
        }
    }

    fn config_path(&self) -> PathBuf {
        self.dir.path().join("config.toml")
    }

    fn database_path(&self) -> PathBuf {
        self.dir.path().join("state.db")
    }

    fn run(&self, args: &[&str]) -> Output {
        self.run_with_no_color(args, "1")
    }

    fn run_with_no_color(&self, args: &[&str], no_color: &str) -> Output {
        Command::new(env!("CARGO_BIN_EXE_greenbox"))
            .args(args)
            .env("GREENBOX_CONFIG", self.config_path())
            .env("GREENBOX_DATABASE", self.database_path())
            .env("GREENBOX_GATEWAY", UNREACHABLE_GATEWAY)
            .env("NO_COLOR", no_color)
            .env_remove("RUST_LOG")
            .output()
            .expect("Failed to run greenbox binary")
    }

    fn run_ok(&self, args: &[&str]) -> String {
        let output = self.run(args);
        assert!(
            output.status.success(),
            "greenbox {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8_lossy(&output.stdout).into_owned()
    }

    fn run_json(&self, args: &[&str]) -> Value {
        let mut full = vec!["--json"];
        full.extend_from_slice(args);
        let stdout = self.run_ok(&full);
        serde_json::from_str(&stdout).unwrap_or_else(|e| panic!("Invalid JSON ({e}): {stdout}"))
    }

    fn select_strawberry(&self) {
        self.run_ok(&[
            "select",
            "strawberry",
            "--name",
            "Strawberry",
            "--range",
            "temperature=18:26",
        ]);
    }
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn find_notification<'a>(view: &'a Value, id: &str) -> Option<&'a Value> {
    ["today", "older"]
        .iter()
        .filter_map(|bucket| view[bucket].as_array())
        .flatten()
        .find(|n| n["id"] == id)
}

// =============================================================================
// Help and Version
// =============================================================================

#[test]
fn test_help_command() {
    let stdout = Sandbox::new().run_ok(&["--help"]);
    for cmd in ["login", "select", "status", "sync", "watch", "history", "notifications"] {
        assert!(stdout.contains(cmd), "Help should list {cmd}");
    }
}

#[test]
fn test_version_command() {
    let stdout = Sandbox::new().run_ok(&["--version"]);
    assert!(stdout.contains("greenbox"));
}

#[test]
fn test_subcommand_help() {
    let sandbox = Sandbox::new();
    let subcommands = [
        "login",
        "select",
        "status",
        "sync",
        "watch",
        "history",
        "notifications",
        "read",
        "read-all",
        "dismiss",
        "prefs",
        "logout",
        "config",
    ];
    for cmd in subcommands {
        let stdout = sandbox.run_ok(&[cmd, "--help"]);
        assert!(!stdout.is_empty(), "{} --help should produce output", cmd);
    }
}

#[test]
fn test_no_color_env_accepts_any_value() {
    let sandbox = Sandbox::new();
    for value in ["1", "yes", "true", "", "0"] {
        let output = sandbox.run_with_no_color(&["config", "path"], value);
        assert!(
            output.status.success(),
            "NO_COLOR={value:?} rejected: {}",
            stderr(&output)
        );
    }
}

#[test]
fn test_invalid_range_is_rejected_by_parser() {
    let output = Sandbox::new().run(&["select", "strawberry", "--range", "co2=400:800"]);
    assert!(!output.status.success());
}

// =============================================================================
// Entity selection
// =============================================================================

#[test]
fn test_status_without_selection_fails() {
    let output = Sandbox::new().run(&["status"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("No box selected"));
}

#[test]
fn test_selection_persists_between_invocations() {
    let sandbox = Sandbox::new();
    sandbox.select_strawberry();

    let report = sandbox.run_json(&["sync"]);
    assert_eq!(report["entity_id"], "strawberry");
    assert_eq!(report["online"], false);
    let streams = report["streams"].as_array().unwrap();
    assert!(streams.iter().any(|s| s["stream"] == "series:7d"));
    assert!(streams.iter().all(|s| s["failure_count"] == 1));
}

#[test]
fn test_logout_clears_selection() {
    let sandbox = Sandbox::new();
    sandbox.select_strawberry();
    sandbox.run_ok(&["logout"]);

    let output = sandbox.run(&["status"]);
    assert!(!output.status.success());
}

#[test]
fn test_blank_access_code_is_rejected_without_gateway() {
    let output = Sandbox::new().run(&["login", "  "]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Access code rejected"));
}

#[test]
fn test_login_with_unreachable_gateway_fails() {
    let output = Sandbox::new().run(&["login", "4321"]);
    assert!(!output.status.success());
}

// =============================================================================
// Offline fallback
// =============================================================================

#[test]
fn test_status_offline_renders_placeholder_data() {
    let sandbox = Sandbox::new();
    sandbox.select_strawberry();

    let snapshot = sandbox.run_json(&["status"]);
    assert_eq!(snapshot["online"], false);
    assert_eq!(snapshot["active_entity"]["id"], "strawberry");
    assert!(snapshot["latest_reading"].is_object());
    assert!(snapshot["health"]["overall"].is_string());

    let points = snapshot["series"]["7d"]["temperature"]["points"]
        .as_array()
        .unwrap();
    assert!(!points.is_empty());
    for point in points {
        let pct = point["percentage"].as_f64().unwrap();
        assert!((40.0..=100.0).contains(&pct), "percentage {pct}");
    }
}

#[test]
fn test_status_text_offline() {
    let sandbox = Sandbox::new();
    sandbox.select_strawberry();

    let output = sandbox.run(&["status"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Strawberry [OFFLINE]"));
    assert!(stderr(&output).contains("Gateway unreachable"));
}

#[test]
fn test_history_single_sensor() {
    let sandbox = Sandbox::new();
    sandbox.select_strawberry();

    let charts = sandbox.run_json(&["history", "--period", "7d", "--sensor", "humidity"]);
    let charts = charts.as_array().unwrap();
    assert_eq!(charts.len(), 1);
    assert_eq!(charts[0]["sensor"], "humidity");
    assert_eq!(charts[0]["period"], "7d");
}

#[test]
fn test_history_unsynced_period_fails() {
    let sandbox = Sandbox::new();
    sandbox.select_strawberry();

    let output = sandbox.run(&["history", "--period", "30d"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("not synced"));
}

#[test]
fn test_configured_periods_are_synced() {
    let sandbox = Sandbox::new();
    std::fs::write(sandbox.config_path(), "periods = [\"24h\", \"7d\"]\n").unwrap();
    sandbox.select_strawberry();

    let charts = sandbox.run_json(&["history", "--period", "24h", "--sensor", "light"]);
    assert_eq!(charts[0]["period"], "24h");
}

#[test]
fn test_watch_stops_after_count() {
    let sandbox = Sandbox::new();
    sandbox.select_strawberry();

    let stdout = sandbox.run_ok(&["--json", "watch", "--interval", "1", "--count", "2"]);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 2);
    for line in lines {
        let snapshot: Value = serde_json::from_str(line).unwrap();
        assert_eq!(snapshot["online"], false);
    }
}

// =============================================================================
// Notifications and preferences
// =============================================================================

#[test]
fn test_read_offline_keeps_local_state() {
    let sandbox = Sandbox::new();
    sandbox.select_strawberry();

    let before = sandbox.run_json(&["notifications"]);
    assert_eq!(find_notification(&before, "1").unwrap()["read"], false);

    // Placeholder notifications are changed locally and never sent
    let report = sandbox.run_json(&["read", "1"]);
    assert_eq!(report["changed"], true);
    assert_eq!(report["acknowledged"], false);
    assert!(report["error"].is_null());

    let after = sandbox.run_json(&["notifications"]);
    assert_eq!(find_notification(&after, "1").unwrap()["read"], true);
    assert!(after["unread_count"].as_u64() < before["unread_count"].as_u64());
}

#[test]
fn test_dismiss_unknown_notification_fails() {
    let sandbox = Sandbox::new();
    sandbox.select_strawberry();

    let output = sandbox.run(&["dismiss", "does-not-exist"]);
    assert!(!output.status.success());
}

#[test]
fn test_dismiss_removes_notification() {
    let sandbox = Sandbox::new();
    sandbox.select_strawberry();

    sandbox.run_json(&["dismiss", "1"]);
    let after = sandbox.run_json(&["notifications"]);
    assert!(find_notification(&after, "1").is_none());
}

#[test]
fn test_category_filter() {
    let sandbox = Sandbox::new();
    sandbox.select_strawberry();

    let alerts = sandbox.run_json(&["notifications", "--category", "alerts"]);
    for bucket in ["today", "older"] {
        for n in alerts[bucket].as_array().unwrap() {
            assert_eq!(n["type"], "alert");
        }
    }
}

#[test]
fn test_prefs_set_persists() {
    let sandbox = Sandbox::new();
    sandbox.select_strawberry();

    sandbox.run_ok(&["prefs", "set", "humidity", "off"]);
    let prefs = sandbox.run_json(&["prefs"]);
    assert_eq!(prefs["humidity"], false);
    assert_eq!(prefs["temperature"], true);
}

#[test]
fn test_prefs_set_requires_on_or_off() {
    let sandbox = Sandbox::new();
    sandbox.select_strawberry();

    sandbox.run_ok(&["prefs", "set", "water", "off"]);
    sandbox.run_ok(&["prefs", "set", "water", "on"]);
    let prefs = sandbox.run_json(&["prefs"]);
    assert_eq!(prefs["water"], true);

    let output = sandbox.run(&["prefs", "set", "water", "maybe"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_prefs_unknown_key_fails() {
    let output = Sandbox::new().run(&["prefs", "set", "co2", "off"]);
    assert!(!output.status.success());
}

// =============================================================================
// Config
// =============================================================================

#[test]
fn test_config_path_honors_env() {
    let sandbox = Sandbox::new();
    let stdout = sandbox.run_ok(&["config", "path"]);
    assert_eq!(Path::new(stdout.trim()), sandbox.config_path());
}

#[test]
fn test_config_init_writes_defaults() {
    let sandbox = Sandbox::new();
    sandbox.run_ok(&["config", "init"]);
    let written = std::fs::read_to_string(sandbox.config_path()).unwrap();
    assert!(written.contains("gateway_url"));

    let shown = sandbox.run_json(&["config", "show"]);
    assert_eq!(shown["poll_interval_secs"], 30);
}
