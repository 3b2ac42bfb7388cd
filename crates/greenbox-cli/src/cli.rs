//! CLI argument definitions using clap.

use std::path::PathBuf;

use clap::builder::FalseyValueParser;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use greenbox_core::Category;
use greenbox_types::{OptimalRange, Period, SensorKind};

/// Output format for commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Parser)]
#[command(name = "greenbox")]
#[command(author, version, about = "CLI for Greenbox grow boxes", long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Disable colored output (any non-empty NO_COLOR also disables it)
    #[arg(long, global = true, env = "NO_COLOR", value_parser = FalseyValueParser::new())]
    pub no_color: bool,

    /// Gateway base URL (overrides the config file)
    #[arg(long, global = true, env = "GREENBOX_GATEWAY")]
    pub gateway: Option<String>,

    /// State database path (overrides the config file)
    #[arg(long, global = true, env = "GREENBOX_DATABASE")]
    pub database: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate an access code and select the box it unlocks
    Login {
        /// Access code
        code: String,
    },

    /// Set the active box
    Select {
        /// Box identifier
        id: String,

        /// Display name (defaults to the identifier)
        #[arg(short, long)]
        name: Option<String>,

        /// Optimal band, e.g. `temperature=18:26` or `water=70:`
        #[arg(short, long = "range", value_parser = parse_range)]
        ranges: Vec<RangeSpec>,
    },

    /// Refresh once and show health, latest reading and actuators
    Status,

    /// Refresh once and show per-stream sync status
    Sync,

    /// Poll continuously, printing every published snapshot
    Watch {
        /// Polling interval in seconds (defaults to the config value)
        #[arg(short, long)]
        interval: Option<u64>,

        /// Stop after this many cycles (0 for unlimited)
        #[arg(short = 'n', long, default_value = "0")]
        count: u32,
    },

    /// Refresh once and show a normalized chart series
    History {
        /// History window: 24h, 7d or 30d
        #[arg(short, long, default_value = "7d")]
        period: Period,

        /// Sensor to show (all sensors when omitted)
        #[arg(short, long)]
        sensor: Option<SensorKind>,
    },

    /// Refresh once and show the notification inbox
    Notifications {
        /// Inbox tab: all, alerts, reminders or system
        #[arg(short, long, default_value = "all")]
        category: Category,
    },

    /// Mark one notification read
    Read {
        /// Notification id
        id: String,
    },

    /// Mark every notification read
    ReadAll,

    /// Delete one notification
    Dismiss {
        /// Notification id
        id: String,
    },

    /// Show or change notification preferences
    Prefs {
        #[command(subcommand)]
        action: Option<PrefsAction>,
    },

    /// Clear the active box and its cached data
    Logout,

    /// Manage CLI configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration subcommands
#[derive(Debug, Clone, Subcommand)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show,

    /// Show configuration file path
    Path,

    /// Write the default configuration if no file exists
    Init,
}

/// Preference subcommands
#[derive(Debug, Clone, Subcommand)]
pub enum PrefsAction {
    /// Show current preferences
    Show,

    /// Enable or disable one preference
    Set {
        /// Preference key (temperature, humidity, light, water, reminders)
        key: String,

        /// on or off
        #[arg(value_parser = parse_bool_arg, action = ArgAction::Set)]
        enabled: bool,
    },
}

/// An optimal band given on the command line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeSpec {
    pub sensor: SensorKind,
    pub range: OptimalRange,
}

/// Parse `sensor=min:max`, where `max` may be omitted.
fn parse_range(s: &str) -> Result<RangeSpec, String> {
    let (sensor, band) = s
        .split_once('=')
        .ok_or_else(|| format!("Invalid range '{}'. Expected sensor=min:max", s))?;
    let sensor: SensorKind = sensor.parse().map_err(|e| format!("{}", e))?;
    let (min, max) = band.split_once(':').unwrap_or((band, ""));
    let min: f64 = min
        .trim()
        .parse()
        .map_err(|_| format!("'{}' is not a valid minimum", min))?;

    let range = if max.trim().is_empty() {
        OptimalRange::at_least(min)
    } else {
        let max: f64 = max
            .trim()
            .parse()
            .map_err(|_| format!("'{}' is not a valid maximum", max))?;
        if max < min {
            return Err(format!("Maximum {} is below minimum {}", max, min));
        }
        OptimalRange::between(min, max)
    };
    Ok(RangeSpec { sensor, range })
}

/// Parse boolean argument with flexible input
fn parse_bool_arg(s: &str) -> Result<bool, String> {
    match s.to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" | "enable" | "enabled" => Ok(true),
        "false" | "no" | "off" | "0" | "disable" | "disabled" => Ok(false),
        _ => Err(format!(
            "Invalid boolean value '{}'. Use: on/off, true/false, yes/no, 1/0",
            s
        )),
    }
}
