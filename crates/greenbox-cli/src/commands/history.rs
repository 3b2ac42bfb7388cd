//! History command: normalized chart series for one period.

use anyhow::{Result, bail};
use greenbox_core::{Engine, NormalizedSeries, Trigger};
use greenbox_types::{Period, SensorKind};

use crate::format::{FormatOptions, format_series_text};

use super::{refresh, require_entity, warn_if_offline};

pub async fn cmd_history(
    engine: &Engine,
    period: Period,
    sensor: Option<SensorKind>,
    opts: &FormatOptions,
) -> Result<()> {
    require_entity(engine)?;
    if !engine.config().periods.contains(&period) {
        bail!(
            "Period {} is not synced. Add it to `periods` in {}",
            period,
            crate::config::Config::path().display()
        );
    }

    let snapshot = refresh(engine, Trigger::Mount).await;
    let Some(charts) = snapshot.series.get(&period) else {
        bail!("No {} history available yet", period);
    };

    let selected: Vec<&NormalizedSeries> = charts
        .iter()
        .filter(|(kind, _)| sensor.is_none_or(|s| s == **kind))
        .map(|(_, series)| series)
        .collect();
    if selected.is_empty() {
        bail!("No {} history available yet", period);
    }

    if opts.is_json() {
        print!("{}", opts.as_json(&selected)?);
    } else {
        warn_if_offline(&snapshot, opts);
        for (i, series) in selected.iter().enumerate() {
            if i > 0 {
                println!();
            }
            print!("{}", format_series_text(series, opts));
        }
    }
    Ok(())
}
