//! Watch command implementation.
//!
//! Refreshes once on start, then hands over to the engine's periodic
//! poller. Ctrl+C cancels the poller, including a cycle still in flight.

use std::time::Duration;

use anyhow::{Result, bail};
use futures::StreamExt;
use greenbox_core::{Engine, Snapshot, Trigger};

use crate::format::{FormatOptions, format_watch_line};

use super::{notice, refresh, require_entity};

fn print_snapshot(snapshot: &Snapshot, opts: &FormatOptions) -> Result<()> {
    if opts.is_json() {
        // One object per line so the output can be streamed
        println!("{}", serde_json::to_string(snapshot)?);
    } else {
        print!("{}", format_watch_line(snapshot, opts));
    }
    Ok(())
}

pub async fn cmd_watch(
    engine: &Engine,
    interval: Option<u64>,
    count: u32,
    opts: &FormatOptions,
) -> Result<()> {
    let entity = require_entity(engine)?;
    let period = interval
        .map(Duration::from_secs)
        .unwrap_or(engine.config().poll_interval);
    if period.is_zero() {
        bail!("Interval must be at least one second");
    }

    notice(
        opts,
        &format!(
            "Watching {} every {}s (Ctrl+C to stop)",
            entity.display_name,
            period.as_secs()
        ),
    );

    let snapshot = refresh(engine, Trigger::Mount).await;
    print_snapshot(&snapshot, opts)?;
    let mut printed: u32 = 1;
    if count > 0 && printed >= count {
        return Ok(());
    }

    let mut poller = engine.start_polling_with(period);
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                notice(opts, "\nShutting down...");
                break;
            }
            outcome = poller.next() => {
                let Some(outcome) = outcome else {
                    break;
                };
                // Discarded cycles publish nothing
                let Some(snapshot) = outcome.published() else {
                    continue;
                };
                print_snapshot(&snapshot, opts)?;
                printed += 1;
                if count > 0 && printed >= count {
                    notice(opts, &format!("Completed {} refreshes.", printed));
                    break;
                }
            }
        }
    }

    poller.close();
    Ok(())
}
