//! Sync command: one pull-to-refresh cycle and its per-stream outcome.

use anyhow::Result;
use greenbox_core::{Engine, Trigger};
use serde::Serialize;

use crate::format::{FormatOptions, format_online, format_streams_text};

use super::{refresh, require_entity};

#[derive(Serialize)]
struct SyncReport<'a> {
    entity_id: &'a str,
    online: bool,
    streams: &'a [greenbox_core::StreamStatus],
}

pub async fn cmd_sync(engine: &Engine, opts: &FormatOptions) -> Result<()> {
    let entity = require_entity(engine)?;
    let snapshot = refresh(engine, Trigger::PullToRefresh).await;

    if opts.is_json() {
        print!(
            "{}",
            opts.as_json(&SyncReport {
                entity_id: &entity.id,
                online: snapshot.online,
                streams: &snapshot.streams,
            })?
        );
    } else {
        println!(
            "{} {}",
            entity.display_name,
            format_online(snapshot.online, opts.no_color)
        );
        print!("{}", format_streams_text(&snapshot.streams, opts));
    }
    Ok(())
}
