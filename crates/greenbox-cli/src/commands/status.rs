//! Status command implementation.

use anyhow::Result;
use greenbox_core::{Engine, Trigger};

use crate::format::{FormatOptions, format_status_text};

use super::{refresh, require_entity, warn_if_offline};

pub async fn cmd_status(engine: &Engine, opts: &FormatOptions) -> Result<()> {
    require_entity(engine)?;
    let snapshot = refresh(engine, Trigger::Mount).await;

    if opts.is_json() {
        print!("{}", opts.as_json(snapshot.as_ref())?);
    } else {
        warn_if_offline(&snapshot, opts);
        print!("{}", format_status_text(&snapshot, opts));
    }
    Ok(())
}
