//! Login, entity selection and logout.

use anyhow::{Result, bail};
use greenbox_core::Engine;
use greenbox_types::ActiveEntity;
use serde::Serialize;

use crate::cli::RangeSpec;
use crate::format::FormatOptions;

use super::notice;

#[derive(Serialize)]
struct LoginResult<'a> {
    valid: bool,
    entity_id: Option<&'a str>,
}

pub async fn cmd_login(engine: &Engine, code: &str, opts: &FormatOptions) -> Result<()> {
    let validation = engine.validate_code(code).await?;
    if !validation.valid {
        bail!("Access code rejected");
    }

    if let Some(id) = validation.entity_id.as_deref() {
        // Keep the local name and ranges when logging back into the same box
        let entity = match engine.active_entity() {
            Some(current) if current.id == id => current,
            _ => ActiveEntity::new(id, id),
        };
        engine.select_entity(entity).await?;
    }

    if opts.is_json() {
        print!(
            "{}",
            opts.as_json(&LoginResult {
                valid: true,
                entity_id: validation.entity_id.as_deref(),
            })?
        );
    } else {
        match validation.entity_id.as_deref() {
            Some(id) => println!("Access code accepted. Selected box {}.", id),
            None => println!("Access code accepted."),
        }
    }
    Ok(())
}

pub async fn cmd_select(
    engine: &Engine,
    id: &str,
    name: Option<String>,
    ranges: &[RangeSpec],
    opts: &FormatOptions,
) -> Result<()> {
    if id.trim().is_empty() {
        bail!("Box identifier must not be empty");
    }
    let mut entity = ActiveEntity::new(id, name.unwrap_or_else(|| id.to_string()));
    for spec in ranges {
        entity = entity.with_range(spec.sensor, spec.range);
    }

    let snapshot = engine.select_entity(entity).await?;
    if opts.is_json() {
        print!("{}", opts.as_json(&snapshot.active_entity)?);
    } else {
        notice(opts, &format!("Selected box {}.", id));
    }
    Ok(())
}

pub async fn cmd_logout(engine: &Engine, opts: &FormatOptions) -> Result<()> {
    let previous = engine.active_entity();
    engine.logout().await?;
    match previous {
        Some(entity) => notice(opts, &format!("Logged out of {}.", entity.display_name)),
        None => notice(opts, "No box was selected."),
    }
    Ok(())
}
