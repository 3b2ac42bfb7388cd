//! Notification inbox commands.

use anyhow::{Result, bail};
use greenbox_core::{AckOutcome, Category, Engine, Trigger};
use serde::Serialize;

use crate::format::{FormatOptions, format_inbox_text};

use super::{notice, refresh, require_entity, warn_if_offline};

pub async fn cmd_notifications(
    engine: &Engine,
    category: Category,
    opts: &FormatOptions,
) -> Result<()> {
    require_entity(engine)?;
    let snapshot = refresh(engine, Trigger::Mount).await;
    let view = engine.notifications_view(category);

    if opts.is_json() {
        print!("{}", opts.as_json(&view)?);
    } else {
        warn_if_offline(&snapshot, opts);
        print!("{}", format_inbox_text(&view, opts));
    }
    Ok(())
}

#[derive(Serialize)]
struct AckReport<'a> {
    operation: &'a str,
    changed: bool,
    acknowledged: bool,
    error: Option<&'a str>,
}

fn report(operation: &str, outcome: &AckOutcome, opts: &FormatOptions) -> Result<()> {
    if opts.is_json() {
        let error = match outcome {
            AckOutcome::Failed(e) => Some(e.as_str()),
            _ => None,
        };
        print!(
            "{}",
            opts.as_json(&AckReport {
                operation,
                changed: *outcome != AckOutcome::Unchanged,
                acknowledged: *outcome == AckOutcome::Acknowledged,
                error,
            })?
        );
        return Ok(());
    }

    match outcome {
        AckOutcome::Unchanged => notice(opts, "Nothing to change."),
        AckOutcome::Acknowledged => notice(opts, "Done."),
        AckOutcome::LocalOnly => notice(
            opts,
            "Saved locally; placeholder notifications are not sent to the gateway.",
        ),
        AckOutcome::Failed(e) => notice(
            opts,
            &format!("Saved locally; the gateway did not confirm ({}).", e),
        ),
    }
    Ok(())
}

/// Load the inbox so mutations apply to the latest known list.
async fn load_inbox(engine: &Engine) -> Result<()> {
    require_entity(engine)?;
    refresh(engine, Trigger::Mount).await;
    Ok(())
}

fn require_known(engine: &Engine, id: &str) -> Result<()> {
    let snapshot = engine.snapshot();
    if !snapshot.inbox().items().iter().any(|n| n.id() == id) {
        bail!("No notification with id {}", id);
    }
    Ok(())
}

pub async fn cmd_read(engine: &Engine, id: &str, opts: &FormatOptions) -> Result<()> {
    load_inbox(engine).await?;
    require_known(engine, id)?;
    let outcome = engine.mark_read(id).await?;
    report("mark_read", &outcome, opts)
}

pub async fn cmd_read_all(engine: &Engine, opts: &FormatOptions) -> Result<()> {
    load_inbox(engine).await?;
    let outcome = engine.mark_all_read().await?;
    report("mark_all_read", &outcome, opts)
}

pub async fn cmd_dismiss(engine: &Engine, id: &str, opts: &FormatOptions) -> Result<()> {
    load_inbox(engine).await?;
    require_known(engine, id)?;
    let outcome = engine.dismiss(id).await?;
    report("dismiss", &outcome, opts)
}
