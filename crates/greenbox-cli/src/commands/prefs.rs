//! Notification preference commands.

use anyhow::Result;
use greenbox_core::Engine;

use crate::cli::PrefsAction;
use crate::format::{FormatOptions, format_prefs_text};

use super::notice;

pub async fn cmd_prefs(
    engine: &Engine,
    action: Option<PrefsAction>,
    opts: &FormatOptions,
) -> Result<()> {
    let prefs = match action.unwrap_or(PrefsAction::Show) {
        PrefsAction::Show => engine.preferences(),
        PrefsAction::Set { key, enabled } => {
            let mut prefs = engine.preferences();
            prefs.set(&key, enabled)?;
            engine.set_preferences(prefs.clone()).await?;
            notice(
                opts,
                &format!(
                    "{} notifications {}.",
                    key,
                    if enabled { "enabled" } else { "disabled" }
                ),
            );
            prefs
        }
    };

    if opts.is_json() {
        print!("{}", opts.as_json(&prefs)?);
    } else {
        print!("{}", format_prefs_text(&prefs, opts));
    }
    Ok(())
}
