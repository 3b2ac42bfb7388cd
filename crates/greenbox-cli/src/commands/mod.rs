//! Command implementations for the CLI.

mod config;
mod history;
mod notifications;
mod prefs;
mod session;
mod status;
mod sync;
mod watch;

pub use config::cmd_config;
pub use history::cmd_history;
pub use notifications::{cmd_dismiss, cmd_notifications, cmd_read, cmd_read_all};
pub use prefs::cmd_prefs;
pub use session::{cmd_login, cmd_logout, cmd_select};
pub use status::cmd_status;
pub use sync::cmd_sync;
pub use watch::cmd_watch;

use std::sync::Arc;

use anyhow::{Result, bail};
use greenbox_core::{Engine, Snapshot, Trigger};
use greenbox_types::ActiveEntity;

use crate::format::FormatOptions;

/// The selected box, or an error telling the user how to pick one.
pub(crate) fn require_entity(engine: &Engine) -> Result<ActiveEntity> {
    match engine.active_entity() {
        Some(entity) => Ok(entity),
        None => bail!(
            "No box selected. Run `greenbox login <code>` or `greenbox select <id>` first."
        ),
    }
}

/// Refresh once and return what is published afterwards.
///
/// A discarded cycle still leaves a valid snapshot behind, so the current
/// one is returned in that case.
pub(crate) async fn refresh(engine: &Engine, trigger: Trigger) -> Arc<Snapshot> {
    match engine.refresh(trigger).await.published() {
        Some(snapshot) => snapshot,
        None => engine.snapshot(),
    }
}

/// Print an informational line on stderr unless quiet.
pub(crate) fn notice(opts: &FormatOptions, message: &str) {
    if !opts.quiet {
        eprintln!("{}", message);
    }
}

/// Warn on stderr when the published data is not live.
pub(crate) fn warn_if_offline(snapshot: &Snapshot, opts: &FormatOptions) {
    if !snapshot.online {
        notice(
            opts,
            "Gateway unreachable; showing cached or placeholder data.",
        );
    }
}
