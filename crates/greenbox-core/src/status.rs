//! Process-wide online/offline flag.
//!
//! Starts `true`, is written only by the sync scheduler, and is never
//! persisted. Readers either poll [`OnlineStatus::get`] or wait on a
//! [`watch::Receiver`].

use tokio::sync::watch;

/// Shared online flag. Clones observe the same value.
#[derive(Debug, Clone)]
pub struct OnlineStatus {
    tx: watch::Sender<bool>,
    /// Held so the channel stays open without subscribers.
    _rx: watch::Receiver<bool>,
}

impl Default for OnlineStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl OnlineStatus {
    /// A new flag, initially online.
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(true);
        Self { tx, _rx: rx }
    }

    /// Current value.
    pub fn get(&self) -> bool {
        *self.tx.borrow()
    }

    /// Subscribe to changes.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    pub(crate) fn set(&self, online: bool) {
        self.tx.send_if_modified(|current| {
            let changed = *current != online;
            *current = online;
            changed
        });
    }
}
