//! Local key-value persistence for the Greenbox sync engine.
//!
//! The engine keeps its state (active entity, last-known readings, cached
//! series, notification inbox, preferences) as JSON text under string keys.
//! This crate provides the [`KeyValueStore`] capability and two
//! implementations:
//!
//! - [`MemoryStore`]: process-local, for tests and ephemeral sessions
//! - [`SqliteStore`]: durable, with a versioned schema
//!
//! # Example
//!
//! ```
//! use greenbox_store::{KeyValueStoreExt, SqliteStore};
//!
//! let store = SqliteStore::open_in_memory()?;
//! store.set_json("greenbox.notificationPreferences", &serde_json::json!({"water": false}))?;
//! let prefs: Option<serde_json::Value> = store.get_json("greenbox.notificationPreferences")?;
//! assert!(prefs.is_some());
//! # Ok::<(), greenbox_store::Error>(())
//! ```

mod error;
mod kv;
mod schema;
mod store;

pub use error::{Error, Result};
pub use kv::{KeyValueStore, KeyValueStoreExt, MemoryStore};
pub use store::SqliteStore;

/// Default database path following platform conventions.
///
/// - Linux: `~/.local/share/greenbox/state.db`
/// - macOS: `~/Library/Application Support/greenbox/state.db`
/// - Windows: `C:\Users\<user>\AppData\Local\greenbox\state.db`
pub fn default_db_path() -> std::path::PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("greenbox")
        .join("state.db")
}
