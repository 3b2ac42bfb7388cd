//! Telemetry sync engine for Greenbox grow boxes.
//!
//! This crate keeps a consistent, explainable view of a remote grow box
//! derived from possibly stale or absent network data.
//!
//! # Features
//!
//! - **Sync scheduler**: mount, periodic and pull-to-refresh cycles with an
//!   online/offline flag and per-stream statistics
//! - **Offline fallback**: last-known cache first, deterministic synthetic
//!   data only when nothing is cached
//! - **Range normalization**: chart percentages in `[40, 100]` with deltas
//!   and summaries
//! - **Notification pipeline**: ingestion, preference and category filters,
//!   day buckets, and an inbox with optimistic local mutation
//! - **Active-entity cache**: the persisted selection and its last-known data
//! - **Gateways**: an HTTP client (feature `http`) and an in-memory mock
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use greenbox_core::{Engine, MockGateway, SyncConfig, Trigger};
//! use greenbox_store::MemoryStore;
//! use greenbox_types::{ActiveEntity, Period, SensorKind};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = Engine::new(
//!         Arc::new(MockGateway::new()),
//!         Arc::new(MemoryStore::new()),
//!         SyncConfig::default(),
//!     )?;
//!     engine.select_entity(ActiveEntity::new("strawberry", "Strawberry")).await?;
//!
//!     if let Some(snapshot) = engine.refresh(Trigger::Mount).await.published() {
//!         let chart = &snapshot.series[&Period::Week][&SensorKind::Temperature];
//!         for point in &chart.points {
//!             println!("{} {:>5.1}%", point.label, point.percentage);
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod engine;
pub mod error;
pub mod events;
pub mod fallback;
pub mod gateway;
pub mod health;
#[cfg(feature = "http")]
pub mod http;
pub mod inbox;
pub mod mock;
pub mod normalize;
pub mod notifications;
pub mod poller;
pub mod preferences;
pub mod status;
pub mod sync;

// Core exports
pub use engine::{AckOutcome, Engine, RefreshOutcome, Snapshot};
pub use error::{Error, Result};
pub use gateway::TelemetryGateway;
pub use sync::{
    Clock, CycleData, CycleOutcome, StreamId, StreamStatus, SyncConfig, SyncScheduler, SyncState,
    Trigger, system_clock,
};

pub use cache::ActiveEntityCache;
pub use events::{EngineEvent, EventDispatcher, EventReceiver, EventSender};
pub use fallback::{DataSource, FallbackPolicy};
pub use health::{HealthReport, OverallHealth, SensorStatus};
pub use inbox::{InboxView, NotificationInbox, RemoteAck, StoredInbox};
pub use mock::{MockEntityData, MockGateway, MockGatewayBuilder};
pub use normalize::{NormalizedPoint, NormalizedSeries, SeriesSummary};
pub use notifications::{Category, DayLabel, TaggedNotification};
pub use poller::PeriodicSync;
pub use preferences::NotificationPreferences;
pub use status::OnlineStatus;

#[cfg(feature = "http")]
pub use http::{HttpGateway, HttpGatewayError};

// Re-export from greenbox-types
pub use greenbox_types::{
    AccessValidation, ActiveEntity, ActuatorStatus, Notification, NotificationKind, OptimalRange,
    Period, Priority, SensorKind, SensorReading,
};
