//! The notification inbox with optimistic local mutation.
//!
//! Every mutation is a two-phase write. The local commit (`commit_*`) is
//! unconditional and returns the [`RemoteAck`] describing what the gateway
//! should be told; sending that acknowledgement is a separate operation
//! whose failure never rolls the local state back.
//!
//! An inbox built from synthetic placeholder data never produces an
//! acknowledgement: its ids mean nothing to the gateway. Its local state is
//! kept only until the first successful remote fetch replaces it.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::debug;

use greenbox_types::Notification;

use crate::error::Result;
use crate::fallback::DataSource;
use crate::gateway::TelemetryGateway;
use crate::notifications::{
    self, Category, TaggedNotification, apply_category_filter, apply_preferences, bucket_by_date,
};
use crate::preferences::NotificationPreferences;

/// A pending remote acknowledgement of a local inbox change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RemoteAck {
    MarkRead { notification_id: String },
    MarkAllRead { entity_id: String },
    Delete { notification_id: String },
}

impl RemoteAck {
    /// Send this acknowledgement through `gateway`.
    pub async fn send(&self, gateway: &dyn TelemetryGateway) -> Result<()> {
        match self {
            RemoteAck::MarkRead { notification_id } => gateway.mark_read(notification_id).await,
            RemoteAck::MarkAllRead { entity_id } => gateway.mark_all_read(entity_id).await,
            RemoteAck::Delete { notification_id } => {
                gateway.delete_notification(notification_id).await
            }
        }
    }

    /// Short name for logs.
    pub fn operation(&self) -> &'static str {
        match self {
            RemoteAck::MarkRead { .. } => "mark_read",
            RemoteAck::MarkAllRead { .. } => "mark_all_read",
            RemoteAck::Delete { .. } => "delete_notification",
        }
    }
}

/// Persisted form of an inbox.
///
/// `dismissed` remembers locally deleted ids so a later remote fetch that
/// still lists them does not resurrect them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredInbox {
    pub items: Vec<Notification>,
    #[serde(default)]
    pub dismissed: BTreeSet<String>,
    #[serde(default)]
    pub synthetic: bool,
}

/// Filtered, bucketed inbox as presented to the user.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InboxView {
    pub today: Vec<TaggedNotification>,
    pub older: Vec<TaggedNotification>,
    /// Unread count over the whole inbox, before any filtering.
    pub unread_count: usize,
}

/// The notifications of one entity.
#[derive(Debug, Clone, Default)]
pub struct NotificationInbox {
    entity_id: Option<String>,
    items: Vec<TaggedNotification>,
    dismissed: BTreeSet<String>,
    synthetic: bool,
}

impl NotificationInbox {
    /// Build an inbox from already-tagged gateway notifications.
    pub fn new(entity_id: Option<String>, items: Vec<TaggedNotification>) -> Self {
        Self {
            entity_id,
            items,
            dismissed: BTreeSet::new(),
            synthetic: false,
        }
    }

    /// Build an inbox of placeholder notifications.
    pub fn synthetic(entity_id: Option<String>, items: Vec<TaggedNotification>) -> Self {
        Self {
            synthetic: true,
            ..Self::new(entity_id, items)
        }
    }

    /// Restore a persisted inbox, re-deriving display fields against `now`.
    pub fn from_stored(
        entity_id: Option<String>,
        stored: StoredInbox,
        now: OffsetDateTime,
    ) -> Self {
        Self {
            entity_id,
            items: notifications::tag_all(stored.items, now),
            dismissed: stored.dismissed,
            synthetic: stored.synthetic,
        }
    }

    /// Merge a fresh remote list into the local state of `previous`.
    ///
    /// Local state wins: notifications read locally stay read, and locally
    /// dismissed ones stay gone. A synthetic `previous` is dropped, since
    /// its ids do not name gateway notifications.
    pub fn reconcile(
        entity_id: Option<String>,
        remote: Vec<TaggedNotification>,
        previous: Option<StoredInbox>,
    ) -> Self {
        let previous = match previous {
            Some(stored) if stored.synthetic => {
                debug!("Dropping local state of the placeholder inbox");
                StoredInbox::default()
            }
            other => other.unwrap_or_default(),
        };
        let read_locally: BTreeSet<&str> = previous
            .items
            .iter()
            .filter(|n| n.read)
            .map(|n| n.id.as_str())
            .collect();

        let items = remote
            .into_iter()
            .filter(|n| !previous.dismissed.contains(n.id()))
            .map(|mut n| {
                if read_locally.contains(n.id()) {
                    n.notification.read = true;
                }
                n
            })
            .collect();

        Self {
            entity_id,
            items,
            dismissed: previous.dismissed,
            synthetic: false,
        }
    }

    pub fn entity_id(&self) -> Option<&str> {
        self.entity_id.as_deref()
    }

    /// Where the notifications came from.
    pub fn source(&self) -> DataSource {
        if self.synthetic {
            DataSource::Synthetic
        } else {
            DataSource::Remote
        }
    }

    /// Whether this inbox holds placeholder notifications.
    pub fn is_synthetic(&self) -> bool {
        self.synthetic
    }

    /// Notifications, newest first.
    pub fn items(&self) -> &[TaggedNotification] {
        &self.items
    }

    pub fn unread_count(&self) -> usize {
        notifications::unread_count(&self.items)
    }

    /// Persisted form.
    pub fn to_stored(&self) -> StoredInbox {
        StoredInbox {
            items: self.items.iter().map(|n| n.notification.clone()).collect(),
            dismissed: self.dismissed.clone(),
            synthetic: self.synthetic,
        }
    }

    /// Re-derive display fields against `now`.
    pub fn retag(&mut self, now: OffsetDateTime) {
        for item in &mut self.items {
            *item = TaggedNotification::tag(item.notification.clone(), now);
        }
    }

    /// Mark one notification read.
    ///
    /// Returns the acknowledgement to send, or `None` when the id is unknown
    /// or already read.
    pub fn commit_mark_read(&mut self, notification_id: &str) -> Option<RemoteAck> {
        let item = self.items.iter_mut().find(|n| n.id() == notification_id)?;
        if item.notification.read {
            return None;
        }
        item.notification.read = true;
        debug!("Marked notification {} read locally", notification_id);
        Some(RemoteAck::MarkRead {
            notification_id: notification_id.to_string(),
        })
    }

    /// Mark every notification read.
    ///
    /// Returns `None` when nothing is unread or the inbox belongs to no
    /// entity.
    pub fn commit_mark_all_read(&mut self) -> Option<RemoteAck> {
        if self.unread_count() == 0 {
            return None;
        }
        for item in &mut self.items {
            item.notification.read = true;
        }
        self.entity_id.clone().map(|entity_id| RemoteAck::MarkAllRead { entity_id })
    }

    /// Remove one notification.
    ///
    /// Returns `None` when the id is unknown.
    pub fn commit_dismiss(&mut self, notification_id: &str) -> Option<RemoteAck> {
        let pos = self.items.iter().position(|n| n.id() == notification_id)?;
        self.items.remove(pos);
        self.dismissed.insert(notification_id.to_string());
        debug!("Dismissed notification {} locally", notification_id);
        Some(RemoteAck::Delete {
            notification_id: notification_id.to_string(),
        })
    }

    /// Apply preferences and category, then bucket by day.
    pub fn view(
        &self,
        prefs: &NotificationPreferences,
        category: Category,
        now: OffsetDateTime,
    ) -> InboxView {
        let visible = apply_category_filter(&apply_preferences(&self.items, prefs), category);
        let buckets = bucket_by_date(&visible, now);
        InboxView {
            today: buckets.today,
            older: buckets.older,
            unread_count: self.unread_count(),
        }
    }
}
