use async_trait::async_trait;
use chrono::{DateTime, Utc};
use formyard_core::{AppResult, ContainerId};
use formyard_domain::{Entry, EntryEventKind, UserSummary, ViewRef};
use serde::{Deserialize, Serialize};

/// Change event handed to the notification subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryEvent {
    /// Event kind.
    pub kind: EntryEventKind,
    /// Container the entries belong to.
    pub container_id: ContainerId,
    /// View the action was triggered from.
    pub view: ViewRef,
    /// Affected entries.
    pub items: Vec<Entry>,
    /// Affected users, for member events.
    #[serde(default)]
    pub users: Vec<UserSummary>,
    /// Team field name, for member events.
    #[serde(default)]
    pub field_name: Option<String>,
    /// Time the event was raised.
    pub occurred_at: DateTime<Utc>,
}

/// Outbound channel for change events. Publication is fire-and-forget.
#[async_trait]
pub trait EntryEventPublisher: Send + Sync {
    /// Publishes one event.
    async fn publish(&self, event: EntryEvent) -> AppResult<()>;
}

/// Event leased from the outbox for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimedEntryEvent {
    /// Outbox row id.
    pub event_id: String,
    /// Delivery attempt number, starting at 1.
    pub attempt: i32,
    /// Event payload.
    pub event: EntryEvent,
}

/// Durable outbox the relay drains.
#[async_trait]
pub trait EntryEventOutbox: Send + Sync {
    /// Leases up to `limit` pending events for a worker.
    async fn claim_events(
        &self,
        worker_id: &str,
        limit: usize,
        lease_seconds: u32,
    ) -> AppResult<Vec<ClaimedEntryEvent>>;

    /// Marks a leased event as delivered.
    async fn mark_delivered(&self, worker_id: &str, event_id: &str) -> AppResult<()>;

    /// Releases a leased event after a failed delivery. Dead events are not
    /// claimed again.
    async fn mark_failed(
        &self,
        worker_id: &str,
        event_id: &str,
        error_message: &str,
        dead: bool,
    ) -> AppResult<()>;
}

/// Delivers one event to the external notification subsystem.
#[async_trait]
pub trait EntryEventDispatcher: Send + Sync {
    /// Delivers a claimed event.
    async fn dispatch(&self, event: &ClaimedEntryEvent) -> AppResult<()>;
}
