use std::time::{Duration, Instant};

use async_trait::async_trait;
use formyard_application::{ClaimedEntryEvent, EntryEvent, EntryEventOutbox, EntryEventPublisher};
use formyard_core::{AppError, AppResult};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutboxStatus {
    Pending,
    Leased,
    Delivered,
    Dead,
}

#[derive(Debug, Clone)]
struct OutboxRecord {
    id: String,
    event: EntryEvent,
    status: OutboxStatus,
    attempts: i32,
    lease_owner: Option<String>,
    leased_until: Option<Instant>,
    last_error: Option<String>,
}

/// In-memory outbox. Acts as both the publisher used by the services and the
/// outbox drained by the relay.
#[derive(Debug, Default)]
pub struct InMemoryEntryEventOutbox {
    records: RwLock<Vec<OutboxRecord>>,
}

impl InMemoryEntryEventOutbox {
    /// Creates an empty outbox.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every published event in publication order.
    pub async fn published(&self) -> Vec<EntryEvent> {
        self.records
            .read()
            .await
            .iter()
            .map(|record| record.event.clone())
            .collect()
    }

    /// Returns the number of events parked as dead.
    pub async fn dead_count(&self) -> usize {
        self.records
            .read()
            .await
            .iter()
            .filter(|record| record.status == OutboxStatus::Dead)
            .count()
    }

    /// Returns the last delivery error recorded for an event.
    pub async fn last_error(&self, event_id: &str) -> Option<String> {
        self.records
            .read()
            .await
            .iter()
            .find(|record| record.id == event_id)
            .and_then(|record| record.last_error.clone())
    }
}

fn leased_record<'a>(
    records: &'a mut [OutboxRecord],
    worker_id: &str,
    event_id: &str,
) -> AppResult<&'a mut OutboxRecord> {
    records
        .iter_mut()
        .find(|record| {
            record.id == event_id
                && record.status == OutboxStatus::Leased
                && record.lease_owner.as_deref() == Some(worker_id)
        })
        .ok_or_else(|| {
            AppError::Conflict(format!(
                "entry event '{event_id}' is not currently leased by worker '{worker_id}'"
            ))
        })
}

#[async_trait]
impl EntryEventPublisher for InMemoryEntryEventOutbox {
    async fn publish(&self, event: EntryEvent) -> AppResult<()> {
        self.records.write().await.push(OutboxRecord {
            id: Uuid::new_v4().to_string(),
            event,
            status: OutboxStatus::Pending,
            attempts: 0,
            lease_owner: None,
            leased_until: None,
            last_error: None,
        });
        Ok(())
    }
}

#[async_trait]
impl EntryEventOutbox for InMemoryEntryEventOutbox {
    async fn claim_events(
        &self,
        worker_id: &str,
        limit: usize,
        lease_seconds: u32,
    ) -> AppResult<Vec<ClaimedEntryEvent>> {
        let now = Instant::now();
        let mut records = self.records.write().await;
        let mut claimed = Vec::new();

        for record in records.iter_mut() {
            if claimed.len() >= limit {
                break;
            }
            let claimable = match record.status {
                OutboxStatus::Pending => true,
                OutboxStatus::Leased => record.leased_until.is_some_and(|until| until < now),
                OutboxStatus::Delivered | OutboxStatus::Dead => false,
            };
            if !claimable {
                continue;
            }

            record.status = OutboxStatus::Leased;
            record.lease_owner = Some(worker_id.to_owned());
            record.leased_until = Some(now + Duration::from_secs(u64::from(lease_seconds)));
            record.attempts = record.attempts.saturating_add(1);
            claimed.push(ClaimedEntryEvent {
                event_id: record.id.clone(),
                attempt: record.attempts,
                event: record.event.clone(),
            });
        }

        Ok(claimed)
    }

    async fn mark_delivered(&self, worker_id: &str, event_id: &str) -> AppResult<()> {
        let mut records = self.records.write().await;
        let record = leased_record(&mut records, worker_id, event_id)?;
        record.status = OutboxStatus::Delivered;
        record.lease_owner = None;
        record.leased_until = None;
        record.last_error = None;
        Ok(())
    }

    async fn mark_failed(
        &self,
        worker_id: &str,
        event_id: &str,
        error_message: &str,
        dead: bool,
    ) -> AppResult<()> {
        let mut records = self.records.write().await;
        let record = leased_record(&mut records, worker_id, event_id)?;
        record.status = if dead {
            OutboxStatus::Dead
        } else {
            OutboxStatus::Pending
        };
        record.lease_owner = None;
        record.leased_until = None;
        record.last_error = Some(error_message.to_owned());
        Ok(())
    }
}
