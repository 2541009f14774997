use std::sync::Arc;

use async_trait::async_trait;
use formyard_core::{AppError, AppResult};
use formyard_domain::{EntryEventKind, ViewRef};
use tokio::sync::Mutex;

use super::EntryEventRelayService;
use crate::entry_ports::{ClaimedEntryEvent, EntryEvent, EntryEventDispatcher, EntryEventOutbox};
use crate::test_support::{base_time, container_id};

#[derive(Default)]
struct FakeOutbox {
    pending: Mutex<Vec<ClaimedEntryEvent>>,
    delivered: Mutex<Vec<String>>,
    failed: Mutex<Vec<(String, bool)>>,
}

#[async_trait]
impl EntryEventOutbox for FakeOutbox {
    async fn claim_events(
        &self,
        _worker_id: &str,
        limit: usize,
        _lease_seconds: u32,
    ) -> AppResult<Vec<ClaimedEntryEvent>> {
        let mut pending = self.pending.lock().await;
        let count = limit.min(pending.len());
        Ok(pending.drain(..count).collect())
    }

    async fn mark_delivered(&self, _worker_id: &str, event_id: &str) -> AppResult<()> {
        self.delivered.lock().await.push(event_id.to_owned());
        Ok(())
    }

    async fn mark_failed(
        &self,
        _worker_id: &str,
        event_id: &str,
        _error_message: &str,
        dead: bool,
    ) -> AppResult<()> {
        self.failed.lock().await.push((event_id.to_owned(), dead));
        Ok(())
    }
}

/// Fails every event whose id starts with `fail`.
struct SelectiveDispatcher;

#[async_trait]
impl EntryEventDispatcher for SelectiveDispatcher {
    async fn dispatch(&self, event: &ClaimedEntryEvent) -> AppResult<()> {
        if event.event_id.starts_with("fail") {
            return Err(AppError::Internal("webhook returned 503".to_owned()));
        }
        Ok(())
    }
}

fn claimed(event_id: &str, attempt: i32) -> ClaimedEntryEvent {
    ClaimedEntryEvent {
        event_id: event_id.to_owned(),
        attempt,
        event: EntryEvent {
            kind: EntryEventKind::EntryAdded,
            container_id: container_id(),
            view: ViewRef::new(None, "Form"),
            items: Vec::new(),
            users: Vec::new(),
            field_name: None,
            occurred_at: base_time(),
        },
    }
}

#[tokio::test]
async fn batch_marks_each_event_by_dispatch_result() {
    let outbox = Arc::new(FakeOutbox::default());
    outbox.pending.lock().await.extend([
        claimed("ok-1", 1),
        claimed("fail-1", 1),
        claimed("fail-2", 3),
        claimed("ok-2", 2),
    ]);
    let service = EntryEventRelayService::new(outbox.clone(), Arc::new(SelectiveDispatcher))
        .with_max_delivery_attempts(3);

    let report = service
        .relay_batch("worker-a", 10, 30)
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(report.claimed, 4);
    assert_eq!(report.delivered, 2);
    assert_eq!(report.retried, 1);
    assert_eq!(report.dead, 1);
    assert_eq!(*outbox.delivered.lock().await, vec!["ok-1", "ok-2"]);
    assert_eq!(
        *outbox.failed.lock().await,
        vec![("fail-1".to_owned(), false), ("fail-2".to_owned(), true)]
    );
}

#[tokio::test]
async fn batch_respects_the_claim_limit() {
    let outbox = Arc::new(FakeOutbox::default());
    outbox
        .pending
        .lock()
        .await
        .extend([claimed("ok-1", 1), claimed("ok-2", 1)]);
    let service = EntryEventRelayService::new(outbox.clone(), Arc::new(SelectiveDispatcher));

    let report = service
        .relay_batch("worker-a", 1, 30)
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(report.delivered, 1);
    assert_eq!(outbox.pending.lock().await.len(), 1);
}

#[tokio::test]
async fn invalid_batch_parameters_are_rejected() {
    let service = EntryEventRelayService::new(
        Arc::new(FakeOutbox::default()),
        Arc::new(SelectiveDispatcher),
    );

    assert!(service.relay_batch(" ", 10, 30).await.is_err());
    assert!(service.relay_batch("worker-a", 0, 30).await.is_err());
    assert!(service.relay_batch("worker-a", 10, 0).await.is_err());
}
