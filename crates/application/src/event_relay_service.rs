use std::sync::Arc;

use formyard_core::{AppError, AppResult};
use tracing::{info, warn};

use crate::entry_ports::{EntryEventDispatcher, EntryEventOutbox};

/// Default number of delivery attempts before an event is parked as dead.
pub const DEFAULT_MAX_DELIVERY_ATTEMPTS: i32 = 10;

/// Counts of one relay batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayBatchReport {
    /// Events claimed from the outbox.
    pub claimed: usize,
    /// Events delivered.
    pub delivered: usize,
    /// Events released for another attempt.
    pub retried: usize,
    /// Events parked after the last attempt.
    pub dead: usize,
}

/// Moves change events from the outbox to the notification subsystem.
#[derive(Clone)]
pub struct EntryEventRelayService {
    outbox: Arc<dyn EntryEventOutbox>,
    dispatcher: Arc<dyn EntryEventDispatcher>,
    max_delivery_attempts: i32,
}

impl EntryEventRelayService {
    /// Creates a relay service.
    #[must_use]
    pub fn new(outbox: Arc<dyn EntryEventOutbox>, dispatcher: Arc<dyn EntryEventDispatcher>) -> Self {
        Self {
            outbox,
            dispatcher,
            max_delivery_attempts: DEFAULT_MAX_DELIVERY_ATTEMPTS,
        }
    }

    /// Overrides the attempt limit.
    #[must_use]
    pub fn with_max_delivery_attempts(mut self, max_delivery_attempts: i32) -> Self {
        self.max_delivery_attempts = max_delivery_attempts.max(1);
        self
    }

    /// Claims one batch, dispatches every event and records the result.
    ///
    /// Dispatch failures never abort the batch; failing to update the outbox
    /// does.
    pub async fn relay_batch(
        &self,
        worker_id: &str,
        limit: usize,
        lease_seconds: u32,
    ) -> AppResult<RelayBatchReport> {
        if worker_id.trim().is_empty() {
            return Err(AppError::Validation(
                "worker_id must not be empty".to_owned(),
            ));
        }

        if limit == 0 {
            return Err(AppError::Validation(
                "limit must be greater than zero".to_owned(),
            ));
        }

        if lease_seconds == 0 {
            return Err(AppError::Validation(
                "lease_seconds must be greater than zero".to_owned(),
            ));
        }

        let claimed = self
            .outbox
            .claim_events(worker_id, limit, lease_seconds)
            .await?;
        let mut report = RelayBatchReport {
            claimed: claimed.len(),
            ..RelayBatchReport::default()
        };

        for event in claimed {
            match self.dispatcher.dispatch(&event).await {
                Ok(()) => {
                    self.outbox
                        .mark_delivered(worker_id, event.event_id.as_str())
                        .await?;
                    report.delivered += 1;
                }
                Err(error) => {
                    let dead = event.attempt >= self.max_delivery_attempts;
                    warn!(
                        event_id = %event.event_id,
                        event = event.event.kind.as_str(),
                        attempt = event.attempt,
                        dead,
                        %error,
                        "entry event delivery failed"
                    );
                    self.outbox
                        .mark_failed(
                            worker_id,
                            event.event_id.as_str(),
                            error.to_string().as_str(),
                            dead,
                        )
                        .await?;
                    if dead {
                        report.dead += 1;
                    } else {
                        report.retried += 1;
                    }
                }
            }
        }

        if report.claimed > 0 {
            info!(
                worker_id,
                claimed = report.claimed,
                delivered = report.delivered,
                retried = report.retried,
                dead = report.dead,
                "entry event batch relayed"
            );
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests;
