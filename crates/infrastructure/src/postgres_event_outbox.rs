use async_trait::async_trait;
use formyard_application::{ClaimedEntryEvent, EntryEvent, EntryEventOutbox, EntryEventPublisher};
use formyard_core::{AppError, AppResult};
use sqlx::{FromRow, PgPool};
use tracing::debug;
use uuid::Uuid;

/// PostgreSQL outbox for entry events.
///
/// Publishing only stores the event; delivery happens in the relay worker,
/// which leases batches with `FOR UPDATE SKIP LOCKED` so several workers can
/// drain the same table.
#[derive(Clone)]
pub struct PostgresEntryEventOutbox {
    pool: PgPool,
}

impl PostgresEntryEventOutbox {
    /// Creates an outbox with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct ClaimedEventRow {
    id: Uuid,
    attempt_count: i32,
    payload: String,
}

#[async_trait]
impl EntryEventPublisher for PostgresEntryEventOutbox {
    async fn publish(&self, event: EntryEvent) -> AppResult<()> {
        let payload = serde_json::to_string(&event).map_err(|error| {
            AppError::Internal(format!("failed to serialize entry event: {error}"))
        })?;

        sqlx::query(
            r#"
            INSERT INTO entry_event_outbox (container_id, event_kind, payload)
            VALUES ($1, $2, $3::JSONB)
            "#,
        )
        .bind(event.container_id.get())
        .bind(event.kind.as_str())
        .bind(payload)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to store '{}' event for container '{}': {error}",
                event.kind.as_str(),
                event.container_id
            ))
        })?;

        Ok(())
    }
}

#[async_trait]
impl EntryEventOutbox for PostgresEntryEventOutbox {
    async fn claim_events(
        &self,
        worker_id: &str,
        limit: usize,
        lease_seconds: u32,
    ) -> AppResult<Vec<ClaimedEntryEvent>> {
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!(
                "failed to start entry event claim transaction: {error}"
            ))
        })?;

        let rows = sqlx::query_as::<_, ClaimedEventRow>(
            r#"
            WITH candidate_events AS (
                SELECT id
                FROM entry_event_outbox
                WHERE status = 'pending'
                   OR (status = 'leased' AND leased_until < now())
                ORDER BY created_at ASC
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            UPDATE entry_event_outbox events
            SET
                status = 'leased',
                lease_owner = $2,
                leased_until = now() + make_interval(secs => $3::INT),
                attempt_count = events.attempt_count + 1
            FROM candidate_events
            WHERE events.id = candidate_events.id
            RETURNING events.id, events.attempt_count, events.payload::TEXT AS payload
            "#,
        )
        .bind(i64::try_from(limit).map_err(|error| {
            AppError::Validation(format!("invalid entry event claim limit: {error}"))
        })?)
        .bind(worker_id)
        .bind(i32::try_from(lease_seconds).map_err(|error| {
            AppError::Validation(format!("invalid entry event lease_seconds: {error}"))
        })?)
        .fetch_all(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to claim entry events for worker '{worker_id}': {error}"
            ))
        })?;

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!(
                "failed to commit entry event claim transaction: {error}"
            ))
        })?;

        if !rows.is_empty() {
            debug!(worker_id, claimed = rows.len(), "leased entry events");
        }

        rows.into_iter().map(claimed_event_from_row).collect()
    }

    async fn mark_delivered(&self, worker_id: &str, event_id: &str) -> AppResult<()> {
        let event_uuid = parse_event_id(event_id)?;
        let result = sqlx::query(
            r#"
            UPDATE entry_event_outbox
            SET
                status = 'delivered',
                lease_owner = NULL,
                leased_until = NULL,
                last_error = NULL,
                delivered_at = now()
            WHERE id = $1
              AND lease_owner = $2
              AND status = 'leased'
            "#,
        )
        .bind(event_uuid)
        .bind(worker_id)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to mark entry event '{event_id}' delivered for worker '{worker_id}': {error}"
            ))
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::Conflict(format!(
                "entry event '{event_id}' is not currently leased by worker '{worker_id}'"
            )));
        }

        Ok(())
    }

    async fn mark_failed(
        &self,
        worker_id: &str,
        event_id: &str,
        error_message: &str,
        dead: bool,
    ) -> AppResult<()> {
        let event_uuid = parse_event_id(event_id)?;
        let result = sqlx::query(
            r#"
            UPDATE entry_event_outbox
            SET
                status = CASE WHEN $4 THEN 'dead' ELSE 'pending' END,
                lease_owner = NULL,
                leased_until = NULL,
                last_error = $3
            WHERE id = $1
              AND lease_owner = $2
              AND status = 'leased'
            "#,
        )
        .bind(event_uuid)
        .bind(worker_id)
        .bind(error_message)
        .bind(dead)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to mark entry event '{event_id}' failed for worker '{worker_id}': {error}"
            ))
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::Conflict(format!(
                "entry event '{event_id}' is not currently leased by worker '{worker_id}'"
            )));
        }

        Ok(())
    }
}

fn parse_event_id(event_id: &str) -> AppResult<Uuid> {
    Uuid::parse_str(event_id).map_err(|error| {
        AppError::Validation(format!("invalid entry event id '{event_id}': {error}"))
    })
}

fn claimed_event_from_row(row: ClaimedEventRow) -> AppResult<ClaimedEntryEvent> {
    let event: EntryEvent = serde_json::from_str(&row.payload).map_err(|error| {
        AppError::Internal(format!(
            "failed to decode entry event '{}': {error}",
            row.id
        ))
    })?;

    Ok(ClaimedEntryEvent {
        event_id: row.id.to_string(),
        attempt: row.attempt_count,
        event,
    })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use formyard_application::{EntryEvent, EntryEventOutbox, EntryEventPublisher};
    use formyard_core::ContainerId;
    use formyard_domain::{EntryEventKind, ViewRef};
    use sqlx::PgPool;
    use sqlx::migrate::Migrator;
    use sqlx::postgres::PgPoolOptions;

    use super::PostgresEntryEventOutbox;

    static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

    async fn test_pool() -> Option<PgPool> {
        let Ok(database_url) = std::env::var("DATABASE_URL") else {
            return None;
        };

        let pool = match PgPoolOptions::new()
            .max_connections(2)
            .connect(database_url.as_str())
            .await
        {
            Ok(pool) => pool,
            Err(error) => panic!("failed to connect to DATABASE_URL in test: {error}"),
        };

        if let Err(error) = MIGRATOR.run(&pool).await {
            panic!("failed to run migrations for postgres outbox tests: {error}");
        }

        Some(pool)
    }

    #[tokio::test]
    async fn failed_events_are_reclaimed_until_dead() {
        let Some(pool) = test_pool().await else {
            return;
        };

        // Isolate from events left by other tests.
        let cleared = sqlx::query("UPDATE entry_event_outbox SET status = 'delivered'")
            .execute(&pool)
            .await;
        assert!(cleared.is_ok());

        let outbox = PostgresEntryEventOutbox::new(pool);
        let event = EntryEvent {
            kind: EntryEventKind::EntryDeleted,
            container_id: ContainerId::new(77),
            view: ViewRef::new(Some(3), "list"),
            items: Vec::new(),
            users: Vec::new(),
            field_name: None,
            occurred_at: Utc::now(),
        };
        assert!(outbox.publish(event.clone()).await.is_ok());

        let claimed = outbox
            .claim_events("worker-a", 10, 30)
            .await
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].attempt, 1);
        assert_eq!(claimed[0].event, event);

        let event_id = claimed[0].event_id.clone();
        assert!(
            outbox
                .mark_failed("worker-b", &event_id, "not mine", false)
                .await
                .is_err()
        );
        assert!(
            outbox
                .mark_failed("worker-a", &event_id, "timeout", false)
                .await
                .is_ok()
        );

        let retried = outbox
            .claim_events("worker-a", 10, 30)
            .await
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(retried.len(), 1);
        assert_eq!(retried[0].attempt, 2);
        assert!(
            outbox
                .mark_failed("worker-a", &event_id, "timeout", true)
                .await
                .is_ok()
        );

        let drained = outbox.claim_events("worker-a", 10, 30).await;
        assert_eq!(drained.ok().map(|events| events.len()), Some(0));
    }
}
