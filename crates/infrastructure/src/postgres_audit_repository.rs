use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tracing::debug;

use formyard_application::{AuditEvent, AuditRepository};
use formyard_core::{AppError, AppResult, ContainerId, EntryId};

/// PostgreSQL-backed append-only log of entry actions.
#[derive(Clone)]
pub struct PostgresAuditRepository {
    pool: PgPool,
}

/// One logged action that touched an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryAuditRecord {
    /// Acting subject.
    pub subject: String,
    /// Stored action name.
    pub action: String,
    /// Every entry the action processed.
    pub entry_ids: Vec<EntryId>,
    /// Name of the view the action was issued from.
    pub view_name: String,
    /// Time the action was logged.
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct AuditRow {
    subject: String,
    action: String,
    entry_ids: Vec<i64>,
    view_name: String,
    recorded_at: DateTime<Utc>,
}

impl From<AuditRow> for EntryAuditRecord {
    fn from(row: AuditRow) -> Self {
        Self {
            subject: row.subject,
            action: row.action,
            entry_ids: row.entry_ids.into_iter().map(EntryId::new).collect(),
            view_name: row.view_name,
            recorded_at: row.recorded_at,
        }
    }
}

impl PostgresAuditRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns the latest actions that processed one entry, newest first.
    pub async fn entry_history(
        &self,
        container_id: ContainerId,
        entry_id: EntryId,
        limit: i64,
    ) -> AppResult<Vec<EntryAuditRecord>> {
        let rows = sqlx::query_as::<_, AuditRow>(
            r#"
            SELECT subject, action, entry_ids, view_name, recorded_at
            FROM entry_audit_log
            WHERE container_id = $1
              AND entry_ids @> ARRAY[$2]::BIGINT[]
            ORDER BY id DESC
            LIMIT $3
            "#,
        )
        .bind(container_id.get())
        .bind(entry_id.get())
        .bind(limit.max(1))
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to load audit history of entry '{entry_id}': {error}"
            ))
        })?;

        Ok(rows.into_iter().map(EntryAuditRecord::from).collect())
    }
}

#[async_trait]
impl AuditRepository for PostgresAuditRepository {
    async fn append_event(&self, event: AuditEvent) -> AppResult<()> {
        let entry_ids: Vec<i64> = event.entry_ids.iter().map(|entry_id| entry_id.get()).collect();

        sqlx::query(
            r#"
            INSERT INTO entry_audit_log (container_id, subject, action, entry_ids, view_id, view_name)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(event.container_id.get())
        .bind(event.subject.as_str())
        .bind(event.action.as_str())
        .bind(&entry_ids)
        .bind(event.view.view_id)
        .bind(event.view.name.as_str())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to log {} of {} entries in container '{}': {error}",
                event.action.as_str(),
                entry_ids.len(),
                event.container_id
            ))
        })?;

        debug!(
            container_id = %event.container_id,
            action = event.action.as_str(),
            entries = entry_ids.len(),
            "entry action logged"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use formyard_application::{AuditEvent, AuditRepository};
    use formyard_core::{ContainerId, EntryId};
    use formyard_domain::{AuditAction, ViewRef};
    use sqlx::PgPool;
    use sqlx::migrate::Migrator;
    use sqlx::postgres::PgPoolOptions;

    use super::PostgresAuditRepository;

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
            panic!("failed to run migrations for postgres audit tests: {error}");
        }

        Some(pool)
    }

    fn event(container_id: ContainerId, action: AuditAction, entry_ids: &[i64]) -> AuditEvent {
        AuditEvent {
            container_id,
            subject: "user:4".to_owned(),
            action,
            entry_ids: entry_ids.iter().copied().map(EntryId::new).collect(),
            view: ViewRef::new(Some(7), "Table"),
        }
    }

    #[tokio::test]
    async fn history_lists_every_action_that_touched_an_entry() {
        let Some(pool) = test_pool().await else {
            return;
        };

        let repository = PostgresAuditRepository::new(pool.clone());
        let container_id = ContainerId::new(930_001);
        sqlx::query("DELETE FROM entry_audit_log WHERE container_id = $1")
            .bind(container_id.get())
            .execute(&pool)
            .await
            .unwrap_or_else(|_| unreachable!());

        for (action, entry_ids) in [
            (AuditAction::EntriesUpdated, vec![930_010, 930_011]),
            (AuditAction::EntriesApproved, vec![930_011, 930_012]),
            (AuditAction::EntriesDeleted, vec![930_012]),
        ] {
            assert!(
                repository
                    .append_event(event(container_id, action, &entry_ids))
                    .await
                    .is_ok()
            );
        }

        let history = repository
            .entry_history(container_id, EntryId::new(930_011), 10)
            .await
            .unwrap_or_else(|_| unreachable!());
        let actions: Vec<&str> = history.iter().map(|record| record.action.as_str()).collect();
        assert_eq!(actions, vec!["entry.approved", "entry.updated"]);
        assert_eq!(
            history[0].entry_ids,
            vec![EntryId::new(930_011), EntryId::new(930_012)]
        );
        assert_eq!(history[0].view_name, "Table");

        let untouched = repository
            .entry_history(container_id, EntryId::new(930_099), 10)
            .await
            .unwrap_or_else(|_| unreachable!());
        assert!(untouched.is_empty());
    }
}
