use async_trait::async_trait;
use chrono::{DateTime, Utc};
use formyard_application::{EntryOrdering, EntryPredicate, EntryRepository, EntryWindow};
use formyard_core::{AppError, AppResult, ContainerId, EntryId, FieldId, GroupId, UserId};
use formyard_domain::{ContentRow, ContentSlots, Entry, EntryStatus, NewEntry};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};

mod content;
mod sql;

/// PostgreSQL-backed entry repository.
#[derive(Clone)]
pub struct PostgresEntryRepository {
    pool: PgPool,
}

impl PostgresEntryRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct EntryRow {
    id: i64,
    container_id: i64,
    owner_id: i64,
    group_id: Option<i64>,
    approved: bool,
    status: i16,
    time_created: DateTime<Utc>,
    time_modified: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct ContentRowRecord {
    id: i64,
    entry_id: i64,
    field_id: i64,
    content0: Option<String>,
    content1: Option<String>,
    content2: Option<String>,
    content3: Option<String>,
    content4: Option<String>,
}

const ENTRY_COLUMNS: &str = "e.id, e.container_id, e.owner_id, e.group_id, e.approved, e.status, \
     e.time_created, e.time_modified";

#[async_trait]
impl EntryRepository for PostgresEntryRepository {
    async fn count_entries(&self, predicate: &EntryPredicate) -> AppResult<u64> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM entries e");
        sql::push_predicate(&mut builder, predicate)?;

        let count = builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to count entries of container '{}': {error}",
                    predicate.container_id
                ))
            })?;

        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn list_entry_ids(
        &self,
        predicate: &EntryPredicate,
        ordering: &EntryOrdering,
    ) -> AppResult<Vec<EntryId>> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT e.id FROM entries e");
        sql::push_predicate(&mut builder, predicate)?;
        sql::push_ordering(&mut builder, ordering)?;

        let ids = builder
            .build_query_scalar::<i64>()
            .fetch_all(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to list entry ids of container '{}': {error}",
                    predicate.container_id
                ))
            })?;

        Ok(ids.into_iter().map(EntryId::new).collect())
    }

    async fn fetch_entries(
        &self,
        predicate: &EntryPredicate,
        ordering: &EntryOrdering,
        window: EntryWindow,
    ) -> AppResult<Vec<Entry>> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT ");
        builder.push(ENTRY_COLUMNS);
        builder.push(" FROM entries e");
        sql::push_predicate(&mut builder, predicate)?;
        sql::push_ordering(&mut builder, ordering)?;
        if let Some(limit) = window.limit {
            builder.push(" LIMIT ");
            builder.push_bind(to_i64(limit, "limit")?);
        }
        if window.offset > 0 {
            builder.push(" OFFSET ");
            builder.push_bind(to_i64(window.offset, "offset")?);
        }

        let rows = builder
            .build_query_as::<EntryRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to fetch entries of container '{}': {error}",
                    predicate.container_id
                ))
            })?;

        rows.into_iter().map(entry_from_row).collect()
    }

    async fn entry_ordinal(
        &self,
        predicate: &EntryPredicate,
        ordering: &EntryOrdering,
        entry_id: EntryId,
    ) -> AppResult<Option<u64>> {
        let mut builder = QueryBuilder::<Postgres>::new(
            "SELECT ranked.ordinal FROM (SELECT e.id, ROW_NUMBER() OVER (",
        );
        sql::push_ordering(&mut builder, ordering)?;
        builder.push(") AS ordinal FROM entries e");
        sql::push_predicate(&mut builder, predicate)?;
        builder.push(") ranked WHERE ranked.id = ");
        builder.push_bind(entry_id.get());

        let ordinal = builder
            .build_query_scalar::<i64>()
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to locate entry '{entry_id}' in container '{}': {error}",
                    predicate.container_id
                ))
            })?;

        Ok(ordinal.and_then(|ordinal| u64::try_from(ordinal).ok()))
    }

    async fn find_entries(
        &self,
        container_id: ContainerId,
        entry_ids: &[EntryId],
    ) -> AppResult<Vec<Entry>> {
        if entry_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, EntryRow>(
            r#"
            SELECT id, container_id, owner_id, group_id, approved, status, time_created, time_modified
            FROM entries
            WHERE container_id = $1
              AND id = ANY($2)
            ORDER BY id ASC
            "#,
        )
        .bind(container_id.get())
        .bind(raw_entry_ids(entry_ids))
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to load entries of container '{container_id}': {error}"
            ))
        })?;

        rows.into_iter().map(entry_from_row).collect()
    }

    async fn find_entry(
        &self,
        container_id: ContainerId,
        entry_id: EntryId,
    ) -> AppResult<Option<Entry>> {
        Ok(self
            .find_entries(container_id, &[entry_id])
            .await?
            .into_iter()
            .next())
    }

    async fn insert_entry(&self, entry: NewEntry) -> AppResult<Entry> {
        let row = sqlx::query_as::<_, EntryRow>(
            r#"
            INSERT INTO entries (
                container_id,
                owner_id,
                group_id,
                approved,
                status,
                time_created,
                time_modified
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, container_id, owner_id, group_id, approved, status, time_created, time_modified
            "#,
        )
        .bind(entry.container_id.get())
        .bind(entry.owner_id.get())
        .bind(entry.group_id.map(GroupId::get))
        .bind(entry.approved)
        .bind(entry.status.code())
        .bind(entry.time_created)
        .bind(entry.time_modified)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to insert entry into container '{}': {error}",
                entry.container_id
            ))
        })?;

        entry_from_row(row)
    }

    async fn update_entry(&self, entry: &Entry) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE entries
            SET
                owner_id = $3,
                group_id = $4,
                approved = $5,
                status = $6,
                time_created = $7,
                time_modified = $8
            WHERE container_id = $1
              AND id = $2
            "#,
        )
        .bind(entry.container_id.get())
        .bind(entry.id.get())
        .bind(entry.owner_id.get())
        .bind(entry.group_id.map(GroupId::get))
        .bind(entry.approved)
        .bind(entry.status.code())
        .bind(entry.time_created)
        .bind(entry.time_modified)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to update entry '{}': {error}", entry.id))
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "entry '{}' does not exist in container '{}'",
                entry.id, entry.container_id
            )));
        }

        Ok(())
    }

    async fn set_entries_approved(
        &self,
        container_id: ContainerId,
        entry_ids: &[EntryId],
        approved: bool,
        modified_at: DateTime<Utc>,
    ) -> AppResult<Vec<EntryId>> {
        if entry_ids.is_empty() {
            return Ok(Vec::new());
        }

        let updated = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE entries
            SET approved = $3, time_modified = $4
            WHERE container_id = $1
              AND id = ANY($2)
            RETURNING id
            "#,
        )
        .bind(container_id.get())
        .bind(raw_entry_ids(entry_ids))
        .bind(approved)
        .bind(modified_at)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to set approval of entries in container '{container_id}': {error}"
            ))
        })?;

        let mut updated: Vec<EntryId> = updated.into_iter().map(EntryId::new).collect();
        updated.sort();
        Ok(updated)
    }

    async fn delete_entry(&self, container_id: ContainerId, entry_id: EntryId) -> AppResult<()> {
        sqlx::query("DELETE FROM entries WHERE container_id = $1 AND id = $2")
            .bind(container_id.get())
            .bind(entry_id.get())
            .execute(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to delete entry '{entry_id}': {error}"))
            })?;

        Ok(())
    }

    async fn count_owned_entries(
        &self,
        container_id: ContainerId,
        owner_id: UserId,
        since: Option<DateTime<Utc>>,
    ) -> AppResult<u64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM entries
            WHERE container_id = $1
              AND owner_id = $2
              AND ($3::TIMESTAMPTZ IS NULL OR time_created >= $3)
            "#,
        )
        .bind(container_id.get())
        .bind(owner_id.get())
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to count entries of user '{owner_id}' in container '{container_id}': {error}"
            ))
        })?;

        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn find_correlated_entry(
        &self,
        container_id: ContainerId,
        owner_id: UserId,
        field_id: FieldId,
        value: &str,
    ) -> AppResult<Option<Entry>> {
        let row = sqlx::query_as::<_, EntryRow>(
            r#"
            SELECT e.id, e.container_id, e.owner_id, e.group_id, e.approved, e.status,
                   e.time_created, e.time_modified
            FROM entries e
            INNER JOIN entry_content c
                ON c.entry_id = e.id
               AND c.field_id = $3
            WHERE e.container_id = $1
              AND e.owner_id = $2
              AND lower(c.content0) = lower($4)
            ORDER BY e.id ASC
            LIMIT 1
            "#,
        )
        .bind(container_id.get())
        .bind(owner_id.get())
        .bind(field_id.get())
        .bind(value)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to find correlated entry of user '{owner_id}': {error}"
            ))
        })?;

        row.map(entry_from_row).transpose()
    }

    async fn list_content(
        &self,
        entry_ids: &[EntryId],
        field_ids: Option<&[FieldId]>,
    ) -> AppResult<Vec<ContentRow>> {
        self.list_content_impl(entry_ids, field_ids).await
    }

    async fn upsert_content(
        &self,
        entry_id: EntryId,
        field_id: FieldId,
        slots: ContentSlots,
    ) -> AppResult<ContentRow> {
        self.upsert_content_impl(entry_id, field_id, slots).await
    }

    async fn delete_content(&self, entry_id: EntryId, field_id: FieldId) -> AppResult<()> {
        self.delete_content_impl(entry_id, field_id).await
    }
}

fn entry_from_row(row: EntryRow) -> AppResult<Entry> {
    Ok(Entry {
        id: EntryId::new(row.id),
        container_id: ContainerId::new(row.container_id),
        owner_id: UserId::new(row.owner_id),
        group_id: row.group_id.map(GroupId::new),
        approved: row.approved,
        status: EntryStatus::from_code(row.status)?,
        time_created: row.time_created,
        time_modified: row.time_modified,
    })
}

fn raw_entry_ids(entry_ids: &[EntryId]) -> Vec<i64> {
    entry_ids.iter().map(|entry_id| entry_id.get()).collect()
}

fn to_i64(value: u64, name: &str) -> AppResult<i64> {
    i64::try_from(value)
        .map_err(|error| AppError::Validation(format!("invalid entry window {name}: {error}")))
}

#[cfg(test)]
mod tests;
