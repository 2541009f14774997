use async_trait::async_trait;
use chrono::{DateTime, Utc};
use formyard_application::FormRepository;
use formyard_core::{AppError, AppResult, ContainerId, FieldId};
use formyard_domain::{ContainerSettings, EntryInterval, EntryLimit, FieldDefinition, FieldKind};
use sqlx::{FromRow, PgPool};

/// PostgreSQL-backed container and field definition repository.
#[derive(Clone)]
pub struct PostgresFormRepository {
    pool: PgPool,
}

impl PostgresFormRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts or replaces container settings.
    pub async fn save_container(&self, container: &ContainerSettings) -> AppResult<()> {
        let interval = container.interval();
        sqlx::query(
            r#"
            INSERT INTO containers (
                id,
                name,
                approval_required,
                max_entries,
                interval_starts_at,
                interval_length_seconds,
                interval_count
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE
            SET
                name = EXCLUDED.name,
                approval_required = EXCLUDED.approval_required,
                max_entries = EXCLUDED.max_entries,
                interval_starts_at = EXCLUDED.interval_starts_at,
                interval_length_seconds = EXCLUDED.interval_length_seconds,
                interval_count = EXCLUDED.interval_count
            "#,
        )
        .bind(container.id().get())
        .bind(container.name().as_str())
        .bind(container.approval_required())
        .bind(container.max_entries().to_storage())
        .bind(interval.map(EntryInterval::starts_at))
        .bind(interval.map(EntryInterval::length_seconds))
        .bind(interval.map_or(0, |interval| {
            i32::try_from(interval.count()).unwrap_or(i32::MAX)
        }))
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to save container '{}': {error}",
                container.id()
            ))
        })?;

        Ok(())
    }

    /// Inserts or replaces a field definition at a display position.
    pub async fn save_field(&self, field: &FieldDefinition, position: i32) -> AppResult<()> {
        let kind = serde_json::to_string(field.kind()).map_err(|error| {
            AppError::Internal(format!(
                "failed to serialize kind of field '{}': {error}",
                field.id()
            ))
        })?;

        sqlx::query(
            r#"
            INSERT INTO fields (id, container_id, name, kind, position)
            VALUES ($1, $2, $3, $4::JSONB, $5)
            ON CONFLICT (id) DO UPDATE
            SET
                container_id = EXCLUDED.container_id,
                name = EXCLUDED.name,
                kind = EXCLUDED.kind,
                position = EXCLUDED.position
            "#,
        )
        .bind(field.id().get())
        .bind(field.container_id().get())
        .bind(field.name().as_str())
        .bind(kind)
        .bind(position)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to save field '{}': {error}", field.id()))
        })?;

        Ok(())
    }
}

#[derive(Debug, FromRow)]
struct ContainerRow {
    id: i64,
    name: String,
    approval_required: bool,
    max_entries: i32,
    interval_starts_at: Option<DateTime<Utc>>,
    interval_length_seconds: Option<i64>,
    interval_count: i32,
}

#[derive(Debug, FromRow)]
struct FieldRow {
    id: i64,
    container_id: i64,
    name: String,
    kind: String,
}

#[async_trait]
impl FormRepository for PostgresFormRepository {
    async fn find_container(
        &self,
        container_id: ContainerId,
    ) -> AppResult<Option<ContainerSettings>> {
        let row = sqlx::query_as::<_, ContainerRow>(
            r#"
            SELECT
                id,
                name,
                approval_required,
                max_entries,
                interval_starts_at,
                interval_length_seconds,
                interval_count
            FROM containers
            WHERE id = $1
            "#,
        )
        .bind(container_id.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to load container '{container_id}': {error}"
            ))
        })?;

        row.map(container_from_row).transpose()
    }

    async fn list_fields(&self, container_id: ContainerId) -> AppResult<Vec<FieldDefinition>> {
        let rows = sqlx::query_as::<_, FieldRow>(
            r#"
            SELECT id, container_id, name, kind::TEXT AS kind
            FROM fields
            WHERE container_id = $1
            ORDER BY position ASC, id ASC
            "#,
        )
        .bind(container_id.get())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to list fields of container '{container_id}': {error}"
            ))
        })?;

        rows.into_iter().map(field_from_row).collect()
    }
}

fn container_from_row(row: ContainerRow) -> AppResult<ContainerSettings> {
    let interval = match (row.interval_starts_at, row.interval_length_seconds) {
        (Some(starts_at), Some(length_seconds)) => Some(EntryInterval::new(
            starts_at,
            length_seconds,
            u32::try_from(row.interval_count).unwrap_or_default(),
        )?),
        _ => None,
    };

    ContainerSettings::new(
        ContainerId::new(row.id),
        row.name,
        row.approval_required,
        EntryLimit::from_storage(row.max_entries),
        interval,
    )
}

fn field_from_row(row: FieldRow) -> AppResult<FieldDefinition> {
    let kind: FieldKind = serde_json::from_str(&row.kind).map_err(|error| {
        AppError::Internal(format!(
            "failed to decode kind of field '{}': {error}",
            row.id
        ))
    })?;

    FieldDefinition::new(
        FieldId::new(row.id),
        ContainerId::new(row.container_id),
        row.name,
        kind,
    )
}

#[cfg(test)]
mod tests {
    use formyard_application::FormRepository;
    use formyard_core::{ContainerId, FieldId};
    use formyard_domain::{
        ContainerSettings, EntryLimit, FieldDefinition, FieldKind, TeamCorrelation,
        TeamSelectorConfig,
    };
    use sqlx::PgPool;
    use sqlx::migrate::Migrator;
    use sqlx::postgres::PgPoolOptions;

    use super::PostgresFormRepository;

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
            panic!("failed to run migrations for postgres form tests: {error}");
        }

        Some(pool)
    }

    #[tokio::test]
    async fn fields_roundtrip_their_kind_configuration() {
        let Some(pool) = test_pool().await else {
            return;
        };

        let repository = PostgresFormRepository::new(pool);
        let container_id = ContainerId::new(910_001);
        let container =
            ContainerSettings::new(container_id, "Projects", true, EntryLimit::AtMost(2), None)
                .unwrap_or_else(|_| unreachable!());
        assert!(repository.save_container(&container).await.is_ok());

        let team = FieldDefinition::new(
            FieldId::new(910_002),
            container_id,
            "Team",
            FieldKind::TeamMemberSelect(TeamSelectorConfig {
                correlation: TeamCorrelation::Field(FieldId::new(910_003)),
                notify_members: true,
            }),
        )
        .unwrap_or_else(|_| unreachable!());
        let title = FieldDefinition::new(FieldId::new(910_003), container_id, "Title", FieldKind::Text)
            .unwrap_or_else(|_| unreachable!());
        assert!(repository.save_field(&team, 2).await.is_ok());
        assert!(repository.save_field(&title, 1).await.is_ok());

        let loaded = repository.find_container(container_id).await;
        assert_eq!(loaded.ok().flatten(), Some(container));

        let fields = repository.list_fields(container_id).await;
        assert_eq!(fields.ok(), Some(vec![title, team]));
    }
}
