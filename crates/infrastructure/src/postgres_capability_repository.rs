use std::str::FromStr;

use async_trait::async_trait;
use formyard_application::CapabilityRepository;
use formyard_core::{AppError, AppResult, ContainerId};
use formyard_domain::Capability;
use sqlx::PgPool;

/// PostgreSQL-backed capability grant repository.
#[derive(Clone)]
pub struct PostgresCapabilityRepository {
    pool: PgPool,
}

impl PostgresCapabilityRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Grants a capability to a subject in a container. Granting twice is a no-op.
    pub async fn grant(
        &self,
        container_id: ContainerId,
        subject: &str,
        capability: Capability,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO container_capability_grants (container_id, subject, capability)
            VALUES ($1, $2, $3)
            ON CONFLICT (container_id, subject, capability) DO NOTHING
            "#,
        )
        .bind(container_id.get())
        .bind(subject)
        .bind(capability.as_str())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to grant '{}' to '{subject}' in container '{container_id}': {error}",
                capability.as_str()
            ))
        })?;

        Ok(())
    }
}

#[async_trait]
impl CapabilityRepository for PostgresCapabilityRepository {
    async fn list_capabilities(
        &self,
        container_id: ContainerId,
        subject: &str,
    ) -> AppResult<Vec<Capability>> {
        let values = sqlx::query_scalar::<_, String>(
            r#"
            SELECT capability
            FROM container_capability_grants
            WHERE container_id = $1
              AND subject = $2
            ORDER BY capability
            "#,
        )
        .bind(container_id.get())
        .bind(subject)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to list capabilities of '{subject}' in container '{container_id}': {error}"
            ))
        })?;

        values
            .iter()
            .map(|value| Capability::from_str(value.as_str()))
            .collect()
    }
}
