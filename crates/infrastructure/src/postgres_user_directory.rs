use async_trait::async_trait;
use formyard_application::UserDirectory;
use formyard_core::{AppError, AppResult, UserId};
use formyard_domain::UserSummary;
use sqlx::{FromRow, PgPool};

/// PostgreSQL-backed user directory.
#[derive(Clone)]
pub struct PostgresUserDirectory {
    pool: PgPool,
}

impl PostgresUserDirectory {
    /// Creates a directory with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: i64,
    display_name: String,
    email: Option<String>,
}

#[async_trait]
impl UserDirectory for PostgresUserDirectory {
    async fn find_users(&self, user_ids: &[UserId]) -> AppResult<Vec<UserSummary>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, display_name, email
            FROM users
            WHERE id = ANY($1)
            ORDER BY id ASC
            "#,
        )
        .bind(user_ids.iter().map(|user_id| user_id.get()).collect::<Vec<_>>())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load users: {error}")))?;

        Ok(rows
            .into_iter()
            .map(|row| UserSummary {
                id: UserId::new(row.id),
                display_name: row.display_name,
                email: row.email,
            })
            .collect())
    }
}
