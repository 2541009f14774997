//! Redis-backed store for actions awaiting confirmation.

use async_trait::async_trait;
use formyard_application::{PendingAction, PendingActionStore};
use formyard_core::{AppError, AppResult};
use redis::AsyncCommands;
use uuid::Uuid;

/// Redis implementation of the pending action store port.
///
/// Entries expire with the TTL given on save; `take` uses `GETDEL` so a token
/// can only be redeemed once, even across processes.
#[derive(Clone)]
pub struct RedisPendingActionStore {
    client: redis::Client,
    key_prefix: String,
}

impl RedisPendingActionStore {
    /// Creates a store with a configured Redis client and key prefix.
    #[must_use]
    pub fn new(client: redis::Client, key_prefix: impl Into<String>) -> Self {
        Self {
            client,
            key_prefix: key_prefix.into(),
        }
    }

    fn key_for(&self, token: Uuid) -> String {
        format!("{}:pending_action:{token}", self.key_prefix)
    }

    async fn connection(&self) -> AppResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| AppError::Internal(format!("failed to connect to redis: {error}")))
    }
}

#[async_trait]
impl PendingActionStore for RedisPendingActionStore {
    async fn save(&self, action: PendingAction, ttl_seconds: u32) -> AppResult<()> {
        let key = self.key_for(action.token);
        let value = serde_json::to_string(&action).map_err(|error| {
            AppError::Internal(format!(
                "failed to serialize pending action '{}': {error}",
                action.token
            ))
        })?;
        let mut connection = self.connection().await?;

        connection
            .set_ex(key, value, u64::from(ttl_seconds.max(1)))
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to store pending action '{}': {error}",
                    action.token
                ))
            })
    }

    async fn take(&self, token: Uuid) -> AppResult<Option<PendingAction>> {
        let key = self.key_for(token);
        let mut connection = self.connection().await?;

        let encoded: Option<String> = connection.get_del(key).await.map_err(|error| {
            AppError::Internal(format!("failed to read pending action '{token}': {error}"))
        })?;

        encoded
            .as_deref()
            .map(|value| {
                serde_json::from_str::<PendingAction>(value).map_err(|error| {
                    AppError::Internal(format!(
                        "invalid pending action cache value for '{token}': {error}"
                    ))
                })
            })
            .transpose()
    }
}
