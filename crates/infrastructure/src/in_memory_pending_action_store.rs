use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use formyard_application::{PendingAction, PendingActionStore};
use formyard_core::AppResult;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct PendingEntry {
    action: PendingAction,
    expires_at: Instant,
}

/// In-memory store for actions awaiting confirmation.
#[derive(Debug, Default)]
pub struct InMemoryPendingActionStore {
    entries: RwLock<HashMap<Uuid, PendingEntry>>,
}

impl InMemoryPendingActionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PendingActionStore for InMemoryPendingActionStore {
    async fn save(&self, action: PendingAction, ttl_seconds: u32) -> AppResult<()> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| entry.expires_at > now);
        entries.insert(
            action.token,
            PendingEntry {
                action,
                expires_at: now + Duration::from_secs(u64::from(ttl_seconds.max(1))),
            },
        );
        Ok(())
    }

    async fn take(&self, token: Uuid) -> AppResult<Option<PendingAction>> {
        Ok(self
            .entries
            .write()
            .await
            .remove(&token)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.action))
    }
}
