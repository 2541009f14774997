use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use formyard_core::{AppResult, CallerContext, ContainerId};
use formyard_domain::{Capability, Entry};

/// Boolean capability checks consulted by queries and actions.
#[async_trait]
pub trait AuthorizationOracle: Send + Sync {
    /// Whether the caller may see entries of every owner.
    async fn can_view_all(&self, caller: &CallerContext, container_id: ContainerId)
    -> AppResult<bool>;

    /// Whether the caller may manage an entry, or add one when `entry` is `None`.
    async fn can_manage(
        &self,
        caller: &CallerContext,
        container_id: ContainerId,
        entry: Option<&Entry>,
    ) -> AppResult<bool>;

    /// Whether the caller manages every entry of the container.
    async fn can_manage_all(
        &self,
        caller: &CallerContext,
        container_id: ContainerId,
    ) -> AppResult<bool>;

    /// Whether the caller may approve entries.
    async fn can_approve(&self, caller: &CallerContext, container_id: ContainerId)
    -> AppResult<bool>;

    /// Whether the caller may see drafts of other owners.
    async fn can_view_drafts(
        &self,
        caller: &CallerContext,
        container_id: ContainerId,
    ) -> AppResult<bool>;

    /// Whether the caller may see anonymous entries.
    async fn can_view_anonymous(
        &self,
        caller: &CallerContext,
        container_id: ContainerId,
    ) -> AppResult<bool>;
}

/// Repository port for capability grants.
#[async_trait]
pub trait CapabilityRepository: Send + Sync {
    /// Lists capabilities granted to a subject in a container.
    async fn list_capabilities(
        &self,
        container_id: ContainerId,
        subject: &str,
    ) -> AppResult<Vec<Capability>>;
}

/// Authorization oracle backed by stored capability grants.
#[derive(Clone)]
pub struct CapabilityAuthorizationOracle {
    repository: Arc<dyn CapabilityRepository>,
}

impl CapabilityAuthorizationOracle {
    /// Creates a new oracle from a repository implementation.
    #[must_use]
    pub fn new(repository: Arc<dyn CapabilityRepository>) -> Self {
        Self { repository }
    }

    async fn capabilities(
        &self,
        caller: &CallerContext,
        container_id: ContainerId,
    ) -> AppResult<HashSet<Capability>> {
        Ok(self
            .repository
            .list_capabilities(container_id, caller.subject().as_str())
            .await?
            .into_iter()
            .collect())
    }

    async fn has(
        &self,
        caller: &CallerContext,
        container_id: ContainerId,
        capability: Capability,
    ) -> AppResult<bool> {
        Ok(self
            .capabilities(caller, container_id)
            .await?
            .contains(&capability))
    }
}

#[async_trait]
impl AuthorizationOracle for CapabilityAuthorizationOracle {
    async fn can_view_all(
        &self,
        caller: &CallerContext,
        container_id: ContainerId,
    ) -> AppResult<bool> {
        let capabilities = self.capabilities(caller, container_id).await?;
        Ok(capabilities.contains(&Capability::ViewAllEntries)
            || capabilities.contains(&Capability::ManageEntries))
    }

    async fn can_manage(
        &self,
        caller: &CallerContext,
        container_id: ContainerId,
        entry: Option<&Entry>,
    ) -> AppResult<bool> {
        let capabilities = self.capabilities(caller, container_id).await?;
        if capabilities.contains(&Capability::ManageEntries) {
            return Ok(true);
        }

        if !capabilities.contains(&Capability::WriteEntry) {
            return Ok(false);
        }

        Ok(match entry {
            None => true,
            Some(entry) => {
                entry.container_id == container_id && entry.is_owned_by(caller.user_id())
            }
        })
    }

    async fn can_manage_all(
        &self,
        caller: &CallerContext,
        container_id: ContainerId,
    ) -> AppResult<bool> {
        self.has(caller, container_id, Capability::ManageEntries)
            .await
    }

    async fn can_approve(
        &self,
        caller: &CallerContext,
        container_id: ContainerId,
    ) -> AppResult<bool> {
        self.has(caller, container_id, Capability::ApproveEntries)
            .await
    }

    async fn can_view_drafts(
        &self,
        caller: &CallerContext,
        container_id: ContainerId,
    ) -> AppResult<bool> {
        self.has(caller, container_id, Capability::ViewDrafts).await
    }

    async fn can_view_anonymous(
        &self,
        caller: &CallerContext,
        container_id: ContainerId,
    ) -> AppResult<bool> {
        self.has(caller, container_id, Capability::ViewAnonymousEntries)
            .await
    }
}
