use std::collections::HashMap;

use async_trait::async_trait;
use formyard_application::{CapabilityRepository, FormRepository, UserDirectory};
use formyard_core::{AppResult, ContainerId, UserId};
use formyard_domain::{Capability, ContainerSettings, FieldDefinition, UserSummary};
use tokio::sync::RwLock;

/// In-memory container and field definition repository.
#[derive(Debug, Default)]
pub struct InMemoryFormRepository {
    containers: RwLock<HashMap<ContainerId, ContainerSettings>>,
    fields: RwLock<HashMap<ContainerId, Vec<FieldDefinition>>>,
}

impl InMemoryFormRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces container settings.
    pub async fn save_container(&self, container: ContainerSettings) {
        self.containers
            .write()
            .await
            .insert(container.id(), container);
    }

    /// Appends a field definition, replacing an earlier one with the same id.
    pub async fn save_field(&self, field: FieldDefinition) {
        let mut fields = self.fields.write().await;
        let container_fields = fields.entry(field.container_id()).or_default();
        match container_fields
            .iter_mut()
            .find(|existing| existing.id() == field.id())
        {
            Some(existing) => *existing = field,
            None => container_fields.push(field),
        }
    }
}

#[async_trait]
impl FormRepository for InMemoryFormRepository {
    async fn find_container(
        &self,
        container_id: ContainerId,
    ) -> AppResult<Option<ContainerSettings>> {
        Ok(self.containers.read().await.get(&container_id).cloned())
    }

    async fn list_fields(&self, container_id: ContainerId) -> AppResult<Vec<FieldDefinition>> {
        Ok(self
            .fields
            .read()
            .await
            .get(&container_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// In-memory capability grants keyed by container and subject.
#[derive(Debug, Default)]
pub struct InMemoryCapabilityRepository {
    grants: RwLock<HashMap<(ContainerId, String), Vec<Capability>>>,
}

impl InMemoryCapabilityRepository {
    /// Creates a repository without grants.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Grants a capability to a subject in a container.
    pub async fn grant(
        &self,
        container_id: ContainerId,
        subject: impl Into<String>,
        capability: Capability,
    ) {
        let mut grants = self.grants.write().await;
        let granted = grants.entry((container_id, subject.into())).or_default();
        if !granted.contains(&capability) {
            granted.push(capability);
        }
    }
}

#[async_trait]
impl CapabilityRepository for InMemoryCapabilityRepository {
    async fn list_capabilities(
        &self,
        container_id: ContainerId,
        subject: &str,
    ) -> AppResult<Vec<Capability>> {
        Ok(self
            .grants
            .read()
            .await
            .get(&(container_id, subject.to_owned()))
            .cloned()
            .unwrap_or_default())
    }
}

/// In-memory user directory.
#[derive(Debug, Default)]
pub struct InMemoryUserDirectory {
    users: RwLock<HashMap<UserId, UserSummary>>,
}

impl InMemoryUserDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a user record.
    pub async fn save_user(&self, user: UserSummary) {
        self.users.write().await.insert(user.id, user);
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_users(&self, user_ids: &[UserId]) -> AppResult<Vec<UserSummary>> {
        let users = self.users.read().await;
        Ok(user_ids
            .iter()
            .filter_map(|user_id| users.get(user_id).cloned())
            .collect())
    }
}
