use async_trait::async_trait;
use chrono::{DateTime, Utc};
use formyard_core::{AppResult, ContainerId, EntryId, FieldId, UserId};
use formyard_domain::{
    AuditAction, ContainerSettings, ContentRow, ContentSlots, Entry, FieldDefinition, NewEntry,
    UserSummary, ViewRef,
};
use uuid::Uuid;

use super::action::PendingAction;
use super::query::{EntryOrdering, EntryPredicate, EntryWindow};

/// Repository port for entries and their content rows.
#[async_trait]
pub trait EntryRepository: Send + Sync {
    /// Counts entries matching a predicate.
    async fn count_entries(&self, predicate: &EntryPredicate) -> AppResult<u64>;

    /// Lists the ids of every entry matching a predicate, in order.
    async fn list_entry_ids(
        &self,
        predicate: &EntryPredicate,
        ordering: &EntryOrdering,
    ) -> AppResult<Vec<EntryId>>;

    /// Fetches a window of entries matching a predicate, in order.
    async fn fetch_entries(
        &self,
        predicate: &EntryPredicate,
        ordering: &EntryOrdering,
        window: EntryWindow,
    ) -> AppResult<Vec<Entry>>;

    /// Returns the 1-based position of an entry within the ordered matches.
    async fn entry_ordinal(
        &self,
        predicate: &EntryPredicate,
        ordering: &EntryOrdering,
        entry_id: EntryId,
    ) -> AppResult<Option<u64>>;

    /// Loads entries of a container by id, without visibility rules.
    async fn find_entries(
        &self,
        container_id: ContainerId,
        entry_ids: &[EntryId],
    ) -> AppResult<Vec<Entry>>;

    /// Loads one entry of a container by id.
    async fn find_entry(
        &self,
        container_id: ContainerId,
        entry_id: EntryId,
    ) -> AppResult<Option<Entry>>;

    /// Inserts a new entry row.
    async fn insert_entry(&self, entry: NewEntry) -> AppResult<Entry>;

    /// Overwrites an existing entry row.
    async fn update_entry(&self, entry: &Entry) -> AppResult<()>;

    /// Sets the approval flag of entries in one statement and returns the
    /// ids that were updated.
    async fn set_entries_approved(
        &self,
        container_id: ContainerId,
        entry_ids: &[EntryId],
        approved: bool,
        modified_at: DateTime<Utc>,
    ) -> AppResult<Vec<EntryId>>;

    /// Deletes one entry row.
    async fn delete_entry(&self, container_id: ContainerId, entry_id: EntryId) -> AppResult<()>;

    /// Counts entries owned by a user, optionally created since a point in time.
    async fn count_owned_entries(
        &self,
        container_id: ContainerId,
        owner_id: UserId,
        since: Option<DateTime<Utc>>,
    ) -> AppResult<u64>;

    /// Finds an entry of `owner_id` whose field content matches `value`
    /// case-insensitively on the primary slot.
    async fn find_correlated_entry(
        &self,
        container_id: ContainerId,
        owner_id: UserId,
        field_id: FieldId,
        value: &str,
    ) -> AppResult<Option<Entry>>;

    /// Lists content rows for entries, optionally restricted to fields.
    async fn list_content(
        &self,
        entry_ids: &[EntryId],
        field_ids: Option<&[FieldId]>,
    ) -> AppResult<Vec<ContentRow>>;

    /// Inserts or overwrites the content row of one (entry, field) pair.
    async fn upsert_content(
        &self,
        entry_id: EntryId,
        field_id: FieldId,
        slots: ContentSlots,
    ) -> AppResult<ContentRow>;

    /// Deletes the content row of one (entry, field) pair, if any.
    async fn delete_content(&self, entry_id: EntryId, field_id: FieldId) -> AppResult<()>;
}

/// Repository port for container settings and field definitions.
#[async_trait]
pub trait FormRepository: Send + Sync {
    /// Returns container settings by id.
    async fn find_container(
        &self,
        container_id: ContainerId,
    ) -> AppResult<Option<ContainerSettings>>;

    /// Lists field definitions of a container in display order.
    async fn list_fields(&self, container_id: ContainerId) -> AppResult<Vec<FieldDefinition>>;
}

/// Directory port resolving user records for notifications.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Returns the users with the given ids. Unknown ids are skipped.
    async fn find_users(&self, user_ids: &[UserId]) -> AppResult<Vec<UserSummary>>;
}

/// Audit event payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    /// Container scope.
    pub container_id: ContainerId,
    /// Acting subject.
    pub subject: String,
    /// Stable action name.
    pub action: AuditAction,
    /// Entries the action processed, team copies included.
    pub entry_ids: Vec<EntryId>,
    /// View the action was issued from.
    pub view: ViewRef,
}

/// Repository port for append-only audit events.
#[async_trait]
pub trait AuditRepository: Send + Sync {
    /// Appends a single audit event.
    async fn append_event(&self, event: AuditEvent) -> AppResult<()>;
}

/// Store for actions awaiting confirmation.
#[async_trait]
pub trait PendingActionStore: Send + Sync {
    /// Stores a pending action until it expires.
    async fn save(&self, action: PendingAction, ttl_seconds: u32) -> AppResult<()>;

    /// Removes and returns a pending action. Each token can be taken once.
    async fn take(&self, token: Uuid) -> AppResult<Option<PendingAction>>;
}

/// Source of randomness for random pages and subsets.
pub trait RandomSource: Send + Sync {
    /// Returns a uniformly random index in `0..upper`. `upper` is at least 1.
    fn index_below(&self, upper: u64) -> u64;

    /// Returns `amount` distinct indices drawn uniformly from `0..length`.
    fn sample_indices(&self, length: usize, amount: usize) -> Vec<usize>;
}
