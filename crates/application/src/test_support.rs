//! Hand-written port fakes shared by the service tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use formyard_core::{
    AppError, AppResult, CallerContext, ContainerId, ContentId, EntryId, FieldId, UserId,
};
use formyard_domain::{
    ContainerSettings, ContentRow, ContentSlots, Entry, EntryLimit, FieldDefinition, FieldKind,
    NewEntry, UserSummary,
};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::AuthorizationOracle;
use crate::entry_ports::{
    AuditEvent, AuditRepository, ContentLookup, EntryEvent, EntryEventPublisher, EntryOrdering,
    EntryPredicate, EntryRepository, EntryWindow, FormRepository, PendingAction,
    PendingActionStore, RandomSource, UserDirectory,
};

pub(crate) fn container_id() -> ContainerId {
    ContainerId::new(1)
}

pub(crate) fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0)
        .single()
        .unwrap_or_else(|| unreachable!())
}

pub(crate) fn settings(approval_required: bool, max_entries: EntryLimit) -> ContainerSettings {
    ContainerSettings::new(container_id(), "Projects", approval_required, max_entries, None)
        .unwrap_or_else(|_| unreachable!())
}

pub(crate) fn field(id: i64, name: &str, kind: FieldKind) -> FieldDefinition {
    FieldDefinition::new(FieldId::new(id), container_id(), name, kind)
        .unwrap_or_else(|_| unreachable!())
}

pub(crate) fn user(id: i64) -> CallerContext {
    CallerContext::authenticated(UserId::new(id), format!("User {id}"))
}

#[derive(Default)]
pub(crate) struct EntryStore {
    pub(crate) entries: BTreeMap<EntryId, Entry>,
    pub(crate) contents: BTreeMap<(EntryId, FieldId), ContentRow>,
    next_entry_id: i64,
    next_content_id: i64,
}

impl ContentLookup for EntryStore {
    fn slots(&self, entry_id: EntryId, field_id: FieldId) -> Option<&ContentSlots> {
        self.contents.get(&(entry_id, field_id)).map(|row| &row.slots)
    }

    fn entry_slots(&self, entry_id: EntryId) -> Vec<&ContentSlots> {
        self.contents
            .values()
            .filter(|row| row.entry_id == entry_id)
            .map(|row| &row.slots)
            .collect()
    }
}

impl EntryStore {
    fn matching(&self, predicate: &EntryPredicate, ordering: &EntryOrdering) -> Vec<Entry> {
        let mut entries: Vec<Entry> = self
            .entries
            .values()
            .filter(|entry| predicate.matches(entry, self))
            .cloned()
            .collect();
        entries.sort_by(|left, right| ordering.compare(left, right, self));
        entries
    }
}

/// Entry repository fake evaluating predicates in memory.
#[derive(Default)]
pub(crate) struct FakeEntryRepository {
    pub(crate) store: Mutex<EntryStore>,
    pub(crate) counted: Mutex<Vec<EntryPredicate>>,
    pub(crate) located: Mutex<Vec<EntryId>>,
}

impl FakeEntryRepository {
    pub(crate) async fn seed(&self, owner: i64, approved: bool, minutes: i64) -> Entry {
        let time = base_time() + Duration::minutes(minutes);
        let mut entry = NewEntry::blank(container_id(), UserId::new(owner), None, time);
        entry.approved = approved;
        self.insert_entry(entry)
            .await
            .unwrap_or_else(|_| unreachable!())
    }

    pub(crate) async fn seed_content(&self, entry_id: EntryId, field_id: i64, value: &str) {
        self.upsert_content(entry_id, FieldId::new(field_id), ContentSlots::primary(value))
            .await
            .unwrap_or_else(|_| unreachable!());
    }

    pub(crate) async fn entry(&self, entry_id: EntryId) -> Option<Entry> {
        self.store.lock().await.entries.get(&entry_id).cloned()
    }

    pub(crate) async fn primary(&self, entry_id: EntryId, field_id: i64) -> Option<String> {
        self.store
            .lock()
            .await
            .contents
            .get(&(entry_id, FieldId::new(field_id)))
            .and_then(|row| row.slots.primary_value().map(str::to_owned))
    }

    pub(crate) async fn entries_of(&self, owner: i64) -> Vec<Entry> {
        self.store
            .lock()
            .await
            .entries
            .values()
            .filter(|entry| entry.owner_id == UserId::new(owner))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EntryRepository for FakeEntryRepository {
    async fn count_entries(&self, predicate: &EntryPredicate) -> AppResult<u64> {
        self.counted.lock().await.push(predicate.clone());
        let store = self.store.lock().await;
        Ok(store.matching(predicate, &EntryOrdering::default()).len() as u64)
    }

    async fn list_entry_ids(
        &self,
        predicate: &EntryPredicate,
        ordering: &EntryOrdering,
    ) -> AppResult<Vec<EntryId>> {
        let store = self.store.lock().await;
        Ok(store
            .matching(predicate, ordering)
            .into_iter()
            .map(|entry| entry.id)
            .collect())
    }

    async fn fetch_entries(
        &self,
        predicate: &EntryPredicate,
        ordering: &EntryOrdering,
        window: EntryWindow,
    ) -> AppResult<Vec<Entry>> {
        let store = self.store.lock().await;
        let entries = store.matching(predicate, ordering).into_iter();
        let offset = usize::try_from(window.offset).unwrap_or(usize::MAX);
        Ok(match window.limit {
            Some(limit) => entries
                .skip(offset)
                .take(usize::try_from(limit).unwrap_or(usize::MAX))
                .collect(),
            None => entries.skip(offset).collect(),
        })
    }

    async fn entry_ordinal(
        &self,
        predicate: &EntryPredicate,
        ordering: &EntryOrdering,
        entry_id: EntryId,
    ) -> AppResult<Option<u64>> {
        self.located.lock().await.push(entry_id);
        let store = self.store.lock().await;
        Ok(store
            .matching(predicate, ordering)
            .iter()
            .position(|entry| entry.id == entry_id)
            .map(|index| index as u64 + 1))
    }

    async fn find_entries(
        &self,
        container_id: ContainerId,
        entry_ids: &[EntryId],
    ) -> AppResult<Vec<Entry>> {
        let store = self.store.lock().await;
        Ok(entry_ids
            .iter()
            .filter_map(|entry_id| store.entries.get(entry_id))
            .filter(|entry| entry.container_id == container_id)
            .cloned()
            .collect())
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
        let mut store = self.store.lock().await;
        store.next_entry_id += 1;
        let entry = entry.into_entry(EntryId::new(store.next_entry_id));
        store.entries.insert(entry.id, entry.clone());
        Ok(entry)
    }

    async fn update_entry(&self, entry: &Entry) -> AppResult<()> {
        let mut store = self.store.lock().await;
        let stored = store
            .entries
            .get_mut(&entry.id)
            .ok_or_else(|| AppError::NotFound(format!("entry '{}'", entry.id)))?;
        *stored = entry.clone();
        Ok(())
    }

    async fn set_entries_approved(
        &self,
        container_id: ContainerId,
        entry_ids: &[EntryId],
        approved: bool,
        modified_at: DateTime<Utc>,
    ) -> AppResult<Vec<EntryId>> {
        let mut store = self.store.lock().await;
        let mut updated = Vec::new();
        for entry_id in entry_ids {
            if let Some(entry) = store.entries.get_mut(entry_id)
                && entry.container_id == container_id
            {
                entry.approved = approved;
                entry.time_modified = modified_at;
                updated.push(*entry_id);
            }
        }
        Ok(updated)
    }

    async fn delete_entry(&self, _container_id: ContainerId, entry_id: EntryId) -> AppResult<()> {
        self.store.lock().await.entries.remove(&entry_id);
        Ok(())
    }

    async fn count_owned_entries(
        &self,
        container_id: ContainerId,
        owner_id: UserId,
        since: Option<DateTime<Utc>>,
    ) -> AppResult<u64> {
        let store = self.store.lock().await;
        Ok(store
            .entries
            .values()
            .filter(|entry| entry.container_id == container_id && entry.owner_id == owner_id)
            .filter(|entry| since.is_none_or(|since| entry.time_created >= since))
            .count() as u64)
    }

    async fn find_correlated_entry(
        &self,
        container_id: ContainerId,
        owner_id: UserId,
        field_id: FieldId,
        value: &str,
    ) -> AppResult<Option<Entry>> {
        let store = self.store.lock().await;
        Ok(store
            .entries
            .values()
            .filter(|entry| entry.container_id == container_id && entry.owner_id == owner_id)
            .find(|entry| {
                store
                    .slots(entry.id, field_id)
                    .and_then(ContentSlots::primary_value)
                    .is_some_and(|content| content.eq_ignore_ascii_case(value))
            })
            .cloned())
    }

    async fn list_content(
        &self,
        entry_ids: &[EntryId],
        field_ids: Option<&[FieldId]>,
    ) -> AppResult<Vec<ContentRow>> {
        let store = self.store.lock().await;
        Ok(store
            .contents
            .values()
            .filter(|row| entry_ids.contains(&row.entry_id))
            .filter(|row| field_ids.is_none_or(|field_ids| field_ids.contains(&row.field_id)))
            .cloned()
            .collect())
    }

    async fn upsert_content(
        &self,
        entry_id: EntryId,
        field_id: FieldId,
        slots: ContentSlots,
    ) -> AppResult<ContentRow> {
        let mut store = self.store.lock().await;
        let id = match store.contents.get(&(entry_id, field_id)) {
            Some(row) => row.id,
            None => {
                store.next_content_id += 1;
                ContentId::new(store.next_content_id)
            }
        };
        let row = ContentRow {
            id,
            entry_id,
            field_id,
            slots,
        };
        store.contents.insert((entry_id, field_id), row.clone());
        Ok(row)
    }

    async fn delete_content(&self, entry_id: EntryId, field_id: FieldId) -> AppResult<()> {
        self.store.lock().await.contents.remove(&(entry_id, field_id));
        Ok(())
    }
}

pub(crate) struct FakeFormRepository {
    pub(crate) settings: ContainerSettings,
    pub(crate) fields: Vec<FieldDefinition>,
}

#[async_trait]
impl FormRepository for FakeFormRepository {
    async fn find_container(
        &self,
        container_id: ContainerId,
    ) -> AppResult<Option<ContainerSettings>> {
        Ok((self.settings.id() == container_id).then(|| self.settings.clone()))
    }

    async fn list_fields(&self, container_id: ContainerId) -> AppResult<Vec<FieldDefinition>> {
        Ok(self
            .fields
            .iter()
            .filter(|field| field.container_id() == container_id)
            .cloned()
            .collect())
    }
}

/// Oracle fake granting fixed answers per user id.
#[derive(Default)]
pub(crate) struct FakeOracle {
    pub(crate) managers: Vec<i64>,
    pub(crate) writers: Vec<i64>,
    pub(crate) viewers: Vec<i64>,
    pub(crate) approvers: Vec<i64>,
    pub(crate) draft_viewers: Vec<i64>,
    pub(crate) anonymous_viewers: Vec<i64>,
}

fn listed(caller: &CallerContext, users: &[i64]) -> bool {
    caller
        .user_id()
        .is_some_and(|user_id| users.contains(&user_id.get()))
}

#[async_trait]
impl AuthorizationOracle for FakeOracle {
    async fn can_view_all(
        &self,
        caller: &CallerContext,
        _container_id: ContainerId,
    ) -> AppResult<bool> {
        Ok(listed(caller, &self.viewers) || listed(caller, &self.managers))
    }

    async fn can_manage(
        &self,
        caller: &CallerContext,
        _container_id: ContainerId,
        entry: Option<&Entry>,
    ) -> AppResult<bool> {
        if listed(caller, &self.managers) {
            return Ok(true);
        }
        if !listed(caller, &self.writers) {
            return Ok(false);
        }
        Ok(entry.is_none_or(|entry| entry.is_owned_by(caller.user_id())))
    }

    async fn can_manage_all(
        &self,
        caller: &CallerContext,
        _container_id: ContainerId,
    ) -> AppResult<bool> {
        Ok(listed(caller, &self.managers))
    }

    async fn can_approve(
        &self,
        caller: &CallerContext,
        _container_id: ContainerId,
    ) -> AppResult<bool> {
        Ok(listed(caller, &self.approvers))
    }

    async fn can_view_drafts(
        &self,
        caller: &CallerContext,
        _container_id: ContainerId,
    ) -> AppResult<bool> {
        Ok(listed(caller, &self.draft_viewers))
    }

    async fn can_view_anonymous(
        &self,
        caller: &CallerContext,
        _container_id: ContainerId,
    ) -> AppResult<bool> {
        Ok(listed(caller, &self.anonymous_viewers))
    }
}

#[derive(Default)]
pub(crate) struct RecordingPublisher {
    pub(crate) events: Mutex<Vec<EntryEvent>>,
}

#[async_trait]
impl EntryEventPublisher for RecordingPublisher {
    async fn publish(&self, event: EntryEvent) -> AppResult<()> {
        self.events.lock().await.push(event);
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct RecordingAuditRepository {
    pub(crate) events: Mutex<Vec<AuditEvent>>,
}

#[async_trait]
impl AuditRepository for RecordingAuditRepository {
    async fn append_event(&self, event: AuditEvent) -> AppResult<()> {
        self.events.lock().await.push(event);
        Ok(())
    }
}

pub(crate) struct FakeUserDirectory;

#[async_trait]
impl UserDirectory for FakeUserDirectory {
    async fn find_users(&self, user_ids: &[UserId]) -> AppResult<Vec<UserSummary>> {
        Ok(user_ids
            .iter()
            .map(|user_id| UserSummary {
                id: *user_id,
                display_name: format!("User {user_id}"),
                email: None,
            })
            .collect())
    }
}

#[derive(Default)]
pub(crate) struct FakePendingActionStore {
    actions: Mutex<HashMap<Uuid, PendingAction>>,
}

#[async_trait]
impl PendingActionStore for FakePendingActionStore {
    async fn save(&self, action: PendingAction, _ttl_seconds: u32) -> AppResult<()> {
        self.actions.lock().await.insert(action.token, action);
        Ok(())
    }

    async fn take(&self, token: Uuid) -> AppResult<Option<PendingAction>> {
        Ok(self.actions.lock().await.remove(&token))
    }
}

/// Random source returning a fixed index and the first indices of a sample.
#[derive(Default)]
pub(crate) struct FixedRandom {
    pub(crate) index: AtomicU64,
}

impl FixedRandom {
    pub(crate) fn returning(index: u64) -> Self {
        Self {
            index: AtomicU64::new(index),
        }
    }
}

impl RandomSource for FixedRandom {
    fn index_below(&self, upper: u64) -> u64 {
        self.index.load(Ordering::Relaxed) % upper.max(1)
    }

    fn sample_indices(&self, length: usize, amount: usize) -> Vec<usize> {
        (0..length).rev().take(amount).collect()
    }
}
