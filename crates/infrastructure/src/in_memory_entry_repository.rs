use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use formyard_application::{
    ContentLookup, EntryOrdering, EntryPredicate, EntryRepository, EntryWindow,
};
use formyard_core::{AppError, AppResult, ContainerId, ContentId, EntryId, FieldId, UserId};
use formyard_domain::{ContentRow, ContentSlots, Entry, NewEntry};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct EntryTables {
    entries: BTreeMap<EntryId, Entry>,
    contents: BTreeMap<(EntryId, FieldId), ContentRow>,
    next_entry_id: i64,
    next_content_id: i64,
}

impl ContentLookup for EntryTables {
    fn slots(&self, entry_id: EntryId, field_id: FieldId) -> Option<&ContentSlots> {
        self.contents.get(&(entry_id, field_id)).map(|row| &row.slots)
    }

    fn entry_slots(&self, entry_id: EntryId) -> Vec<&ContentSlots> {
        self.contents
            .range((entry_id, FieldId::new(i64::MIN))..=(entry_id, FieldId::new(i64::MAX)))
            .map(|(_, row)| &row.slots)
            .collect()
    }
}

impl EntryTables {
    fn matching(&self, predicate: &EntryPredicate, ordering: &EntryOrdering) -> Vec<&Entry> {
        let mut entries: Vec<&Entry> = self
            .entries
            .values()
            .filter(|entry| predicate.matches(entry, self))
            .collect();
        entries.sort_by(|left, right| ordering.compare(left, right, self));
        entries
    }
}

/// In-memory entry repository evaluating predicates and orderings directly.
#[derive(Debug, Default)]
pub struct InMemoryEntryRepository {
    tables: RwLock<EntryTables>,
}

impl InMemoryEntryRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn to_count(value: usize) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}

#[async_trait]
impl EntryRepository for InMemoryEntryRepository {
    async fn count_entries(&self, predicate: &EntryPredicate) -> AppResult<u64> {
        let tables = self.tables.read().await;
        Ok(to_count(
            tables
                .entries
                .values()
                .filter(|entry| predicate.matches(entry, &*tables))
                .count(),
        ))
    }

    async fn list_entry_ids(
        &self,
        predicate: &EntryPredicate,
        ordering: &EntryOrdering,
    ) -> AppResult<Vec<EntryId>> {
        let tables = self.tables.read().await;
        Ok(tables
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
        let tables = self.tables.read().await;
        let offset = usize::try_from(window.offset).unwrap_or(usize::MAX);
        let limit = window
            .limit
            .map_or(usize::MAX, |limit| usize::try_from(limit).unwrap_or(usize::MAX));

        Ok(tables
            .matching(predicate, ordering)
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn entry_ordinal(
        &self,
        predicate: &EntryPredicate,
        ordering: &EntryOrdering,
        entry_id: EntryId,
    ) -> AppResult<Option<u64>> {
        let tables = self.tables.read().await;
        Ok(tables
            .matching(predicate, ordering)
            .iter()
            .position(|entry| entry.id == entry_id)
            .map(|index| to_count(index).saturating_add(1)))
    }

    async fn find_entries(
        &self,
        container_id: ContainerId,
        entry_ids: &[EntryId],
    ) -> AppResult<Vec<Entry>> {
        let tables = self.tables.read().await;
        let mut found: Vec<Entry> = tables
            .entries
            .values()
            .filter(|entry| entry.container_id == container_id && entry_ids.contains(&entry.id))
            .cloned()
            .collect();
        found.sort_by_key(|entry| entry.id);
        Ok(found)
    }

    async fn find_entry(
        &self,
        container_id: ContainerId,
        entry_id: EntryId,
    ) -> AppResult<Option<Entry>> {
        let tables = self.tables.read().await;
        Ok(tables
            .entries
            .get(&entry_id)
            .filter(|entry| entry.container_id == container_id)
            .cloned())
    }

    async fn insert_entry(&self, entry: NewEntry) -> AppResult<Entry> {
        let mut tables = self.tables.write().await;
        tables.next_entry_id += 1;
        let entry = entry.into_entry(EntryId::new(tables.next_entry_id));
        tables.entries.insert(entry.id, entry.clone());
        Ok(entry)
    }

    async fn update_entry(&self, entry: &Entry) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        let stored = tables
            .entries
            .get_mut(&entry.id)
            .filter(|stored| stored.container_id == entry.container_id)
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "entry '{}' does not exist in container '{}'",
                    entry.id, entry.container_id
                ))
            })?;
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
        let mut tables = self.tables.write().await;
        let mut updated = Vec::new();
        for entry in tables.entries.values_mut() {
            if entry.container_id == container_id && entry_ids.contains(&entry.id) {
                entry.approved = approved;
                entry.time_modified = modified_at;
                updated.push(entry.id);
            }
        }
        Ok(updated)
    }

    async fn delete_entry(&self, container_id: ContainerId, entry_id: EntryId) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        if tables
            .entries
            .get(&entry_id)
            .is_some_and(|entry| entry.container_id == container_id)
        {
            tables.entries.remove(&entry_id);
            tables.contents.retain(|(owner, _), _| *owner != entry_id);
        }
        Ok(())
    }

    async fn count_owned_entries(
        &self,
        container_id: ContainerId,
        owner_id: UserId,
        since: Option<DateTime<Utc>>,
    ) -> AppResult<u64> {
        let tables = self.tables.read().await;
        Ok(to_count(
            tables
                .entries
                .values()
                .filter(|entry| {
                    entry.container_id == container_id
                        && entry.owner_id == owner_id
                        && since.is_none_or(|since| entry.time_created >= since)
                })
                .count(),
        ))
    }

    async fn find_correlated_entry(
        &self,
        container_id: ContainerId,
        owner_id: UserId,
        field_id: FieldId,
        value: &str,
    ) -> AppResult<Option<Entry>> {
        let tables = self.tables.read().await;
        let value = value.to_lowercase();
        Ok(tables
            .entries
            .values()
            .find(|entry| {
                entry.container_id == container_id
                    && entry.owner_id == owner_id
                    && tables
                        .slots(entry.id, field_id)
                        .and_then(ContentSlots::primary_value)
                        .is_some_and(|primary| primary.to_lowercase() == value)
            })
            .cloned())
    }

    async fn list_content(
        &self,
        entry_ids: &[EntryId],
        field_ids: Option<&[FieldId]>,
    ) -> AppResult<Vec<ContentRow>> {
        let tables = self.tables.read().await;
        Ok(tables
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
        let mut tables = self.tables.write().await;
        if !tables.entries.contains_key(&entry_id) {
            return Err(AppError::NotFound(format!(
                "entry '{entry_id}' does not exist"
            )));
        }

        let id = match tables.contents.get(&(entry_id, field_id)) {
            Some(existing) => existing.id,
            None => {
                tables.next_content_id += 1;
                ContentId::new(tables.next_content_id)
            }
        };
        let row = ContentRow {
            id,
            entry_id,
            field_id,
            slots,
        };
        tables.contents.insert((entry_id, field_id), row.clone());
        Ok(row)
    }

    async fn delete_content(&self, entry_id: EntryId, field_id: FieldId) -> AppResult<()> {
        self.tables
            .write()
            .await
            .contents
            .remove(&(entry_id, field_id));
        Ok(())
    }
}
