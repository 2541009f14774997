use async_trait::async_trait;
use formyard_core::{AppResult, EntryId};
use formyard_domain::{ContentRow, ContentSlots, FieldDefinition, SearchCriterion};

use super::{ContentValues, FieldCapability, part_text, text_search_predicate};
use crate::entry_ports::{ContentPredicate, EntryRepository};

const DOWNLOAD_COUNT_SLOT: usize = 2;

/// Attachment reference with alternative text and a download counter.
///
/// The stored reference points into external file storage. The download
/// counter is maintained by the storage side and survives content updates.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileFieldType;

#[async_trait]
impl FieldCapability for FileFieldType {
    fn type_name(&self) -> &str {
        "file"
    }

    fn content_parts(&self) -> &'static [&'static str] {
        &["file", "alt_text", "download_count"]
    }

    fn format_content(
        &self,
        _field: &FieldDefinition,
        values: &ContentValues,
    ) -> AppResult<Option<ContentSlots>> {
        let file = part_text(values, "file");
        let alt_text = part_text(values, "alt_text");
        if file.is_none() && alt_text.is_none() {
            return Ok(None);
        }

        let mut slots = ContentSlots::default();
        slots.set(0, file)?;
        slots.set(1, alt_text)?;
        slots.set(
            DOWNLOAD_COUNT_SLOT,
            Some(part_text(values, "download_count").unwrap_or_else(|| "0".to_owned())),
        )?;
        Ok(Some(slots))
    }

    fn search_predicate(
        &self,
        field: &FieldDefinition,
        criterion: &SearchCriterion,
    ) -> AppResult<ContentPredicate> {
        text_search_predicate(field, criterion, 1)
    }

    async fn update_content(
        &self,
        repository: &dyn EntryRepository,
        field: &FieldDefinition,
        entry_id: EntryId,
        values: &ContentValues,
    ) -> AppResult<Option<ContentRow>> {
        let Some(mut slots) = self.format_content(field, values)? else {
            repository.delete_content(entry_id, field.id()).await?;
            return Ok(None);
        };

        let existing = repository
            .list_content(&[entry_id], Some(&[field.id()]))
            .await?;
        if let Some(count) = existing
            .first()
            .and_then(|row| row.slots.get(DOWNLOAD_COUNT_SLOT))
        {
            slots.set(DOWNLOAD_COUNT_SLOT, Some(count.to_owned()))?;
        }

        repository
            .upsert_content(entry_id, field.id(), slots)
            .await
            .map(Some)
    }
}
