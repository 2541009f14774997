use std::collections::HashMap;
use std::sync::Arc;

use formyard_core::{AppResult, EntryId, FieldId};
use formyard_domain::{Entry, EntryContent, EntryRecord, FieldContent, FieldDefinition};

use crate::entry_ports::EntryRepository;
use crate::field_types::FieldRegistry;

/// Attaches field content to fetched entry rows.
#[derive(Clone)]
pub struct ContentAssembler {
    repository: Arc<dyn EntryRepository>,
    registry: Arc<FieldRegistry>,
}

impl ContentAssembler {
    /// Creates an assembler.
    #[must_use]
    pub fn new(repository: Arc<dyn EntryRepository>, registry: Arc<FieldRegistry>) -> Self {
        Self {
            repository,
            registry,
        }
    }

    /// Loads the content of `fields` for every entry in one batch and attaches
    /// it with the part names of each field type.
    ///
    /// Entries without content for a field simply lack that field.
    pub async fn assemble(
        &self,
        entries: Vec<Entry>,
        fields: &[FieldDefinition],
    ) -> AppResult<Vec<EntryRecord>> {
        if entries.is_empty() || fields.is_empty() {
            return Ok(entries
                .into_iter()
                .map(|entry| EntryRecord {
                    entry,
                    content: EntryContent::default(),
                })
                .collect());
        }

        let mut part_names: HashMap<FieldId, Vec<String>> = HashMap::with_capacity(fields.len());
        for field in fields {
            let parts = self.registry.capability(field)?.content_parts();
            part_names.insert(
                field.id(),
                parts.iter().map(|part| (*part).to_owned()).collect(),
            );
        }

        let entry_ids: Vec<EntryId> = entries.iter().map(|entry| entry.id).collect();
        let field_ids: Vec<FieldId> = fields.iter().map(FieldDefinition::id).collect();
        let rows = self
            .repository
            .list_content(&entry_ids, Some(&field_ids))
            .await?;

        let mut contents: HashMap<EntryId, EntryContent> = HashMap::with_capacity(entries.len());
        for row in rows {
            let Some(parts) = part_names.get(&row.field_id) else {
                continue;
            };
            contents.entry(row.entry_id).or_default().insert(
                row.field_id,
                FieldContent::new(row.id, parts.clone(), row.slots),
            );
        }

        Ok(entries
            .into_iter()
            .map(|entry| {
                let content = contents.remove(&entry.id).unwrap_or_default();
                EntryRecord { entry, content }
            })
            .collect())
    }
}
