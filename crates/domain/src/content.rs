use std::collections::BTreeMap;

use formyard_core::{AppError, AppResult, ContentId, EntryId, FieldId};
use serde::{Deserialize, Serialize};

/// Number of payload slots stored per content row.
pub const CONTENT_SLOT_COUNT: usize = 5;

/// Fixed-width payload of one content row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentSlots([Option<String>; CONTENT_SLOT_COUNT]);

impl ContentSlots {
    /// Creates slots from raw storage columns.
    #[must_use]
    pub fn new(slots: [Option<String>; CONTENT_SLOT_COUNT]) -> Self {
        Self(slots)
    }

    /// Creates slots holding only a primary value.
    #[must_use]
    pub fn primary(value: impl Into<String>) -> Self {
        let mut slots = Self::default();
        slots.0[0] = Some(value.into());
        slots
    }

    /// Returns the value stored at a slot index.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).and_then(|slot| slot.as_deref())
    }

    /// Overwrites the value stored at a slot index.
    pub fn set(&mut self, index: usize, value: Option<String>) -> AppResult<()> {
        let slot = self.0.get_mut(index).ok_or_else(|| {
            AppError::Validation(format!(
                "content slot index {index} is out of range (max {})",
                CONTENT_SLOT_COUNT - 1
            ))
        })?;
        *slot = value;
        Ok(())
    }

    /// Returns the primary slot value.
    #[must_use]
    pub fn primary_value(&self) -> Option<&str> {
        self.get(0)
    }

    /// Returns whether every slot is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0
            .iter()
            .all(|slot| slot.as_deref().is_none_or(str::is_empty))
    }

    /// Returns the raw slot array.
    #[must_use]
    pub fn as_array(&self) -> &[Option<String>; CONTENT_SLOT_COUNT] {
        &self.0
    }

    /// Consumes the slots into the raw array.
    #[must_use]
    pub fn into_array(self) -> [Option<String>; CONTENT_SLOT_COUNT] {
        self.0
    }
}

/// Persisted payload row for one (entry, field) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRow {
    /// Content row identifier.
    pub id: ContentId,
    /// Entry the content belongs to.
    pub entry_id: EntryId,
    /// Field the content belongs to.
    pub field_id: FieldId,
    /// Payload slots.
    pub slots: ContentSlots,
}

/// Content of one field attached to an entry, with named parts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldContent {
    content_id: ContentId,
    part_names: Vec<String>,
    slots: ContentSlots,
}

impl FieldContent {
    /// Creates field content from a row and the part names of its field type.
    #[must_use]
    pub fn new(content_id: ContentId, part_names: Vec<String>, slots: ContentSlots) -> Self {
        Self {
            content_id,
            part_names,
            slots,
        }
    }

    /// Returns the persisted content row id.
    #[must_use]
    pub fn content_id(&self) -> ContentId {
        self.content_id
    }

    /// Returns the ordered part names.
    #[must_use]
    pub fn part_names(&self) -> &[String] {
        &self.part_names
    }

    /// Returns a named part value.
    #[must_use]
    pub fn part(&self, name: &str) -> Option<&str> {
        let index = self.part_names.iter().position(|part| part == name)?;
        self.slots.get(index)
    }

    /// Returns the raw slots.
    #[must_use]
    pub fn slots(&self) -> &ContentSlots {
        &self.slots
    }
}

/// Typed mapping from field id to the content attached to one entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryContent {
    fields: BTreeMap<FieldId, FieldContent>,
}

impl EntryContent {
    /// Attaches content for a field, replacing any previous value.
    pub fn insert(&mut self, field_id: FieldId, content: FieldContent) {
        self.fields.insert(field_id, content);
    }

    /// Returns the content of a field, if present.
    #[must_use]
    pub fn field(&self, field_id: FieldId) -> Option<&FieldContent> {
        self.fields.get(&field_id)
    }

    /// Returns a named part of a field. Absence means no content.
    #[must_use]
    pub fn part(&self, field_id: FieldId, part: &str) -> Option<&str> {
        self.field(field_id).and_then(|content| content.part(part))
    }

    /// Returns the content row id of a field.
    #[must_use]
    pub fn content_id(&self, field_id: FieldId) -> Option<ContentId> {
        self.field(field_id).map(FieldContent::content_id)
    }

    /// Returns the field ids that carry content.
    pub fn field_ids(&self) -> impl Iterator<Item = FieldId> + '_ {
        self.fields.keys().copied()
    }

    /// Returns whether no field carries content.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
