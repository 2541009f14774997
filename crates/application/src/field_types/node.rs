use formyard_core::{AppError, AppResult};
use formyard_domain::{ContentSlots, FieldDefinition};

use super::{ContentValues, FieldCapability, part_text};

/// Parent and sibling links of an ordered entry structure.
#[derive(Debug, Clone, Copy, Default)]
pub struct NodeFieldType;

fn entry_reference(
    field: &FieldDefinition,
    part: &str,
    value: Option<String>,
) -> AppResult<Option<String>> {
    value
        .map(|value| {
            value
                .parse::<i64>()
                .map(|id| id.to_string())
                .map_err(|error| {
                    AppError::Validation(format!(
                        "field '{}' expects an entry id for '{part}', got '{value}': {error}",
                        field.id()
                    ))
                })
        })
        .transpose()
}

impl FieldCapability for NodeFieldType {
    fn type_name(&self) -> &str {
        "node"
    }

    fn content_parts(&self) -> &'static [&'static str] {
        &["parent", "sibling"]
    }

    fn format_content(
        &self,
        field: &FieldDefinition,
        values: &ContentValues,
    ) -> AppResult<Option<ContentSlots>> {
        let parent = entry_reference(field, "parent", part_text(values, "parent"))?;
        let sibling = entry_reference(field, "sibling", part_text(values, "sibling"))?;
        if parent.is_none() && sibling.is_none() {
            return Ok(None);
        }

        let mut slots = ContentSlots::default();
        slots.set(0, parent)?;
        slots.set(1, sibling)?;
        Ok(Some(slots))
    }
}
