use formyard_core::{AppError, AppResult};
use formyard_domain::{ContentSlots, FieldDefinition};

use super::{ContentValues, FieldCapability, part_text};

/// Link field with alternative text.
#[derive(Debug, Clone, Copy, Default)]
pub struct UrlFieldType;

impl FieldCapability for UrlFieldType {
    fn type_name(&self) -> &str {
        "url"
    }

    fn content_parts(&self) -> &'static [&'static str] {
        &["url", "alt_text"]
    }

    fn format_content(
        &self,
        field: &FieldDefinition,
        values: &ContentValues,
    ) -> AppResult<Option<ContentSlots>> {
        let Some(url) = part_text(values, "url") else {
            return Ok(None);
        };

        if url.chars().any(char::is_whitespace) {
            return Err(AppError::Validation(format!(
                "field '{}' expects a url without whitespace, got '{url}'",
                field.id()
            )));
        }

        let mut slots = ContentSlots::primary(url);
        slots.set(1, part_text(values, "alt_text"))?;
        Ok(Some(slots))
    }
}
