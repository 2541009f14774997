use formyard_core::AppResult;
use formyard_domain::{ContentSlots, FieldDefinition};

use super::{ContentValues, FieldCapability, part_text};

/// Free text field.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextFieldType;

impl FieldCapability for TextFieldType {
    fn type_name(&self) -> &str {
        "text"
    }

    fn content_parts(&self) -> &'static [&'static str] {
        &["text"]
    }

    fn format_content(
        &self,
        _field: &FieldDefinition,
        values: &ContentValues,
    ) -> AppResult<Option<ContentSlots>> {
        Ok(part_text(values, "text").map(ContentSlots::primary))
    }
}
