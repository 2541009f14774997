use formyard_core::AppResult;
use formyard_domain::{ContentSlots, FieldDefinition, SearchCriterion, SearchOperator};

use super::{
    ContentValues, FieldCapability, all_of, any_of, empty_predicate, list_text,
    unsupported_operator,
};
use crate::entry_ports::{ContentMatcher, ContentPredicate};

/// Comma-separated tag field.
#[derive(Debug, Clone, Copy, Default)]
pub struct TagFieldType;

fn normalize(tags: Vec<String>) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        if !normalized
            .iter()
            .any(|existing| existing.eq_ignore_ascii_case(&tag))
        {
            normalized.push(tag);
        }
    }
    normalized
}

impl FieldCapability for TagFieldType {
    fn type_name(&self) -> &str {
        "tag"
    }

    fn content_parts(&self) -> &'static [&'static str] {
        &["tags"]
    }

    fn format_content(
        &self,
        _field: &FieldDefinition,
        values: &ContentValues,
    ) -> AppResult<Option<ContentSlots>> {
        let tags = normalize(values.get("tags").map(list_text).unwrap_or_default());
        if tags.is_empty() {
            return Ok(None);
        }

        Ok(Some(ContentSlots::primary(tags.join(","))))
    }

    fn search_predicate(
        &self,
        field: &FieldDefinition,
        criterion: &SearchCriterion,
    ) -> AppResult<ContentPredicate> {
        let contains = |tag: &String| ContentPredicate::Matches {
            field_id: field.id(),
            slot: 0,
            matcher: ContentMatcher::Contains(tag.trim().to_owned()),
        };

        match criterion.operator {
            SearchOperator::AnyOf => Ok(any_of(criterion.values.iter().map(contains).collect())),
            SearchOperator::AllOf => Ok(all_of(criterion.values.iter().map(contains).collect())),
            SearchOperator::Equal | SearchOperator::Exactly => {
                let tags = normalize(
                    criterion
                        .values
                        .iter()
                        .map(|tag| tag.trim().to_owned())
                        .filter(|tag| !tag.is_empty())
                        .collect(),
                );
                Ok(ContentPredicate::Matches {
                    field_id: field.id(),
                    slot: 0,
                    matcher: ContentMatcher::Equals(tags.join(",")),
                })
            }
            SearchOperator::Empty => Ok(empty_predicate(field)),
            other => Err(unsupported_operator(field, other)),
        }
    }
}
