use formyard_core::{AppError, AppResult};
use formyard_domain::{ContentSlots, FieldDefinition, FieldKind, SearchCriterion, SearchOperator};

use super::{
    ContentValues, FieldCapability, all_of, any_of, empty_predicate, list_text, part_text,
    unsupported_operator,
};
use crate::entry_ports::{ContentMatcher, ContentPredicate};

/// Single choice field storing the 1-based option key.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectFieldType;

/// Multiple choice field storing option keys as `#1#3#`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MultiSelectFieldType;

fn options(field: &FieldDefinition) -> &[String] {
    match field.kind() {
        FieldKind::Select { options } | FieldKind::MultiSelect { options } => options,
        _ => &[],
    }
}

/// Resolves an option label, or a key given as number, to its 1-based key.
fn option_key(field: &FieldDefinition, value: &str) -> AppResult<usize> {
    let options = options(field);
    let value = value.trim();
    if let Some(index) = options.iter().position(|option| option == value) {
        return Ok(index + 1);
    }

    value
        .parse::<usize>()
        .ok()
        .filter(|key| (1..=options.len()).contains(key))
        .ok_or_else(|| {
            AppError::Validation(format!(
                "field '{}' has no option '{value}'",
                field.id()
            ))
        })
}

fn option_keys(field: &FieldDefinition, values: &[String]) -> AppResult<Vec<usize>> {
    let mut keys = values
        .iter()
        .map(|value| option_key(field, value))
        .collect::<AppResult<Vec<_>>>()?;
    keys.sort_unstable();
    keys.dedup();
    Ok(keys)
}

fn encode_keys(keys: &[usize]) -> String {
    let mut encoded = String::from("#");
    for key in keys {
        encoded.push_str(&key.to_string());
        encoded.push('#');
    }
    encoded
}

fn key_marker(field: &FieldDefinition, key: usize) -> ContentPredicate {
    ContentPredicate::Matches {
        field_id: field.id(),
        slot: 0,
        matcher: ContentMatcher::Contains(format!("#{key}#")),
    }
}

impl FieldCapability for SelectFieldType {
    fn type_name(&self) -> &str {
        "select"
    }

    fn content_parts(&self) -> &'static [&'static str] {
        &["selected"]
    }

    fn format_content(
        &self,
        field: &FieldDefinition,
        values: &ContentValues,
    ) -> AppResult<Option<ContentSlots>> {
        let Some(value) = part_text(values, "selected") else {
            return Ok(None);
        };

        let key = option_key(field, &value)?;
        Ok(Some(ContentSlots::primary(key.to_string())))
    }

    fn search_predicate(
        &self,
        field: &FieldDefinition,
        criterion: &SearchCriterion,
    ) -> AppResult<ContentPredicate> {
        match criterion.operator {
            SearchOperator::Equal | SearchOperator::AnyOf => {
                let keys = option_keys(field, &criterion.values)?;
                Ok(any_of(
                    keys.into_iter()
                        .map(|key| ContentPredicate::Matches {
                            field_id: field.id(),
                            slot: 0,
                            matcher: ContentMatcher::Equals(key.to_string()),
                        })
                        .collect(),
                ))
            }
            SearchOperator::Empty => Ok(empty_predicate(field)),
            other => Err(unsupported_operator(field, other)),
        }
    }
}

impl FieldCapability for MultiSelectFieldType {
    fn type_name(&self) -> &str {
        "multiselect"
    }

    fn content_parts(&self) -> &'static [&'static str] {
        &["selected"]
    }

    fn format_content(
        &self,
        field: &FieldDefinition,
        values: &ContentValues,
    ) -> AppResult<Option<ContentSlots>> {
        let selected = values.get("selected").map(list_text).unwrap_or_default();
        if selected.is_empty() {
            return Ok(None);
        }

        let keys = option_keys(field, &selected)?;
        Ok(Some(ContentSlots::primary(encode_keys(&keys))))
    }

    fn search_predicate(
        &self,
        field: &FieldDefinition,
        criterion: &SearchCriterion,
    ) -> AppResult<ContentPredicate> {
        match criterion.operator {
            SearchOperator::AnyOf => {
                let keys = option_keys(field, &criterion.values)?;
                Ok(any_of(
                    keys.into_iter().map(|key| key_marker(field, key)).collect(),
                ))
            }
            SearchOperator::AllOf => {
                let keys = option_keys(field, &criterion.values)?;
                Ok(all_of(
                    keys.into_iter().map(|key| key_marker(field, key)).collect(),
                ))
            }
            SearchOperator::Equal | SearchOperator::Exactly => {
                let keys = option_keys(field, &criterion.values)?;
                let excluded = (1..=options(field).len())
                    .filter(|key| !keys.contains(key))
                    .map(|key| key_marker(field, key).negate());
                let mut predicates: Vec<ContentPredicate> =
                    keys.iter().map(|key| key_marker(field, *key)).collect();
                predicates.extend(excluded);
                Ok(all_of(predicates))
            }
            SearchOperator::Empty => Ok(empty_predicate(field)),
            other => Err(unsupported_operator(field, other)),
        }
    }
}
