use formyard_core::{AppError, AppResult};
use formyard_domain::{ContentSlots, FieldDefinition, SearchCriterion, SearchOperator};

use super::{
    ContentValues, FieldCapability, all_of, any_of, empty_predicate, part_text,
    unsupported_operator,
};
use crate::entry_ports::{ContentMatcher, ContentPredicate};

/// Numeric field.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumberFieldType;

fn parse_number(field: &FieldDefinition, value: &str) -> AppResult<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|number| number.is_finite())
        .ok_or_else(|| {
            AppError::Validation(format!(
                "field '{}' expects a number, got '{value}'",
                field.id()
            ))
        })
}

impl FieldCapability for NumberFieldType {
    fn type_name(&self) -> &str {
        "number"
    }

    fn content_parts(&self) -> &'static [&'static str] {
        &["value"]
    }

    fn format_content(
        &self,
        field: &FieldDefinition,
        values: &ContentValues,
    ) -> AppResult<Option<ContentSlots>> {
        let Some(value) = part_text(values, "value") else {
            return Ok(None);
        };

        parse_number(field, &value)?;
        Ok(Some(ContentSlots::primary(value)))
    }

    fn search_predicate(
        &self,
        field: &FieldDefinition,
        criterion: &SearchCriterion,
    ) -> AppResult<ContentPredicate> {
        let field_id = field.id();
        let bound = |matcher| ContentPredicate::Matches {
            field_id,
            slot: 0,
            matcher,
        };

        match criterion.operator {
            SearchOperator::Equal => {
                let mut alternatives = Vec::with_capacity(criterion.values.len());
                for value in &criterion.values {
                    let number = parse_number(field, value)?;
                    alternatives.push(all_of(vec![
                        bound(ContentMatcher::GreaterThan(number)).negate(),
                        bound(ContentMatcher::LessThan(number)).negate(),
                        ContentPredicate::HasContent { field_id },
                    ]));
                }
                Ok(any_of(alternatives))
            }
            SearchOperator::GreaterThan | SearchOperator::LessThan => {
                let first = criterion.values.first().map(String::as_str).unwrap_or("");
                let number = parse_number(field, first)?;
                Ok(bound(if criterion.operator == SearchOperator::GreaterThan {
                    ContentMatcher::GreaterThan(number)
                } else {
                    ContentMatcher::LessThan(number)
                }))
            }
            SearchOperator::Empty => Ok(empty_predicate(field)),
            other => Err(unsupported_operator(field, other)),
        }
    }
}
