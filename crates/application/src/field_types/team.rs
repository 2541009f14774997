use formyard_core::{AppError, AppResult, UserId};
use formyard_domain::{
    ContentSlots, FieldDefinition, MemberList, SearchCriterion, SearchOperator,
};
use serde_json::Value;

use super::{
    ContentValues, FieldCapability, all_of, any_of, empty_predicate, list_text,
    unsupported_operator,
};
use crate::entry_ports::{ContentMatcher, ContentPredicate};

/// Team member select field storing a JSON array of user ids.
#[derive(Debug, Clone, Copy, Default)]
pub struct TeamMemberSelectFieldType;

fn member_id(field: &FieldDefinition, value: &str) -> AppResult<UserId> {
    value.parse::<UserId>().map_err(|error| {
        AppError::Validation(format!(
            "field '{}' expects user ids: {error}",
            field.id()
        ))
    })
}

/// Decodes submitted members from an id array, a JSON array string or a
/// comma-separated list.
fn submitted_members(field: &FieldDefinition, value: &Value) -> AppResult<MemberList> {
    if let Value::String(text) = value
        && text.trim_start().starts_with('[')
    {
        return MemberList::decode(Some(text));
    }

    let members = list_text(value)
        .iter()
        .map(|item| member_id(field, item))
        .collect::<AppResult<Vec<_>>>()?;
    Ok(MemberList::new(members))
}

impl FieldCapability for TeamMemberSelectFieldType {
    fn type_name(&self) -> &str {
        "teammemberselect"
    }

    fn content_parts(&self) -> &'static [&'static str] {
        &["members"]
    }

    fn format_content(
        &self,
        field: &FieldDefinition,
        values: &ContentValues,
    ) -> AppResult<Option<ContentSlots>> {
        let members = match values.get("members") {
            Some(value) => submitted_members(field, value)?,
            None => MemberList::default(),
        };
        if members.is_empty() {
            return Ok(None);
        }

        Ok(Some(ContentSlots::primary(members.encode())))
    }

    fn search_predicate(
        &self,
        field: &FieldDefinition,
        criterion: &SearchCriterion,
    ) -> AppResult<ContentPredicate> {
        let member = |value: &String| -> AppResult<ContentPredicate> {
            Ok(ContentPredicate::Matches {
                field_id: field.id(),
                slot: 0,
                matcher: ContentMatcher::JsonArrayContains(member_id(field, value)?.get()),
            })
        };

        match criterion.operator {
            SearchOperator::Equal | SearchOperator::AnyOf => Ok(any_of(
                criterion
                    .values
                    .iter()
                    .map(member)
                    .collect::<AppResult<Vec<_>>>()?,
            )),
            SearchOperator::AllOf => Ok(all_of(
                criterion
                    .values
                    .iter()
                    .map(member)
                    .collect::<AppResult<Vec<_>>>()?,
            )),
            SearchOperator::Empty => Ok(empty_predicate(field)),
            other => Err(unsupported_operator(field, other)),
        }
    }
}
