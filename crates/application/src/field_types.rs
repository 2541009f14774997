//! Field type capabilities.
//!
//! Every field type maps its submitted parts onto the fixed payload slots of a
//! content row, translates search criteria into content predicates and owns
//! the persistence of its content. New types are added by registering a
//! [`FieldCapability`] under their type name.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use formyard_core::{AppError, AppResult, EntryId};
use formyard_domain::{ContentRow, ContentSlots, FieldDefinition, SearchCriterion, SearchOperator};
use serde_json::Value;

use crate::entry_ports::{ContentMatcher, ContentPredicate, EntryRepository};

mod choice;
mod file;
mod node;
mod number;
mod tag;
mod team;
mod text;
mod url;

pub use choice::{MultiSelectFieldType, SelectFieldType};
pub use file::FileFieldType;
pub use node::NodeFieldType;
pub use number::NumberFieldType;
pub use tag::TagFieldType;
pub use team::TeamMemberSelectFieldType;
pub use text::TextFieldType;
pub use url::UrlFieldType;

/// Submitted values of one field, keyed by part name.
pub type ContentValues = BTreeMap<String, Value>;

/// Behaviour of one field type.
#[async_trait]
pub trait FieldCapability: Send + Sync {
    /// Registered type name.
    fn type_name(&self) -> &str;

    /// Ordered part names mapped onto payload slots.
    fn content_parts(&self) -> &'static [&'static str];

    /// Converts submitted parts into payload slots. `None` means the field
    /// has no content and any stored row is removed.
    fn format_content(
        &self,
        field: &FieldDefinition,
        values: &ContentValues,
    ) -> AppResult<Option<ContentSlots>>;

    /// Translates a non-negated search criterion into a content predicate.
    fn search_predicate(
        &self,
        field: &FieldDefinition,
        criterion: &SearchCriterion,
    ) -> AppResult<ContentPredicate> {
        text_search_predicate(field, criterion, 0)
    }

    /// Persists submitted content for an entry.
    async fn update_content(
        &self,
        repository: &dyn EntryRepository,
        field: &FieldDefinition,
        entry_id: EntryId,
        values: &ContentValues,
    ) -> AppResult<Option<ContentRow>> {
        match self.format_content(field, values)? {
            Some(slots) => repository
                .upsert_content(entry_id, field.id(), slots)
                .await
                .map(Some),
            None => {
                repository.delete_content(entry_id, field.id()).await?;
                Ok(None)
            }
        }
    }

    /// Removes the content of an entry.
    async fn delete_content(
        &self,
        repository: &dyn EntryRepository,
        field: &FieldDefinition,
        entry_id: EntryId,
    ) -> AppResult<()> {
        repository.delete_content(entry_id, field.id()).await
    }
}

/// Registry resolving field definitions to their capability.
#[derive(Clone, Default)]
pub struct FieldRegistry {
    capabilities: HashMap<String, Arc<dyn FieldCapability>>,
}

impl FieldRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates a registry with every built-in field type.
    #[must_use]
    pub fn with_builtin_types() -> Self {
        let builtin: [Arc<dyn FieldCapability>; 9] = [
            Arc::new(TextFieldType),
            Arc::new(NumberFieldType),
            Arc::new(UrlFieldType),
            Arc::new(SelectFieldType),
            Arc::new(MultiSelectFieldType),
            Arc::new(TagFieldType),
            Arc::new(FileFieldType),
            Arc::new(NodeFieldType),
            Arc::new(TeamMemberSelectFieldType),
        ];

        Self {
            capabilities: builtin
                .into_iter()
                .map(|capability| (capability.type_name().to_owned(), capability))
                .collect(),
        }
    }

    /// Registers a capability under its type name.
    pub fn register(&mut self, capability: Arc<dyn FieldCapability>) -> AppResult<()> {
        let type_name = capability.type_name().to_owned();
        if self.capabilities.contains_key(&type_name) {
            return Err(AppError::Conflict(format!(
                "field type '{type_name}' is already registered"
            )));
        }

        self.capabilities.insert(type_name, capability);
        Ok(())
    }

    /// Returns the capability handling a field.
    pub fn capability(&self, field: &FieldDefinition) -> AppResult<&dyn FieldCapability> {
        let type_name = field.kind().type_name();
        self.capabilities
            .get(type_name)
            .map(|capability| capability.as_ref())
            .ok_or_else(|| {
                AppError::Validation(format!(
                    "field '{}' has unknown type '{type_name}'",
                    field.id()
                ))
            })
    }

    /// Translates a search criterion, applying its negation.
    pub fn search_predicate(
        &self,
        field: &FieldDefinition,
        criterion: &SearchCriterion,
    ) -> AppResult<ContentPredicate> {
        let predicate = self.capability(field)?.search_predicate(field, criterion)?;
        Ok(if criterion.negated {
            predicate.negate()
        } else {
            predicate
        })
    }
}

/// Returns a scalar submitted value as trimmed text. Blank values are `None`.
pub(crate) fn scalar_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(text) => text.trim().to_owned(),
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => if *flag { "1" } else { "0" }.to_owned(),
        Value::Null | Value::Array(_) | Value::Object(_) => return None,
    };

    (!text.is_empty()).then_some(text)
}

/// Returns a list value. Strings are split on commas.
pub(crate) fn list_text(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(scalar_text).collect(),
        Value::String(text) => text
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_owned)
            .collect(),
        other => scalar_text(other).into_iter().collect(),
    }
}

/// Returns the scalar text of a named part.
pub(crate) fn part_text(values: &ContentValues, part: &str) -> Option<String> {
    values.get(part).and_then(scalar_text)
}

/// Search on a free-text slot: `=`, `LIKE` and empty.
pub(crate) fn text_search_predicate(
    field: &FieldDefinition,
    criterion: &SearchCriterion,
    slot: u8,
) -> AppResult<ContentPredicate> {
    let field_id = field.id();
    match criterion.operator {
        SearchOperator::Equal => Ok(any_of(
            criterion
                .values
                .iter()
                .map(|value| ContentPredicate::Matches {
                    field_id,
                    slot,
                    matcher: ContentMatcher::Equals(value.trim().to_owned()),
                })
                .collect(),
        )),
        SearchOperator::Contains => Ok(any_of(
            criterion
                .values
                .iter()
                .map(|value| ContentPredicate::Matches {
                    field_id,
                    slot,
                    matcher: ContentMatcher::Contains(value.trim().to_owned()),
                })
                .collect(),
        )),
        SearchOperator::Empty => Ok(empty_predicate(field)),
        other => Err(unsupported_operator(field, other)),
    }
}

/// Predicate for "field has no content".
pub(crate) fn empty_predicate(field: &FieldDefinition) -> ContentPredicate {
    ContentPredicate::HasContent {
        field_id: field.id(),
    }
    .negate()
}

pub(crate) fn any_of(mut predicates: Vec<ContentPredicate>) -> ContentPredicate {
    if predicates.len() == 1 {
        return predicates.remove(0);
    }
    ContentPredicate::Any(predicates)
}

pub(crate) fn all_of(mut predicates: Vec<ContentPredicate>) -> ContentPredicate {
    if predicates.len() == 1 {
        return predicates.remove(0);
    }
    ContentPredicate::All(predicates)
}

pub(crate) fn unsupported_operator(field: &FieldDefinition, operator: SearchOperator) -> AppError {
    AppError::Validation(format!(
        "field '{}' of type '{}' does not support search operator '{}'",
        field.id(),
        field.kind().type_name(),
        operator.as_str()
    ))
}
