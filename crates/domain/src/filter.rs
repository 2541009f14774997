use std::str::FromStr;

use formyard_core::{AppError, AppResult, EntryId, FieldId, GroupId, UserId};
use serde::{Deserialize, Serialize};

/// Pagination directive applied on top of the stored page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageDirective {
    /// Jump to the first page.
    First,
    /// Jump to the last page.
    Last,
    /// Advance to the following page, wrapping after the last one.
    Next,
    /// Jump to a uniformly random page.
    Random,
}

impl PageDirective {
    /// Resolves the legacy numeric page code (`0`, `-1`, `-2`, `-3`).
    #[must_use]
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::First),
            -1 => Some(Self::Last),
            -2 => Some(Self::Next),
            -3 => Some(Self::Random),
            _ => None,
        }
    }

    /// Returns the legacy numeric page code.
    #[must_use]
    pub fn code(self) -> i64 {
        match self {
            Self::First => 0,
            Self::Last => -1,
            Self::Next => -2,
            Self::Random => -3,
        }
    }
}

/// Row selection policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selection {
    /// Rows in sort order.
    #[default]
    Ordered,
    /// A uniformly random subset of `page_size` rows.
    Random,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    /// Ascending order.
    #[default]
    Asc,
    /// Descending order.
    Desc,
}

/// Value an entry set can be sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum SortTarget {
    /// Creation time.
    TimeCreated,
    /// Last modification time.
    TimeModified,
    /// Entry id.
    EntryId,
    /// Owner id.
    Owner,
    /// Approval flag.
    Approved,
    /// One payload slot of a field's content.
    Field {
        /// Field to sort by.
        field_id: FieldId,
        /// Payload slot index.
        slot: u8,
    },
}

/// One key of a multi-key sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortKey {
    /// Sorted value.
    pub target: SortTarget,
    /// Sort direction.
    pub direction: SortDirection,
}

impl SortKey {
    /// Ascending key.
    #[must_use]
    pub fn asc(target: SortTarget) -> Self {
        Self {
            target,
            direction: SortDirection::Asc,
        }
    }

    /// Descending key.
    #[must_use]
    pub fn desc(target: SortTarget) -> Self {
        Self {
            target,
            direction: SortDirection::Desc,
        }
    }
}

/// Field search operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchOperator {
    /// Exact match.
    Equal,
    /// Case-insensitive substring match.
    Contains,
    /// Any of the listed options.
    AnyOf,
    /// All of the listed options.
    AllOf,
    /// Exactly the listed options and no other.
    Exactly,
    /// Numeric greater-than.
    GreaterThan,
    /// Numeric less-than.
    LessThan,
    /// No content.
    Empty,
}

impl SearchOperator {
    /// Returns the stable operator token.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Equal => "=",
            Self::Contains => "LIKE",
            Self::AnyOf => "ANY_OF",
            Self::AllOf => "ALL_OF",
            Self::Exactly => "EXACTLY",
            Self::GreaterThan => ">",
            Self::LessThan => "<",
            Self::Empty => "",
        }
    }
}

impl FromStr for SearchOperator {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "=" => Ok(Self::Equal),
            "LIKE" => Ok(Self::Contains),
            "ANY_OF" => Ok(Self::AnyOf),
            "ALL_OF" => Ok(Self::AllOf),
            "EXACTLY" => Ok(Self::Exactly),
            ">" => Ok(Self::GreaterThan),
            "<" => Ok(Self::LessThan),
            "" => Ok(Self::Empty),
            _ => Err(AppError::Validation(format!(
                "unknown search operator '{value}'"
            ))),
        }
    }
}

/// Field search criterion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchCriterion {
    /// Searched field.
    pub field_id: FieldId,
    /// Whether the criterion is negated.
    #[serde(default)]
    pub negated: bool,
    /// Search operator.
    pub operator: SearchOperator,
    /// Operator operands.
    #[serde(default)]
    pub values: Vec<String>,
}

impl SearchCriterion {
    /// Creates a non-negated criterion.
    #[must_use]
    pub fn new(field_id: FieldId, operator: SearchOperator, values: Vec<String>) -> Self {
        Self {
            field_id,
            negated: false,
            operator,
            values,
        }
    }

    /// Negates the criterion.
    #[must_use]
    pub fn negate(mut self) -> Self {
        self.negated = !self.negated;
        self
    }
}

/// Caller-supplied retrieval criteria for an entry set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSpec {
    /// Restricts both counts to entries of one owner.
    #[serde(default)]
    pub owner: Option<UserId>,
    /// Explicit owner list, honored for callers who may view all entries.
    #[serde(default)]
    pub users: Vec<UserId>,
    /// Explicit group list.
    #[serde(default)]
    pub groups: Vec<GroupId>,
    /// Explicit entry ids.
    #[serde(default)]
    pub entry_ids: Vec<EntryId>,
    /// Groups rows by the primary slot of a field and disables paging.
    #[serde(default)]
    pub group_by: Option<FieldId>,
    /// Rows per page.
    #[serde(default)]
    pub page_size: Option<u32>,
    /// Pagination directive.
    #[serde(default)]
    pub directive: Option<PageDirective>,
    /// Stored zero-based page.
    #[serde(default)]
    pub page: u64,
    /// Row selection policy.
    #[serde(default)]
    pub selection: Selection,
    /// Sort keys, applied in order.
    #[serde(default)]
    pub sort: Vec<SortKey>,
    /// Field search criteria, AND-combined.
    #[serde(default)]
    pub search: Vec<SearchCriterion>,
    /// Free-text term matched against any field content.
    #[serde(default)]
    pub quick_search: Option<String>,
    /// Fields whose content is attached to fetched rows. `None` means all.
    #[serde(default)]
    pub content_fields: Option<Vec<FieldId>>,
}

impl FilterSpec {
    /// Validates the filter before it is composed into queries.
    pub fn validate(&self) -> AppResult<()> {
        if self.page_size == Some(0) {
            return Err(AppError::Validation(
                "page size must be greater than zero".to_owned(),
            ));
        }

        if self.selection == Selection::Random && self.page_size.is_none() {
            return Err(AppError::Validation(
                "random selection requires a page size".to_owned(),
            ));
        }

        for criterion in &self.search {
            let needs_values = !matches!(criterion.operator, SearchOperator::Empty);
            if needs_values && criterion.values.iter().all(|value| value.trim().is_empty()) {
                return Err(AppError::Validation(format!(
                    "search on field '{}' with operator '{}' requires a value",
                    criterion.field_id,
                    criterion.operator.as_str()
                )));
            }
        }

        Ok(())
    }

    /// Returns whether any search clause is present.
    #[must_use]
    pub fn has_search(&self) -> bool {
        !self.search.is_empty()
            || self
                .quick_search
                .as_deref()
                .is_some_and(|term| !term.trim().is_empty())
    }

    /// Returns the trimmed quick search term, if any.
    #[must_use]
    pub fn quick_search_term(&self) -> Option<&str> {
        self.quick_search
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
    }
}
