use std::cmp::Ordering;

use formyard_core::{ContainerId, EntryId, FieldId, GroupId, UserId};
use formyard_domain::{ContentSlots, Entry, EntryStatus, SortDirection, SortKey, SortTarget};

/// Ownership clause of an entry predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnerScope {
    /// Only entries of one owner.
    Only(UserId),
    /// No entry qualifies.
    Nobody,
    /// Any owner, optionally restricted to a list and excluding one user.
    Any {
        /// Allowed owners. Empty means every owner.
        users: Vec<UserId>,
        /// Owner whose entries are hidden.
        exclude: Option<UserId>,
    },
}

/// Group clause of an entry predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupScope {
    /// Only entries of one group.
    Only(GroupId),
    /// Entries of any listed group.
    AnyOf(Vec<GroupId>),
}

/// Approval clause of an entry predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalGate {
    /// Approval state is not checked.
    Unrestricted,
    /// Approved entries or entries of the given owner.
    ApprovedOrOwner(UserId),
    /// Approved entries only.
    ApprovedOnly,
}

/// Draft visibility clause of an entry predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftGate {
    /// Drafts are visible.
    Unrestricted,
    /// Drafts are hidden unless owned by the given user.
    NotDraftOrOwner(Option<UserId>),
}

/// Comparison applied to one payload slot.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentMatcher {
    /// Exact equality.
    Equals(String),
    /// Case-insensitive substring.
    Contains(String),
    /// Numeric value greater than the operand.
    GreaterThan(f64),
    /// Numeric value less than the operand.
    LessThan(f64),
    /// JSON array holding the given integer.
    JsonArrayContains(i64),
}

impl ContentMatcher {
    /// Evaluates the matcher against a slot value.
    #[must_use]
    pub fn matches(&self, value: Option<&str>) -> bool {
        let Some(value) = value else {
            return false;
        };

        match self {
            Self::Equals(expected) => value == expected,
            Self::Contains(needle) => value.to_lowercase().contains(&needle.to_lowercase()),
            Self::GreaterThan(bound) => parse_number(value).is_some_and(|number| number > *bound),
            Self::LessThan(bound) => parse_number(value).is_some_and(|number| number < *bound),
            Self::JsonArrayContains(expected) => {
                serde_json::from_str::<Vec<serde_json::Value>>(value).is_ok_and(|items| {
                    items.iter().any(|item| match item {
                        serde_json::Value::Number(number) => number.as_i64() == Some(*expected),
                        serde_json::Value::String(text) => {
                            text.trim().parse::<i64>().ok() == Some(*expected)
                        }
                        _ => false,
                    })
                })
            }
        }
    }
}

fn parse_number(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|number| number.is_finite())
}

/// Boolean condition over the content rows of an entry.
///
/// Matchers are existential: a field predicate holds when a content row for
/// the field exists and satisfies it. Negation therefore includes entries
/// without content for the field.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentPredicate {
    /// A slot of the field's content satisfies the matcher.
    Matches {
        /// Field whose content is inspected.
        field_id: FieldId,
        /// Payload slot index.
        slot: u8,
        /// Slot comparison.
        matcher: ContentMatcher,
    },
    /// The field has non-empty primary content.
    HasContent {
        /// Field whose content is inspected.
        field_id: FieldId,
    },
    /// The primary slot of any content row contains the term.
    AnyFieldContains(String),
    /// Negation.
    Not(Box<ContentPredicate>),
    /// Conjunction.
    All(Vec<ContentPredicate>),
    /// Disjunction.
    Any(Vec<ContentPredicate>),
}

impl ContentPredicate {
    /// Negates a predicate.
    #[must_use]
    pub fn negate(self) -> Self {
        match self {
            Self::Not(inner) => *inner,
            other => Self::Not(Box::new(other)),
        }
    }

    /// Evaluates the predicate with content looked up from memory.
    pub fn matches(&self, entry_id: EntryId, lookup: &dyn ContentLookup) -> bool {
        match self {
            Self::Matches {
                field_id,
                slot,
                matcher,
            } => lookup
                .slots(entry_id, *field_id)
                .is_some_and(|slots| matcher.matches(slots.get(usize::from(*slot)))),
            Self::HasContent { field_id } => lookup
                .slots(entry_id, *field_id)
                .and_then(ContentSlots::primary_value)
                .is_some_and(|value| !value.is_empty()),
            Self::AnyFieldContains(term) => {
                let term = term.to_lowercase();
                lookup.entry_slots(entry_id).iter().any(|slots| {
                    slots
                        .primary_value()
                        .is_some_and(|value| value.to_lowercase().contains(&term))
                })
            }
            Self::Not(inner) => !inner.matches(entry_id, lookup),
            Self::All(predicates) => predicates
                .iter()
                .all(|predicate| predicate.matches(entry_id, lookup)),
            Self::Any(predicates) => predicates
                .iter()
                .any(|predicate| predicate.matches(entry_id, lookup)),
        }
    }
}

/// Content access used to evaluate predicates and orderings in memory.
pub trait ContentLookup {
    /// Returns the slots of one (entry, field) pair.
    fn slots(&self, entry_id: EntryId, field_id: FieldId) -> Option<&ContentSlots>;

    /// Returns the slots of every content row of an entry.
    fn entry_slots(&self, entry_id: EntryId) -> Vec<&ContentSlots>;
}

/// Server-side predicate selecting entries of a container.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryPredicate {
    /// Container the entries belong to.
    pub container_id: ContainerId,
    /// Ownership clause.
    pub owner: OwnerScope,
    /// Additional single-owner restriction requested by the filter.
    pub owner_filter: Option<UserId>,
    /// Group clause.
    pub group: Option<GroupScope>,
    /// Approval clause.
    pub approval: ApprovalGate,
    /// Draft visibility clause.
    pub drafts: DraftGate,
    /// Search clauses, AND-combined.
    pub search: Vec<ContentPredicate>,
    /// Explicit entry ids.
    pub entry_ids: Option<Vec<EntryId>>,
}

impl EntryPredicate {
    /// Predicate matching every entry of a container.
    #[must_use]
    pub fn container(container_id: ContainerId) -> Self {
        Self {
            container_id,
            owner: OwnerScope::Any {
                users: Vec::new(),
                exclude: None,
            },
            owner_filter: None,
            group: None,
            approval: ApprovalGate::Unrestricted,
            drafts: DraftGate::Unrestricted,
            search: Vec::new(),
            entry_ids: None,
        }
    }

    /// Returns a copy restricted to explicit ids.
    #[must_use]
    pub fn with_entry_ids(&self, entry_ids: Vec<EntryId>) -> Self {
        Self {
            entry_ids: Some(entry_ids),
            ..self.clone()
        }
    }

    /// Evaluates the entry row clauses in memory.
    #[must_use]
    pub fn matches_entry(&self, entry: &Entry) -> bool {
        if entry.container_id != self.container_id {
            return false;
        }

        let owner_ok = match &self.owner {
            OwnerScope::Only(user_id) => entry.owner_id == *user_id,
            OwnerScope::Nobody => false,
            OwnerScope::Any { users, exclude } => {
                (users.is_empty() || users.contains(&entry.owner_id))
                    && *exclude != Some(entry.owner_id)
            }
        };
        if !owner_ok {
            return false;
        }

        if self
            .owner_filter
            .is_some_and(|owner| owner != entry.owner_id)
        {
            return false;
        }

        let group_ok = match &self.group {
            None => true,
            Some(GroupScope::Only(group_id)) => entry.group_id == Some(*group_id),
            Some(GroupScope::AnyOf(groups)) => entry
                .group_id
                .is_some_and(|group_id| groups.contains(&group_id)),
        };
        if !group_ok {
            return false;
        }

        let approval_ok = match self.approval {
            ApprovalGate::Unrestricted => true,
            ApprovalGate::ApprovedOrOwner(user_id) => entry.approved || entry.owner_id == user_id,
            ApprovalGate::ApprovedOnly => entry.approved,
        };
        if !approval_ok {
            return false;
        }

        let drafts_ok = match self.drafts {
            DraftGate::Unrestricted => true,
            DraftGate::NotDraftOrOwner(user_id) => {
                entry.status != EntryStatus::Draft || Some(entry.owner_id) == user_id
            }
        };
        if !drafts_ok {
            return false;
        }

        self.entry_ids
            .as_ref()
            .is_none_or(|entry_ids| entry_ids.contains(&entry.id))
    }

    /// Evaluates the full predicate in memory.
    pub fn matches(&self, entry: &Entry, lookup: &dyn ContentLookup) -> bool {
        self.matches_entry(entry)
            && self
                .search
                .iter()
                .all(|predicate| predicate.matches(entry.id, lookup))
    }
}

/// Ordering of an entry set. Entry id ascending always breaks ties.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryOrdering {
    /// Sort keys, applied in order.
    pub keys: Vec<SortKey>,
}

impl EntryOrdering {
    /// Compares two entries in memory.
    ///
    /// Missing field values sort after present ones in ascending order.
    pub fn compare(&self, left: &Entry, right: &Entry, lookup: &dyn ContentLookup) -> Ordering {
        for key in &self.keys {
            let ordering = match key.target {
                SortTarget::TimeCreated => left.time_created.cmp(&right.time_created),
                SortTarget::TimeModified => left.time_modified.cmp(&right.time_modified),
                SortTarget::EntryId => left.id.cmp(&right.id),
                SortTarget::Owner => left.owner_id.cmp(&right.owner_id),
                SortTarget::Approved => left.approved.cmp(&right.approved),
                SortTarget::Field { field_id, slot } => {
                    let value = |entry: &Entry| {
                        lookup
                            .slots(entry.id, field_id)
                            .and_then(|slots| slots.get(usize::from(slot)))
                            .map(str::to_owned)
                    };
                    match (value(left), value(right)) {
                        (Some(left), Some(right)) => left.cmp(&right),
                        (Some(_), None) => Ordering::Less,
                        (None, Some(_)) => Ordering::Greater,
                        (None, None) => Ordering::Equal,
                    }
                }
            };
            let ordering = match key.direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }

        left.id.cmp(&right.id)
    }
}

/// Row window of a fetch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntryWindow {
    /// Rows skipped.
    pub offset: u64,
    /// Maximum rows returned. `None` means unbounded.
    pub limit: Option<u64>,
}

impl EntryWindow {
    /// Unbounded window.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Window of one page.
    #[must_use]
    pub fn page(page: u64, page_size: u32) -> Self {
        let page_size = u64::from(page_size);
        Self {
            offset: page.saturating_mul(page_size),
            limit: Some(page_size),
        }
    }
}
