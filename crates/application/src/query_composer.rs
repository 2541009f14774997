use std::sync::Arc;

use formyard_core::{AppError, AppResult, CallerContext, EntryId, FieldId, GUEST_USER_ID};
use formyard_domain::{
    ContainerSettings, FieldDefinition, FilterSpec, PageDirective, Selection, SortKey, SortTarget,
};

use crate::AuthorizationOracle;
use crate::entry_ports::{
    ApprovalGate, ContentPredicate, DraftGate, EntryOrdering, EntryPredicate, GroupScope,
    OwnerScope, RandomSource,
};
use crate::field_types::FieldRegistry;

/// How rows are retrieved once counts are known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetrievalMode {
    /// Exactly the listed ids that pass the filtered predicate.
    Explicit {
        /// Requested ids.
        entry_ids: Vec<EntryId>,
        /// Single requested id whose position is computed.
        locate: Option<EntryId>,
    },
    /// Random sample of at most `size` matching rows.
    RandomSubset {
        /// Sample size.
        size: u32,
    },
    /// One page of the ordered matches.
    Paged {
        /// Rows per page.
        page_size: u32,
        /// Directive evaluated against the page count.
        directive: Option<PageDirective>,
        /// Page stored from the previous request.
        stored_page: u64,
    },
    /// Every matching row.
    Unbounded,
}

/// Count and fetch plan for one entry set request.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedEntryQuery {
    /// Visibility clauses only.
    pub authorized: EntryPredicate,
    /// Visibility and search clauses. `None` when no search applies.
    pub filtered: Option<EntryPredicate>,
    /// Row ordering shared by fetches and position lookups.
    pub ordering: EntryOrdering,
    /// Retrieval mode.
    pub retrieval: RetrievalMode,
}

impl ComposedEntryQuery {
    /// Returns the predicate rows are fetched with.
    #[must_use]
    pub fn fetch_predicate(&self) -> &EntryPredicate {
        self.filtered.as_ref().unwrap_or(&self.authorized)
    }
}

/// Resolved page of a paged request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageResolution {
    /// Zero-based page to fetch.
    pub page: u64,
    /// Number of pages, at least 1.
    pub num_pages: u64,
}

/// Resolves a pagination directive against the filtered count.
///
/// `Next` advances from the stored page and wraps after the last page.
/// Without a directive the stored page is used as-is.
pub fn resolve_page(
    directive: Option<PageDirective>,
    stored_page: u64,
    filtered_count: u64,
    page_size: u32,
    random: &dyn RandomSource,
) -> PageResolution {
    let page_size = u64::from(page_size.max(1));
    let num_pages = filtered_count.div_ceil(page_size).max(1);

    let page = match directive {
        Some(PageDirective::First) => 0,
        Some(PageDirective::Last) => num_pages - 1,
        Some(PageDirective::Next) => stored_page.saturating_add(1) % num_pages,
        Some(PageDirective::Random) if num_pages > 1 => random.index_below(num_pages),
        Some(PageDirective::Random) => 0,
        None => stored_page,
    };

    PageResolution { page, num_pages }
}

/// Translates a filter specification and caller into count and fetch plans.
#[derive(Clone)]
pub struct EntryQueryComposer {
    authorization: Arc<dyn AuthorizationOracle>,
    registry: Arc<FieldRegistry>,
}

impl EntryQueryComposer {
    /// Creates a composer.
    #[must_use]
    pub fn new(authorization: Arc<dyn AuthorizationOracle>, registry: Arc<FieldRegistry>) -> Self {
        Self {
            authorization,
            registry,
        }
    }

    /// Builds the visibility predicate of a caller, without search clauses.
    pub async fn authorized_predicate(
        &self,
        container: &ContainerSettings,
        caller: &CallerContext,
        filter: &FilterSpec,
    ) -> AppResult<EntryPredicate> {
        let container_id = container.id();
        let can_view_all = self.authorization.can_view_all(caller, container_id).await?;

        let owner = if !can_view_all {
            caller.user_id().map_or(OwnerScope::Nobody, OwnerScope::Only)
        } else {
            let can_view_anonymous = self
                .authorization
                .can_view_anonymous(caller, container_id)
                .await?;
            OwnerScope::Any {
                users: filter.users.clone(),
                exclude: (!can_view_anonymous).then_some(GUEST_USER_ID),
            }
        };

        let group = match caller.active_group() {
            Some(group_id) => Some(GroupScope::Only(group_id)),
            None if !filter.groups.is_empty() => Some(GroupScope::AnyOf(filter.groups.clone())),
            None => None,
        };

        let approval = if container.approval_required()
            && !self
                .authorization
                .can_manage_all(caller, container_id)
                .await?
        {
            caller
                .user_id()
                .map_or(ApprovalGate::ApprovedOnly, ApprovalGate::ApprovedOrOwner)
        } else {
            ApprovalGate::Unrestricted
        };

        let drafts = if self
            .authorization
            .can_view_drafts(caller, container_id)
            .await?
        {
            DraftGate::Unrestricted
        } else {
            DraftGate::NotDraftOrOwner(caller.user_id())
        };

        Ok(EntryPredicate {
            container_id,
            owner,
            owner_filter: filter.owner,
            group,
            approval,
            drafts,
            search: Vec::new(),
            entry_ids: None,
        })
    }

    /// Composes the count and fetch plan of a request.
    pub async fn compose(
        &self,
        container: &ContainerSettings,
        caller: &CallerContext,
        filter: &FilterSpec,
        fields: &[FieldDefinition],
    ) -> AppResult<ComposedEntryQuery> {
        filter.validate()?;

        let authorized = self.authorized_predicate(container, caller, filter).await?;
        let search = self.search_predicates(filter, fields)?;
        let filtered = (!search.is_empty()).then(|| EntryPredicate {
            search,
            ..authorized.clone()
        });

        Ok(ComposedEntryQuery {
            authorized,
            filtered,
            ordering: Self::ordering(filter, fields)?,
            retrieval: Self::retrieval(filter),
        })
    }

    fn search_predicates(
        &self,
        filter: &FilterSpec,
        fields: &[FieldDefinition],
    ) -> AppResult<Vec<ContentPredicate>> {
        let mut predicates = Vec::with_capacity(filter.search.len() + 1);
        for criterion in &filter.search {
            let field = find_field(fields, criterion.field_id)?;
            predicates.push(self.registry.search_predicate(field, criterion)?);
        }

        if let Some(term) = filter.quick_search_term() {
            predicates.push(ContentPredicate::AnyFieldContains(term.to_owned()));
        }

        Ok(predicates)
    }

    fn ordering(filter: &FilterSpec, fields: &[FieldDefinition]) -> AppResult<EntryOrdering> {
        let mut keys = Vec::with_capacity(filter.sort.len() + 1);
        if let Some(field_id) = filter.group_by {
            find_field(fields, field_id)?;
            keys.push(SortKey::asc(SortTarget::Field { field_id, slot: 0 }));
        }

        for key in &filter.sort {
            if let SortTarget::Field { field_id, .. } = key.target {
                find_field(fields, field_id)?;
            }
            keys.push(*key);
        }

        if filter.sort.is_empty() {
            keys.push(SortKey::asc(SortTarget::TimeCreated));
        }

        Ok(EntryOrdering { keys })
    }

    fn retrieval(filter: &FilterSpec) -> RetrievalMode {
        if !filter.entry_ids.is_empty() {
            let locate = match filter.entry_ids.as_slice() {
                [entry_id] => Some(*entry_id),
                _ => None,
            };
            return RetrievalMode::Explicit {
                entry_ids: filter.entry_ids.clone(),
                locate,
            };
        }

        match (filter.page_size, filter.group_by) {
            (Some(size), None) if filter.selection == Selection::Random => {
                RetrievalMode::RandomSubset { size }
            }
            (Some(page_size), None) => RetrievalMode::Paged {
                page_size,
                directive: filter.directive,
                stored_page: filter.page,
            },
            _ => RetrievalMode::Unbounded,
        }
    }
}

fn find_field(fields: &[FieldDefinition], field_id: FieldId) -> AppResult<&FieldDefinition> {
    fields
        .iter()
        .find(|field| field.id() == field_id)
        .ok_or_else(|| AppError::Validation(format!("unknown field '{field_id}' in filter")))
}

#[cfg(test)]
mod tests;
