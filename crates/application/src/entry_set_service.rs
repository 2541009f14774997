use std::sync::Arc;

use formyard_core::{AppError, AppResult, CallerContext, ContainerId, EntryId, UserId};
use formyard_domain::{ContainerSettings, Entry, EntryRecord, FieldDefinition, FilterSpec};
use tracing::debug;

use crate::content_assembler::ContentAssembler;
use crate::entry_ports::{EntryRepository, EntryWindow, FormRepository, RandomSource};
use crate::field_types::FieldRegistry;
use crate::query_composer::{EntryQueryComposer, PageResolution, RetrievalMode, resolve_page};
use crate::AuthorizationOracle;

/// Entries visible to a caller together with their counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrySet {
    /// Entries the caller may see, ignoring search.
    pub authorized_count: u64,
    /// Entries the caller may see that match the search.
    pub filtered_count: u64,
    /// Retrieved entries with content.
    pub entries: Vec<EntryRecord>,
    /// Zero-based position of a single explicitly requested entry.
    pub explicit_position: Option<u64>,
    /// Resolved page for paged requests.
    pub page: Option<PageResolution>,
}

impl EntrySet {
    /// Returns the number of retrieved entries.
    #[must_use]
    pub fn displayed_count(&self) -> usize {
        self.entries.len()
    }
}

/// Application service retrieving entry sets.
#[derive(Clone)]
pub struct EntrySetService {
    entries: Arc<dyn EntryRepository>,
    forms: Arc<dyn FormRepository>,
    composer: EntryQueryComposer,
    assembler: ContentAssembler,
    random: Arc<dyn RandomSource>,
}

impl EntrySetService {
    /// Creates a new entry set service.
    #[must_use]
    pub fn new(
        entries: Arc<dyn EntryRepository>,
        forms: Arc<dyn FormRepository>,
        authorization: Arc<dyn AuthorizationOracle>,
        registry: Arc<FieldRegistry>,
        random: Arc<dyn RandomSource>,
    ) -> Self {
        Self {
            composer: EntryQueryComposer::new(authorization, registry.clone()),
            assembler: ContentAssembler::new(entries.clone(), registry),
            entries,
            forms,
            random,
        }
    }

    /// Returns the query composer.
    #[must_use]
    pub fn composer(&self) -> &EntryQueryComposer {
        &self.composer
    }

    /// Loads container settings and fields, failing for unknown containers.
    pub async fn load_container(
        &self,
        container_id: ContainerId,
    ) -> AppResult<(ContainerSettings, Vec<FieldDefinition>)> {
        let container = self
            .forms
            .find_container(container_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("container '{container_id}' not found")))?;
        let fields = self.forms.list_fields(container_id).await?;
        Ok((container, fields))
    }

    /// Retrieves the entries matching a filter for a caller.
    pub async fn fetch_entries(
        &self,
        caller: &CallerContext,
        container_id: ContainerId,
        filter: &FilterSpec,
    ) -> AppResult<EntrySet> {
        let (container, fields) = self.load_container(container_id).await?;
        self.fetch_with(caller, &container, &fields, filter).await
    }

    /// Retrieves every entry of one user the caller may see. `None` means the
    /// caller's own entries.
    pub async fn fetch_user_entries(
        &self,
        caller: &CallerContext,
        container_id: ContainerId,
        user_id: Option<UserId>,
    ) -> AppResult<EntrySet> {
        let Some(owner) = user_id.or(caller.user_id()) else {
            return Err(AppError::Validation(
                "user entries require a user or a logged-in caller".to_owned(),
            ));
        };

        let filter = FilterSpec {
            owner: Some(owner),
            ..FilterSpec::default()
        };
        self.fetch_entries(caller, container_id, &filter).await
    }

    /// Rows of the listed entries the caller may see, skipping counts, content
    /// and position lookups.
    pub(crate) async fn fetch_visible_rows(
        &self,
        caller: &CallerContext,
        container: &ContainerSettings,
        fields: &[FieldDefinition],
        entry_ids: &[EntryId],
    ) -> AppResult<Vec<Entry>> {
        if entry_ids.is_empty() {
            return Ok(Vec::new());
        }
        let filter = FilterSpec {
            entry_ids: entry_ids.to_vec(),
            ..FilterSpec::default()
        };
        let query = self
            .composer
            .compose(container, caller, &filter, fields)
            .await?;
        self.entries
            .fetch_entries(
                &query.fetch_predicate().with_entry_ids(entry_ids.to_vec()),
                &query.ordering,
                EntryWindow::all(),
            )
            .await
    }

    async fn fetch_with(
        &self,
        caller: &CallerContext,
        container: &ContainerSettings,
        fields: &[FieldDefinition],
        filter: &FilterSpec,
    ) -> AppResult<EntrySet> {
        let query = self
            .composer
            .compose(container, caller, filter, fields)
            .await?;

        let authorized_count = self.entries.count_entries(&query.authorized).await?;
        let filtered_count = match &query.filtered {
            _ if authorized_count == 0 => 0,
            Some(filtered) => self.entries.count_entries(filtered).await?,
            None => authorized_count,
        };

        let predicate = query.fetch_predicate();
        let mut explicit_position = None;
        let mut page = None;
        let rows = match &query.retrieval {
            RetrievalMode::Paged {
                page_size,
                directive,
                stored_page,
            } => {
                let resolution = resolve_page(
                    *directive,
                    *stored_page,
                    filtered_count,
                    *page_size,
                    self.random.as_ref(),
                );
                page = Some(resolution);
                if filtered_count == 0 {
                    Vec::new()
                } else {
                    self.entries
                        .fetch_entries(
                            predicate,
                            &query.ordering,
                            EntryWindow::page(resolution.page, *page_size),
                        )
                        .await?
                }
            }
            _ if filtered_count == 0 => Vec::new(),
            RetrievalMode::Explicit { entry_ids, locate } => {
                if let Some(entry_id) = locate {
                    explicit_position = self
                        .entries
                        .entry_ordinal(predicate, &query.ordering, *entry_id)
                        .await?
                        .map(|ordinal| ordinal.saturating_sub(1));
                }
                self.entries
                    .fetch_entries(
                        &predicate.with_entry_ids(entry_ids.clone()),
                        &query.ordering,
                        EntryWindow::all(),
                    )
                    .await?
            }
            RetrievalMode::RandomSubset { size } => {
                let candidates = self
                    .entries
                    .list_entry_ids(predicate, &query.ordering)
                    .await?;
                let amount = usize::try_from(*size)
                    .unwrap_or(usize::MAX)
                    .min(candidates.len());
                let chosen: Vec<EntryId> = self
                    .random
                    .sample_indices(candidates.len(), amount)
                    .into_iter()
                    .filter_map(|index| candidates.get(index).copied())
                    .collect();
                self.entries
                    .fetch_entries(
                        &predicate.with_entry_ids(chosen),
                        &query.ordering,
                        EntryWindow::all(),
                    )
                    .await?
            }
            RetrievalMode::Unbounded => {
                self.entries
                    .fetch_entries(predicate, &query.ordering, EntryWindow::all())
                    .await?
            }
        };

        let content_fields: Vec<FieldDefinition> = match &filter.content_fields {
            Some(field_ids) => fields
                .iter()
                .filter(|field| field_ids.contains(&field.id()))
                .cloned()
                .collect(),
            None => fields.to_vec(),
        };
        let entries = self.assembler.assemble(rows, &content_fields).await?;

        debug!(
            container_id = %container.id(),
            subject = %caller.subject(),
            authorized_count,
            filtered_count,
            displayed_count = entries.len(),
            "entry set fetched"
        );

        Ok(EntrySet {
            authorized_count,
            filtered_count,
            entries,
            explicit_position,
            page,
        })
    }
}

/// Request-scoped view of one entry set that remembers its filter state.
pub struct EntrySetAccessor {
    service: EntrySetService,
    caller: CallerContext,
    container_id: ContainerId,
    filter: FilterSpec,
    current: Option<EntrySet>,
}

impl EntrySetAccessor {
    /// Creates an accessor. Nothing is loaded until [`Self::load`] is called.
    #[must_use]
    pub fn new(
        service: EntrySetService,
        caller: CallerContext,
        container_id: ContainerId,
        filter: FilterSpec,
    ) -> Self {
        Self {
            service,
            caller,
            container_id,
            filter,
            current: None,
        }
    }

    /// Loads the entry set, reusing the cached one unless `refresh` is set.
    ///
    /// The resolved page is stored back into the filter and the directive is
    /// consumed, so the next load continues from the page just shown.
    pub async fn load(&mut self, refresh: bool) -> AppResult<&EntrySet> {
        if refresh || self.current.is_none() {
            let set = self
                .service
                .fetch_entries(&self.caller, self.container_id, &self.filter)
                .await?;
            if let Some(page) = set.page {
                self.filter.page = page.page;
                self.filter.directive = None;
            }
            self.current = Some(set);
        }

        self.current
            .as_ref()
            .ok_or_else(|| AppError::Internal("entry set was not loaded".to_owned()))
    }

    /// Returns the cached entry set, if loaded.
    #[must_use]
    pub fn current(&self) -> Option<&EntrySet> {
        self.current.as_ref()
    }

    /// Returns the loaded entries.
    #[must_use]
    pub fn entries(&self) -> &[EntryRecord] {
        self.current
            .as_ref()
            .map_or(&[], |set| set.entries.as_slice())
    }

    /// Returns the authorized count of the loaded set.
    #[must_use]
    pub fn authorized_count(&self) -> u64 {
        self.current.as_ref().map_or(0, |set| set.authorized_count)
    }

    /// Returns the filtered count of the loaded set.
    #[must_use]
    pub fn filtered_count(&self) -> u64 {
        self.current.as_ref().map_or(0, |set| set.filtered_count)
    }

    /// Returns the number of loaded entries.
    #[must_use]
    pub fn displayed_count(&self) -> usize {
        self.current.as_ref().map_or(0, EntrySet::displayed_count)
    }

    /// Returns a loaded entry by id.
    #[must_use]
    pub fn find(&self, entry_id: EntryId) -> Option<&EntryRecord> {
        self.entries().iter().find(|record| record.id() == entry_id)
    }

    /// Returns the current filter state.
    #[must_use]
    pub fn filter(&self) -> &FilterSpec {
        &self.filter
    }

    /// Replaces the filter and drops the cached set.
    pub fn set_filter(&mut self, filter: FilterSpec) {
        self.filter = filter;
        self.current = None;
    }
}
