use std::sync::Arc;

use chrono::{DateTime, Utc};
use formyard_core::{AppError, AppResult, CallerContext, ContainerId, EntryId};
use formyard_domain::{
    ContainerSettings, Entry, EntryActionKind, EntryEventKind, FieldDefinition, NoticeKind,
    ViewRef,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::AuthorizationOracle;
use crate::entry_ports::{
    ActionNotice, ActionOutcome, ActionReport, AuditEvent, AuditRepository, EntryAction,
    EntryActionRequest, EntryEvent, EntryEventPublisher, EntryRepository, PendingAction,
    PendingActionStore, TargetRef,
};
use crate::entry_set_service::{EntrySet, EntrySetService};
use crate::field_types::FieldRegistry;
use crate::team_sync_service::TeamSyncService;

mod bulk;
mod submission;
mod targets;

/// Default lifetime of a pending action awaiting confirmation.
pub const DEFAULT_PENDING_TTL_SECONDS: u32 = 900;

/// Targets left after resolution and authorization filtering.
#[derive(Debug, Default)]
struct ResolvedTargets {
    entries: Vec<Entry>,
    new_entries: u32,
}

impl ResolvedTargets {
    fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.new_entries == 0
    }

    fn entry_ids(&self) -> Vec<EntryId> {
        self.entries.iter().map(|entry| entry.id).collect()
    }
}

/// Applies bulk actions to the entries of a container.
///
/// Every action runs in two phases: the first invocation resolves the targets
/// and parks them as a [`PendingAction`]; the action is applied once it is
/// confirmed, either directly or through [`Self::commit`].
#[derive(Clone)]
pub struct EntryActionService {
    entry_sets: EntrySetService,
    entries: Arc<dyn EntryRepository>,
    authorization: Arc<dyn AuthorizationOracle>,
    registry: Arc<FieldRegistry>,
    team_sync: TeamSyncService,
    publisher: Arc<dyn EntryEventPublisher>,
    audit_repository: Arc<dyn AuditRepository>,
    pending_actions: Arc<dyn PendingActionStore>,
    pending_ttl_seconds: u32,
}

impl EntryActionService {
    /// Creates an entry action service.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        entry_sets: EntrySetService,
        entries: Arc<dyn EntryRepository>,
        authorization: Arc<dyn AuthorizationOracle>,
        registry: Arc<FieldRegistry>,
        team_sync: TeamSyncService,
        publisher: Arc<dyn EntryEventPublisher>,
        audit_repository: Arc<dyn AuditRepository>,
        pending_actions: Arc<dyn PendingActionStore>,
    ) -> Self {
        Self {
            entry_sets,
            entries,
            authorization,
            registry,
            team_sync,
            publisher,
            audit_repository,
            pending_actions,
            pending_ttl_seconds: DEFAULT_PENDING_TTL_SECONDS,
        }
    }

    /// Overrides how long pending actions stay confirmable.
    #[must_use]
    pub fn with_pending_ttl(mut self, ttl_seconds: u32) -> Self {
        self.pending_ttl_seconds = ttl_seconds.max(1);
        self
    }

    /// Resolves and authorizes the targets of a request and applies the
    /// action when `confirmed` is set.
    ///
    /// `current` is the entry set the caller is looking at. Create-or-update
    /// targets found there are reused; other existing targets are looked up
    /// again through the caller's visibility rules.
    pub async fn process(
        &self,
        caller: &CallerContext,
        request: &EntryActionRequest,
        confirmed: bool,
        current: Option<&EntrySet>,
    ) -> AppResult<ActionOutcome> {
        let (container, fields) = self.entry_sets.load_container(request.container_id).await?;
        let targets = self
            .resolve_targets(caller, &container, &fields, request, current)
            .await?;

        if targets.is_empty() {
            return Ok(ActionOutcome::NothingToDo(ActionNotice {
                kind: NoticeKind::NoEntriesForAction,
                count: 0,
            }));
        }

        if !confirmed {
            let pending = self.park(caller, request, &targets).await?;
            return Ok(ActionOutcome::ConfirmationRequired(pending));
        }

        self.apply(caller, &container, &fields, request, targets)
            .await
            .map(ActionOutcome::Completed)
    }

    /// First phase of the two-step protocol. Never applies the action.
    pub async fn propose(
        &self,
        caller: &CallerContext,
        request: &EntryActionRequest,
        current: Option<&EntrySet>,
    ) -> AppResult<ActionOutcome> {
        self.process(caller, request, false, current).await
    }

    /// Applies a pending action. Tokens are single use and only valid for the
    /// caller and container that proposed them.
    pub async fn commit(
        &self,
        caller: &CallerContext,
        container_id: ContainerId,
        token: Uuid,
    ) -> AppResult<ActionOutcome> {
        let pending = self
            .pending_actions
            .take(token)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("pending action '{token}' not found")))?;

        if pending.subject != caller.subject() {
            return Err(AppError::Forbidden(format!(
                "pending action '{token}' belongs to another caller"
            )));
        }
        if pending.request.container_id != container_id {
            return Err(AppError::Forbidden(format!(
                "pending action '{token}' belongs to container '{}'",
                pending.request.container_id
            )));
        }

        self.process(caller, &pending.request, true, None).await
    }

    async fn park(
        &self,
        caller: &CallerContext,
        request: &EntryActionRequest,
        targets: &ResolvedTargets,
    ) -> AppResult<PendingAction> {
        let mut reduced = request.clone();
        reduced.targets = targets
            .entries
            .iter()
            .map(|entry| TargetRef::Existing(entry.id))
            .collect();
        if targets.new_entries > 0 {
            reduced.targets.push(TargetRef::New(targets.new_entries));
        }

        let pending = PendingAction {
            token: Uuid::new_v4(),
            subject: caller.subject(),
            request: reduced,
            entry_ids: targets.entry_ids(),
            new_entries: targets.new_entries,
            created_at: Utc::now(),
        };
        self.pending_actions
            .save(pending.clone(), self.pending_ttl_seconds)
            .await?;

        Ok(pending)
    }

    async fn apply(
        &self,
        caller: &CallerContext,
        container: &ContainerSettings,
        fields: &[FieldDefinition],
        request: &EntryActionRequest,
        targets: ResolvedTargets,
    ) -> AppResult<ActionReport> {
        let kind = request.action.kind();
        let now = Utc::now();

        let (processed, event) = match &request.action {
            EntryAction::CreateOrUpdate { submission } => {
                self.create_or_update(
                    caller,
                    container,
                    fields,
                    &request.view,
                    submission.as_ref(),
                    targets,
                    now,
                )
                .await?
            }
            EntryAction::Duplicate => (
                self.duplicate(caller, container, targets.entries, now)
                    .await?,
                kind.event(),
            ),
            EntryAction::Approve => (
                self.set_approval(caller, container, fields, targets.entries, true, now)
                    .await?,
                kind.event(),
            ),
            EntryAction::Disapprove => (
                self.set_approval(caller, container, fields, targets.entries, false, now)
                    .await?,
                kind.event(),
            ),
            EntryAction::Delete => (
                self.delete(container, fields, targets.entries).await?,
                kind.event(),
            ),
            EntryAction::Reorder {
                node_field,
                parent,
                sibling,
            } => (
                self.reorder(fields, targets.entries, *node_field, *parent, *sibling)
                    .await?,
                kind.event(),
            ),
        };

        let processed_ids: Vec<EntryId> = processed.iter().map(|entry| entry.id).collect();
        if !processed.is_empty() {
            self.publish(kind, event, container.id(), &request.view, processed, now)
                .await;
            self.audit_repository
                .append_event(AuditEvent {
                    container_id: container.id(),
                    subject: caller.subject(),
                    action: kind.audit_action(),
                    entry_ids: processed_ids.clone(),
                    view: request.view.clone(),
                })
                .await?;
        }

        info!(
            container_id = %container.id(),
            subject = %caller.subject(),
            action = kind.as_str(),
            processed = processed_ids.len(),
            "entry action applied"
        );

        Ok(ActionReport {
            action: kind,
            notice: ActionNotice {
                kind: kind.notice(),
                count: processed_ids.len(),
            },
            processed: processed_ids,
            completion: kind.completion(),
        })
    }

    async fn publish(
        &self,
        kind: EntryActionKind,
        event_kind: EntryEventKind,
        container_id: ContainerId,
        view: &ViewRef,
        items: Vec<Entry>,
        occurred_at: DateTime<Utc>,
    ) {
        let event = EntryEvent {
            kind: event_kind,
            container_id,
            view: view.clone(),
            items,
            users: Vec::new(),
            field_name: None,
            occurred_at,
        };
        if let Err(error) = self.publisher.publish(event).await {
            warn!(
                container_id = %container_id,
                action = kind.as_str(),
                %error,
                "failed to publish entry event"
            );
        }
    }
}
