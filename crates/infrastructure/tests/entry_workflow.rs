//! End-to-end entry workflows over the in-memory adapters.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use formyard_application::{
    ActionOutcome, AuditEvent, AuditRepository, CapabilityAuthorizationOracle, ClaimedEntryEvent,
    EntryAction, EntryActionRequest, EntryActionService, EntryEventDispatcher,
    EntryEventRelayService, EntryKey, EntrySetAccessor, EntrySetService, FieldRegistry, Submission,
    SubmittedField, SubmittedValue, TargetRef, TeamSyncService,
};
use formyard_core::{AppError, AppResult, CallerContext, ContainerId, EntryId, FieldId, UserId};
use formyard_domain::{
    Capability, ContainerSettings, EntryEventKind, EntryLimit, FieldDefinition, FieldKind,
    FilterSpec, NoticeKind, PageDirective, SearchCriterion, SearchOperator, TeamCorrelation,
    TeamSelectorConfig, UserSummary, ViewRef,
};
use formyard_infrastructure::{
    InMemoryCapabilityRepository, InMemoryEntryEventOutbox, InMemoryEntryRepository,
    InMemoryFormRepository, InMemoryPendingActionStore, InMemoryUserDirectory, ThreadRandomSource,
};
use serde_json::Value;

const PROJECT: FieldId = FieldId::new(1);
const BUDGET: FieldId = FieldId::new(2);
const TEAM: FieldId = FieldId::new(3);

fn container_id() -> ContainerId {
    ContainerId::new(1)
}

fn manager() -> CallerContext {
    CallerContext::authenticated(UserId::new(3), "Manager")
}

fn writer(id: i64) -> CallerContext {
    CallerContext::authenticated(UserId::new(id), format!("Writer {id}"))
}

struct Harness {
    entry_sets: EntrySetService,
    actions: EntryActionService,
    outbox: Arc<InMemoryEntryEventOutbox>,
}

struct NullAuditRepository;

#[async_trait]
impl AuditRepository for NullAuditRepository {
    async fn append_event(&self, _event: AuditEvent) -> AppResult<()> {
        Ok(())
    }
}

async fn harness(max_entries: EntryLimit) -> Harness {
    let forms = Arc::new(InMemoryFormRepository::new());
    forms
        .save_container(
            ContainerSettings::new(container_id(), "Projects", true, max_entries, None)
                .unwrap_or_else(|_| unreachable!()),
        )
        .await;
    for (id, name, kind) in [
        (PROJECT, "Project", FieldKind::Text),
        (BUDGET, "Budget", FieldKind::Number),
        (
            TEAM,
            "Team",
            FieldKind::TeamMemberSelect(TeamSelectorConfig {
                correlation: TeamCorrelation::Field(PROJECT),
                notify_members: true,
            }),
        ),
    ] {
        forms
            .save_field(
                FieldDefinition::new(id, container_id(), name, kind)
                    .unwrap_or_else(|_| unreachable!()),
            )
            .await;
    }

    let grants = Arc::new(InMemoryCapabilityRepository::new());
    for capability in [
        Capability::ManageEntries,
        Capability::ViewAllEntries,
        Capability::ApproveEntries,
    ] {
        grants
            .grant(container_id(), manager().subject(), capability)
            .await;
    }
    for user in [4, 5] {
        grants
            .grant(container_id(), writer(user).subject(), Capability::WriteEntry)
            .await;
    }

    let users = Arc::new(InMemoryUserDirectory::new());
    for id in [4, 5] {
        users
            .save_user(UserSummary {
                id: UserId::new(id),
                display_name: format!("Writer {id}"),
                email: Some(format!("writer{id}@example.test")),
            })
            .await;
    }

    let entries = Arc::new(InMemoryEntryRepository::new());
    let outbox = Arc::new(InMemoryEntryEventOutbox::new());
    let authorization = Arc::new(CapabilityAuthorizationOracle::new(grants));
    let registry = Arc::new(FieldRegistry::with_builtin_types());

    let entry_sets = EntrySetService::new(
        entries.clone(),
        forms,
        authorization.clone(),
        registry.clone(),
        Arc::new(ThreadRandomSource::new()),
    );
    let team_sync = TeamSyncService::new(entries.clone(), users, outbox.clone());
    let actions = EntryActionService::new(
        entry_sets.clone(),
        entries,
        authorization,
        registry,
        team_sync,
        outbox.clone(),
        Arc::new(NullAuditRepository),
        Arc::new(InMemoryPendingActionStore::new()),
    );

    Harness {
        entry_sets,
        actions,
        outbox,
    }
}

fn content(entry: u32, field: FieldId, value: &str) -> SubmittedValue {
    SubmittedValue {
        entry: EntryKey::Placeholder(entry),
        field: SubmittedField::Content(field),
        part: None,
        value: Value::String(value.to_owned()),
    }
}

fn create_request(values: Vec<SubmittedValue>, new_entries: u32) -> EntryActionRequest {
    EntryActionRequest {
        container_id: container_id(),
        view: ViewRef::new(Some(1), "list"),
        action: EntryAction::CreateOrUpdate {
            submission: Some(Submission { values }),
        },
        targets: vec![TargetRef::New(new_entries)],
    }
}

fn processed(outcome: AppResult<ActionOutcome>) -> Vec<EntryId> {
    match outcome {
        Ok(ActionOutcome::Completed(report)) => report.processed,
        other => panic!("expected a completed action, got {other:?}"),
    }
}

#[tokio::test]
async fn approved_team_entry_reaches_every_member() {
    let harness = harness(EntryLimit::Unlimited).await;

    let proposal = harness
        .actions
        .propose(
            &writer(4),
            &create_request(
                vec![
                    content(1, PROJECT, "Apollo"),
                    content(1, BUDGET, "1200"),
                    content(1, TEAM, "[5]"),
                ],
                1,
            ),
            None,
        )
        .await;
    let token = match proposal {
        Ok(ActionOutcome::ConfirmationRequired(pending)) => pending.token,
        other => panic!("expected a pending action, got {other:?}"),
    };

    let created = processed(
        harness
            .actions
            .commit(&writer(4), container_id(), token)
            .await,
    );
    assert_eq!(created.len(), 1);

    let own = harness
        .entry_sets
        .fetch_entries(&writer(4), container_id(), &FilterSpec::default())
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(own.entries.len(), 1);
    assert!(!own.entries[0].entry.approved);

    let approved = processed(
        harness
            .actions
            .process(
                &manager(),
                &EntryActionRequest {
                    container_id: container_id(),
                    view: ViewRef::new(Some(1), "list"),
                    action: EntryAction::Approve,
                    targets: vec![TargetRef::Existing(created[0])],
                },
                true,
                None,
            )
            .await,
    );
    assert_eq!(approved.len(), 2);

    let member_view = harness
        .entry_sets
        .fetch_user_entries(&writer(5), container_id(), None)
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(member_view.entries.len(), 1);
    let copy = &member_view.entries[0];
    assert!(copy.entry.approved);
    assert_eq!(copy.content.part(PROJECT, "text"), Some("Apollo"));
    assert_eq!(copy.content.part(TEAM, "members"), Some("[4]"));

    let kinds: Vec<EntryEventKind> = harness
        .outbox
        .published()
        .await
        .into_iter()
        .map(|event| event.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![
            EntryEventKind::MemberAdded,
            EntryEventKind::MemberRemoved,
            EntryEventKind::EntryAdded,
            EntryEventKind::EntryApproved,
        ]
    );
}

#[tokio::test]
async fn search_paging_walks_the_filtered_entries() {
    let harness = harness(EntryLimit::Unlimited).await;
    let values = (1..=5)
        .map(|index| content(index, BUDGET, &(index * 100).to_string()))
        .collect();
    let created = processed(
        harness
            .actions
            .process(&manager(), &create_request(values, 5), true, None)
            .await,
    );
    assert_eq!(created.len(), 5);

    let filter = FilterSpec {
        page_size: Some(2),
        search: vec![SearchCriterion::new(
            BUDGET,
            SearchOperator::GreaterThan,
            vec!["250".to_owned()],
        )],
        ..FilterSpec::default()
    };
    let mut accessor = EntrySetAccessor::new(
        harness.entry_sets.clone(),
        manager(),
        container_id(),
        filter,
    );

    let first = accessor
        .load(false)
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(first.authorized_count, 5);
    assert_eq!(first.filtered_count, 3);
    assert_eq!(first.displayed_count(), 2);

    let mut next = accessor.filter().clone();
    next.directive = Some(PageDirective::Next);
    accessor.set_filter(next);
    let second = accessor
        .load(false)
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(second.displayed_count(), 1);
    assert_eq!(
        second.entries[0].content.part(BUDGET, "value"),
        Some("500")
    );
}

#[tokio::test]
async fn writers_are_held_to_their_quota() {
    let harness = harness(EntryLimit::AtMost(2)).await;
    let values = (1..=3)
        .map(|index| content(index, PROJECT, &format!("Draft {index}")))
        .collect();

    let created = processed(
        harness
            .actions
            .process(&writer(4), &create_request(values, 3), true, None)
            .await,
    );
    assert_eq!(created.len(), 2);

    let again = harness
        .actions
        .process(
            &writer(4),
            &create_request(vec![content(1, PROJECT, "One more")], 1),
            true,
            None,
        )
        .await;
    assert!(matches!(
        again,
        Ok(ActionOutcome::NothingToDo(notice)) if notice.kind == NoticeKind::NoEntriesForAction
    ));
}

struct FlakyDispatcher {
    calls: AtomicUsize,
}

#[async_trait]
impl EntryEventDispatcher for FlakyDispatcher {
    async fn dispatch(&self, _event: &ClaimedEntryEvent) -> AppResult<()> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(AppError::Internal("webhook unavailable".to_owned()));
        }
        Ok(())
    }
}

#[tokio::test]
async fn relay_retries_until_every_event_is_delivered() {
    let harness = harness(EntryLimit::Unlimited).await;
    let created = processed(
        harness
            .actions
            .process(
                &manager(),
                &create_request(vec![content(1, PROJECT, "Gemini")], 1),
                true,
                None,
            )
            .await,
    );
    processed(
        harness
            .actions
            .process(
                &manager(),
                &EntryActionRequest {
                    container_id: container_id(),
                    view: ViewRef::new(Some(1), "list"),
                    action: EntryAction::Delete,
                    targets: vec![TargetRef::Existing(created[0])],
                },
                true,
                None,
            )
            .await,
    );

    let relay = EntryEventRelayService::new(
        harness.outbox.clone(),
        Arc::new(FlakyDispatcher {
            calls: AtomicUsize::new(0),
        }),
    )
    .with_max_delivery_attempts(3);

    let first = relay
        .relay_batch("worker-1", 10, 30)
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(first.claimed, 2);
    assert_eq!(first.retried, 1);
    assert_eq!(first.delivered, 1);

    let second = relay
        .relay_batch("worker-1", 10, 30)
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(second.claimed, 1);
    assert_eq!(second.delivered, 1);
    assert_eq!(harness.outbox.dead_count().await, 0);
}
