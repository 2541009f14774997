use std::sync::Arc;

use formyard_core::{CallerContext, EntryId, FieldId, GUEST_USER_ID, GroupId, UserId};
use formyard_domain::{
    EntryLimit, FieldKind, FilterSpec, PageDirective, SearchCriterion, SearchOperator, Selection,
    SortKey, SortTarget,
};
use proptest::prelude::*;

use super::{EntryQueryComposer, RetrievalMode, resolve_page};
use crate::entry_ports::{ApprovalGate, ContentPredicate, DraftGate, GroupScope, OwnerScope};
use crate::field_types::FieldRegistry;
use crate::test_support::{FakeOracle, FixedRandom, field, settings, user};

fn composer(oracle: FakeOracle) -> EntryQueryComposer {
    EntryQueryComposer::new(
        Arc::new(oracle),
        Arc::new(FieldRegistry::with_builtin_types()),
    )
}

#[tokio::test]
async fn caller_without_view_all_sees_only_own_entries() {
    let composer = composer(FakeOracle::default());
    let filter = FilterSpec {
        users: vec![UserId::new(9)],
        ..FilterSpec::default()
    };

    let query = composer
        .compose(&settings(true, EntryLimit::Unlimited), &user(4), &filter, &[])
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(query.authorized.owner, OwnerScope::Only(UserId::new(4)));
    assert_eq!(
        query.authorized.approval,
        ApprovalGate::ApprovedOrOwner(UserId::new(4))
    );
    assert_eq!(
        query.authorized.drafts,
        DraftGate::NotDraftOrOwner(Some(UserId::new(4)))
    );
    assert!(query.filtered.is_none());
}

#[tokio::test]
async fn anonymous_caller_only_gets_approved_branch() {
    let composer = composer(FakeOracle::default());
    let query = composer
        .compose(
            &settings(true, EntryLimit::Unlimited),
            &CallerContext::anonymous(),
            &FilterSpec::default(),
            &[],
        )
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(query.authorized.owner, OwnerScope::Nobody);
    assert_eq!(query.authorized.approval, ApprovalGate::ApprovedOnly);
}

#[tokio::test]
async fn viewer_lists_users_and_hides_guest_entries() {
    let composer = composer(FakeOracle {
        viewers: vec![2],
        ..FakeOracle::default()
    });
    let filter = FilterSpec {
        users: vec![UserId::new(5), UserId::new(6)],
        groups: vec![GroupId::new(3)],
        ..FilterSpec::default()
    };

    let query = composer
        .compose(&settings(false, EntryLimit::Unlimited), &user(2), &filter, &[])
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(
        query.authorized.owner,
        OwnerScope::Any {
            users: vec![UserId::new(5), UserId::new(6)],
            exclude: Some(GUEST_USER_ID),
        }
    );
    assert_eq!(
        query.authorized.group,
        Some(GroupScope::AnyOf(vec![GroupId::new(3)]))
    );
    assert_eq!(query.authorized.approval, ApprovalGate::Unrestricted);
}

#[tokio::test]
async fn active_group_overrides_filter_groups() {
    let composer = composer(FakeOracle::default());
    let caller = user(4).with_active_group(GroupId::new(8));
    let filter = FilterSpec {
        groups: vec![GroupId::new(3)],
        ..FilterSpec::default()
    };

    let query = composer
        .compose(&settings(false, EntryLimit::Unlimited), &caller, &filter, &[])
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(query.authorized.group, Some(GroupScope::Only(GroupId::new(8))));
}

#[tokio::test]
async fn search_only_affects_filtered_predicate() {
    let composer = composer(FakeOracle::default());
    let fields = vec![field(1, "Title", FieldKind::Text)];
    let filter = FilterSpec {
        search: vec![SearchCriterion::new(
            FieldId::new(1),
            SearchOperator::Contains,
            vec!["report".to_owned()],
        )],
        quick_search: Some(" budget ".to_owned()),
        ..FilterSpec::default()
    };

    let query = composer
        .compose(&settings(false, EntryLimit::Unlimited), &user(4), &filter, &fields)
        .await
        .unwrap_or_else(|_| unreachable!());

    assert!(query.authorized.search.is_empty());
    let filtered = query.filtered.unwrap_or_else(|| unreachable!());
    assert_eq!(filtered.search.len(), 2);
    assert_eq!(
        filtered.search[1],
        ContentPredicate::AnyFieldContains("budget".to_owned())
    );
}

#[tokio::test]
async fn search_on_unknown_field_is_rejected() {
    let composer = composer(FakeOracle::default());
    let filter = FilterSpec {
        search: vec![SearchCriterion::new(
            FieldId::new(42),
            SearchOperator::Equal,
            vec!["x".to_owned()],
        )],
        ..FilterSpec::default()
    };

    let result = composer
        .compose(&settings(false, EntryLimit::Unlimited), &user(4), &filter, &[])
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn retrieval_modes_follow_precedence() {
    let composer = composer(FakeOracle::default());
    let container = settings(false, EntryLimit::Unlimited);
    let fields = vec![field(1, "Category", FieldKind::Text)];

    let explicit = FilterSpec {
        entry_ids: vec![EntryId::new(3), EntryId::new(4)],
        page_size: Some(2),
        selection: Selection::Random,
        ..FilterSpec::default()
    };
    let random = FilterSpec {
        page_size: Some(2),
        selection: Selection::Random,
        ..FilterSpec::default()
    };
    let grouped = FilterSpec {
        page_size: Some(2),
        group_by: Some(FieldId::new(1)),
        ..FilterSpec::default()
    };
    let paged = FilterSpec {
        page_size: Some(2),
        directive: Some(PageDirective::Last),
        page: 1,
        ..FilterSpec::default()
    };

    let mode = |filter: FilterSpec| {
        let composer = composer.clone();
        let container = container.clone();
        let fields = fields.clone();
        async move {
            composer
                .compose(&container, &user(4), &filter, &fields)
                .await
                .map(|query| query.retrieval)
                .unwrap_or(RetrievalMode::Unbounded)
        }
    };

    assert_eq!(
        mode(explicit).await,
        RetrievalMode::Explicit {
            entry_ids: vec![EntryId::new(3), EntryId::new(4)],
            locate: None,
        }
    );
    assert_eq!(mode(random).await, RetrievalMode::RandomSubset { size: 2 });
    assert_eq!(mode(grouped).await, RetrievalMode::Unbounded);
    assert_eq!(
        mode(paged).await,
        RetrievalMode::Paged {
            page_size: 2,
            directive: Some(PageDirective::Last),
            stored_page: 1,
        }
    );
    assert_eq!(mode(FilterSpec::default()).await, RetrievalMode::Unbounded);
}

#[tokio::test]
async fn grouping_sorts_by_group_field_first() {
    let composer = composer(FakeOracle::default());
    let fields = vec![field(1, "Category", FieldKind::Text)];
    let filter = FilterSpec {
        group_by: Some(FieldId::new(1)),
        sort: vec![SortKey::desc(SortTarget::TimeModified)],
        ..FilterSpec::default()
    };

    let query = composer
        .compose(&settings(false, EntryLimit::Unlimited), &user(4), &filter, &fields)
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(
        query.ordering.keys,
        vec![
            SortKey::asc(SortTarget::Field {
                field_id: FieldId::new(1),
                slot: 0,
            }),
            SortKey::desc(SortTarget::TimeModified),
        ]
    );
}

#[test]
fn last_page_of_five_entries_in_pages_of_two() {
    let resolution = resolve_page(Some(PageDirective::Last), 0, 5, 2, &FixedRandom::default());
    assert_eq!(resolution.num_pages, 3);
    assert_eq!(resolution.page, 2);
}

#[test]
fn empty_result_still_has_one_page() {
    let resolution = resolve_page(Some(PageDirective::Last), 0, 0, 10, &FixedRandom::default());
    assert_eq!(resolution.num_pages, 1);
    assert_eq!(resolution.page, 0);
}

#[test]
fn next_on_last_page_wraps_to_first() {
    let resolution = resolve_page(Some(PageDirective::Next), 2, 5, 2, &FixedRandom::default());
    assert_eq!(resolution.page, 0);

    let advanced = resolve_page(Some(PageDirective::Next), 0, 5, 2, &FixedRandom::default());
    assert_eq!(advanced.page, 1);
}

#[test]
fn no_directive_keeps_stored_page() {
    let resolution = resolve_page(None, 7, 5, 2, &FixedRandom::default());
    assert_eq!(resolution.page, 7);
}

proptest! {
    #[test]
    fn random_page_with_single_page_is_zero(count in 0_u64..20, extra in 0_u32..50, seed in any::<u64>()) {
        let page_size = u32::try_from(count).unwrap_or(u32::MAX) + extra + 1;
        let resolution = resolve_page(
            Some(PageDirective::Random),
            3,
            count,
            page_size,
            &FixedRandom::returning(seed),
        );
        prop_assert_eq!(resolution.num_pages, 1);
        prop_assert_eq!(resolution.page, 0);
    }

    #[test]
    fn resolved_directive_pages_stay_in_range(
        count in 0_u64..500,
        page_size in 1_u32..40,
        stored in 0_u64..100,
        seed in any::<u64>(),
    ) {
        for directive in [PageDirective::First, PageDirective::Last, PageDirective::Next, PageDirective::Random] {
            let resolution = resolve_page(
                Some(directive),
                stored,
                count,
                page_size,
                &FixedRandom::returning(seed),
            );
            prop_assert!(resolution.page < resolution.num_pages);
            prop_assert_eq!(resolution.num_pages, count.div_ceil(u64::from(page_size)).max(1));
        }
    }
}
