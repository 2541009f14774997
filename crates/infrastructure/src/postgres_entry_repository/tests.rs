use chrono::{Duration, Utc};
use formyard_application::{
    ContentMatcher, ContentPredicate, EntryOrdering, EntryPredicate, EntryRepository, EntryWindow,
};
use formyard_core::{ContainerId, EntryId, FieldId, UserId};
use formyard_domain::{ContentSlots, Entry, NewEntry, SortKey, SortTarget};
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;

use super::PostgresEntryRepository;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

async fn test_pool() -> Option<PgPool> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        return None;
    };

    let pool = match PgPoolOptions::new()
        .max_connections(2)
        .connect(database_url.as_str())
        .await
    {
        Ok(pool) => pool,
        Err(error) => panic!("failed to connect to DATABASE_URL in test: {error}"),
    };

    if let Err(error) = MIGRATOR.run(&pool).await {
        panic!("failed to run migrations for postgres entry tests: {error}");
    }

    Some(pool)
}

async fn create_container(pool: &PgPool, name: &str) -> ContainerId {
    let id = sqlx::query_scalar::<_, i64>("INSERT INTO containers (name) VALUES ($1) RETURNING id")
        .bind(name)
        .fetch_one(pool)
        .await;

    ContainerId::new(id.unwrap_or_else(|error| panic!("failed to create container: {error}")))
}

async fn insert(
    repository: &PostgresEntryRepository,
    container_id: ContainerId,
    owner: i64,
    title: Option<&str>,
) -> Entry {
    let mut new_entry = NewEntry::blank(container_id, UserId::new(owner), None, Utc::now());
    new_entry.approved = true;
    let entry = repository
        .insert_entry(new_entry)
        .await
        .unwrap_or_else(|_| unreachable!());

    if let Some(title) = title {
        let saved = repository
            .upsert_content(entry.id, FieldId::new(1), ContentSlots::primary(title))
            .await;
        assert!(saved.is_ok());
    }

    entry
}

#[tokio::test]
async fn search_and_field_sort_follow_in_memory_semantics() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let repository = PostgresEntryRepository::new(pool.clone());
    let container_id = create_container(&pool, "Search").await;
    let beta = insert(&repository, container_id, 3, Some("Beta 10%")).await;
    let alpha = insert(&repository, container_id, 3, Some("alpha")).await;
    let empty = insert(&repository, container_id, 4, None).await;

    let mut predicate = EntryPredicate::container(container_id);
    predicate.search.push(ContentPredicate::Matches {
        field_id: FieldId::new(1),
        slot: 0,
        matcher: ContentMatcher::Contains("10%".to_owned()),
    });
    let count = repository.count_entries(&predicate).await;
    assert_eq!(count.ok(), Some(1));

    let mut negated = EntryPredicate::container(container_id);
    negated.search.push(
        ContentPredicate::Matches {
            field_id: FieldId::new(1),
            slot: 0,
            matcher: ContentMatcher::Contains("beta".to_owned()),
        }
        .negate(),
    );
    let ids = repository
        .list_entry_ids(&negated, &EntryOrdering::default())
        .await;
    assert_eq!(ids.ok(), Some(vec![alpha.id, empty.id]));

    let ordering = EntryOrdering {
        keys: vec![SortKey::asc(SortTarget::Field {
            field_id: FieldId::new(1),
            slot: 0,
        })],
    };
    let all = EntryPredicate::container(container_id);
    let sorted = repository
        .fetch_entries(&all, &ordering, EntryWindow::all())
        .await
        .unwrap_or_else(|_| unreachable!());
    let sorted_ids: Vec<EntryId> = sorted.iter().map(|entry| entry.id).collect();
    assert_eq!(sorted_ids, vec![beta.id, alpha.id, empty.id]);

    let ordinal = repository.entry_ordinal(&all, &ordering, alpha.id).await;
    assert_eq!(ordinal.ok(), Some(Some(2)));

    let page = repository
        .fetch_entries(&all, &ordering, EntryWindow::page(1, 2))
        .await;
    assert_eq!(page.ok().map(|entries| entries.len()), Some(1));
}

#[tokio::test]
async fn quota_count_respects_window_and_owner() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let repository = PostgresEntryRepository::new(pool.clone());
    let container_id = create_container(&pool, "Quota").await;
    let old = insert(&repository, container_id, 5, None).await;
    insert(&repository, container_id, 5, None).await;
    insert(&repository, container_id, 6, None).await;

    let mut aged = old.clone();
    aged.time_created = Utc::now() - Duration::days(10);
    assert!(repository.update_entry(&aged).await.is_ok());

    let total = repository
        .count_owned_entries(container_id, UserId::new(5), None)
        .await;
    assert_eq!(total.ok(), Some(2));

    let recent = repository
        .count_owned_entries(
            container_id,
            UserId::new(5),
            Some(Utc::now() - Duration::days(1)),
        )
        .await;
    assert_eq!(recent.ok(), Some(1));
}

#[tokio::test]
async fn correlation_and_approval_updates() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let repository = PostgresEntryRepository::new(pool.clone());
    let container_id = create_container(&pool, "Teams").await;
    let copy = insert(&repository, container_id, 7, Some("Apollo")).await;

    let found = repository
        .find_correlated_entry(container_id, UserId::new(7), FieldId::new(1), "APOLLO")
        .await;
    assert_eq!(found.ok().flatten().map(|entry| entry.id), Some(copy.id));

    let updated = repository
        .set_entries_approved(
            container_id,
            &[copy.id, EntryId::new(i64::MAX)],
            false,
            Utc::now(),
        )
        .await;
    assert_eq!(updated.ok(), Some(vec![copy.id]));

    let reloaded = repository.find_entry(container_id, copy.id).await;
    assert_eq!(
        reloaded.ok().flatten().map(|entry| entry.approved),
        Some(false)
    );

    assert!(
        repository
            .delete_content(copy.id, FieldId::new(1))
            .await
            .is_ok()
    );
    let rows = repository.list_content(&[copy.id], None).await;
    assert_eq!(rows.ok().map(|rows| rows.len()), Some(0));
}
