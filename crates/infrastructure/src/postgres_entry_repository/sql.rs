use formyard_application::{
    ApprovalGate, ContentMatcher, ContentPredicate, DraftGate, EntryOrdering, EntryPredicate,
    GroupScope, OwnerScope,
};
use formyard_core::{AppError, AppResult, GroupId};
use formyard_domain::{CONTENT_SLOT_COUNT, EntryStatus, SortDirection, SortTarget};
use sqlx::{Postgres, QueryBuilder};

/// Numeric literal accepted before casting a slot to a number.
const NUMERIC_PATTERN: &str = r"^\s*[-+]?([0-9]+\.?[0-9]*|\.[0-9]+)([eE][-+]?[0-9]+)?\s*$";

/// Appends the WHERE clause of a predicate over `entries e`.
pub(super) fn push_predicate(
    builder: &mut QueryBuilder<'_, Postgres>,
    predicate: &EntryPredicate,
) -> AppResult<()> {
    builder.push(" WHERE e.container_id = ");
    builder.push_bind(predicate.container_id.get());

    match &predicate.owner {
        OwnerScope::Only(user_id) => {
            builder.push(" AND e.owner_id = ");
            builder.push_bind(user_id.get());
        }
        OwnerScope::Nobody => {
            builder.push(" AND FALSE");
        }
        OwnerScope::Any { users, exclude } => {
            if !users.is_empty() {
                builder.push(" AND e.owner_id = ANY(");
                builder.push_bind(users.iter().map(|user| user.get()).collect::<Vec<_>>());
                builder.push(")");
            }
            if let Some(excluded) = exclude {
                builder.push(" AND e.owner_id <> ");
                builder.push_bind(excluded.get());
            }
        }
    }

    if let Some(owner) = predicate.owner_filter {
        builder.push(" AND e.owner_id = ");
        builder.push_bind(owner.get());
    }

    match &predicate.group {
        None => {}
        Some(GroupScope::Only(group_id)) => {
            builder.push(" AND e.group_id = ");
            builder.push_bind(group_id.get());
        }
        Some(GroupScope::AnyOf(groups)) => {
            builder.push(" AND e.group_id = ANY(");
            builder.push_bind(groups.iter().copied().map(GroupId::get).collect::<Vec<_>>());
            builder.push(")");
        }
    }

    match predicate.approval {
        ApprovalGate::Unrestricted => {}
        ApprovalGate::ApprovedOrOwner(user_id) => {
            builder.push(" AND (e.approved OR e.owner_id = ");
            builder.push_bind(user_id.get());
            builder.push(")");
        }
        ApprovalGate::ApprovedOnly => {
            builder.push(" AND e.approved");
        }
    }

    if let DraftGate::NotDraftOrOwner(user_id) = predicate.drafts {
        builder.push(" AND (e.status <> ");
        builder.push_bind(EntryStatus::Draft.code());
        if let Some(user_id) = user_id {
            builder.push(" OR e.owner_id = ");
            builder.push_bind(user_id.get());
        }
        builder.push(")");
    }

    if let Some(entry_ids) = &predicate.entry_ids {
        builder.push(" AND e.id = ANY(");
        builder.push_bind(entry_ids.iter().map(|entry_id| entry_id.get()).collect::<Vec<_>>());
        builder.push(")");
    }

    for search in &predicate.search {
        builder.push(" AND ");
        push_content_predicate(builder, search)?;
    }

    Ok(())
}

/// Appends a boolean SQL expression for a content predicate.
pub(super) fn push_content_predicate(
    builder: &mut QueryBuilder<'_, Postgres>,
    predicate: &ContentPredicate,
) -> AppResult<()> {
    match predicate {
        ContentPredicate::Matches {
            field_id,
            slot,
            matcher,
        } => {
            let column = slot_column(*slot)?;
            builder.push(
                "EXISTS (SELECT 1 FROM entry_content c WHERE c.entry_id = e.id AND c.field_id = ",
            );
            builder.push_bind(field_id.get());
            builder.push(" AND ");
            push_matcher(builder, column, matcher);
            builder.push(")");
        }
        ContentPredicate::HasContent { field_id } => {
            builder.push(
                "EXISTS (SELECT 1 FROM entry_content c WHERE c.entry_id = e.id AND c.field_id = ",
            );
            builder.push_bind(field_id.get());
            builder.push(" AND c.content0 <> '')");
        }
        ContentPredicate::AnyFieldContains(term) => {
            builder.push(
                "EXISTS (SELECT 1 FROM entry_content c WHERE c.entry_id = e.id AND c.content0 ILIKE ",
            );
            builder.push_bind(like_pattern(term));
            builder.push(" ESCAPE '\\')");
        }
        ContentPredicate::Not(inner) => {
            builder.push("NOT (");
            push_content_predicate(builder, inner)?;
            builder.push(")");
        }
        ContentPredicate::All(predicates) => {
            push_junction(builder, predicates, " AND ", "TRUE")?;
        }
        ContentPredicate::Any(predicates) => {
            push_junction(builder, predicates, " OR ", "FALSE")?;
        }
    }

    Ok(())
}

fn push_junction(
    builder: &mut QueryBuilder<'_, Postgres>,
    predicates: &[ContentPredicate],
    separator: &str,
    empty: &str,
) -> AppResult<()> {
    if predicates.is_empty() {
        builder.push(empty);
        return Ok(());
    }

    builder.push("(");
    for (index, predicate) in predicates.iter().enumerate() {
        if index > 0 {
            builder.push(separator);
        }
        push_content_predicate(builder, predicate)?;
    }
    builder.push(")");

    Ok(())
}

fn push_matcher(builder: &mut QueryBuilder<'_, Postgres>, column: &str, matcher: &ContentMatcher) {
    match matcher {
        ContentMatcher::Equals(expected) => {
            builder.push(format!("c.{column} = "));
            builder.push_bind(expected.clone());
        }
        ContentMatcher::Contains(needle) => {
            builder.push(format!("c.{column} ILIKE "));
            builder.push_bind(like_pattern(needle));
            builder.push(" ESCAPE '\\'");
        }
        ContentMatcher::GreaterThan(bound) => {
            push_numeric_guard(builder, column);
            builder.push(" > ");
            builder.push_bind(*bound);
        }
        ContentMatcher::LessThan(bound) => {
            push_numeric_guard(builder, column);
            builder.push(" < ");
            builder.push_bind(*bound);
        }
        ContentMatcher::JsonArrayContains(member) => {
            builder.push(format!(
                "c.{column} ~ ('^\\s*\\[(.*[\\[,\\s\"])?' || "
            ));
            builder.push_bind(member.to_string());
            builder.push(" || '(\\s*\"?\\s*)([,\\]].*)?$')");
        }
    }
}

/// Casts a slot only when it holds a numeric literal, so text rows never
/// abort the query.
fn push_numeric_guard(builder: &mut QueryBuilder<'_, Postgres>, column: &str) {
    builder.push(format!(
        "(CASE WHEN c.{column} ~ '{NUMERIC_PATTERN}' THEN trim(c.{column})::DOUBLE PRECISION END)"
    ));
}

/// Appends an ORDER BY clause. Entry id ascending closes every ordering.
pub(super) fn push_ordering(
    builder: &mut QueryBuilder<'_, Postgres>,
    ordering: &EntryOrdering,
) -> AppResult<()> {
    builder.push(" ORDER BY ");
    for key in &ordering.keys {
        let direction = match key.direction {
            SortDirection::Asc => "ASC NULLS LAST",
            SortDirection::Desc => "DESC NULLS FIRST",
        };
        match key.target {
            SortTarget::TimeCreated => {
                builder.push("e.time_created ");
            }
            SortTarget::TimeModified => {
                builder.push("e.time_modified ");
            }
            SortTarget::EntryId => {
                builder.push("e.id ");
            }
            SortTarget::Owner => {
                builder.push("e.owner_id ");
            }
            SortTarget::Approved => {
                builder.push("e.approved ");
            }
            SortTarget::Field { field_id, slot } => {
                let column = slot_column(slot)?;
                builder.push(format!(
                    "(SELECT s.{column} FROM entry_content s WHERE s.entry_id = e.id AND s.field_id = "
                ));
                builder.push_bind(field_id.get());
                builder.push(") COLLATE \"C\" ");
            }
        }
        builder.push(direction);
        builder.push(", ");
    }
    builder.push("e.id ASC");

    Ok(())
}

fn slot_column(slot: u8) -> AppResult<&'static str> {
    const COLUMNS: [&str; CONTENT_SLOT_COUNT] =
        ["content0", "content1", "content2", "content3", "content4"];

    COLUMNS.get(usize::from(slot)).copied().ok_or_else(|| {
        AppError::Validation(format!(
            "content slot index {slot} is out of range (max {})",
            CONTENT_SLOT_COUNT - 1
        ))
    })
}

/// Builds an ILIKE pattern matching `term` anywhere, with wildcards escaped.
pub(super) fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for character in term.chars() {
        if matches!(character, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(character);
    }
    pattern.push('%');
    pattern
}
