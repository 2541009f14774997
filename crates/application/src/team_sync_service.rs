use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::Utc;
use formyard_core::{AppResult, CallerContext, ContainerId, EntryId};
use formyard_domain::{
    ContentRow, ContentSlots, Entry, EntryEventKind, FieldDefinition, MemberList,
    MembershipChange, TeamCorrelation, ViewRef, active_team_field,
};
use tracing::{debug, warn};

use crate::entry_ports::{EntryEvent, EntryEventPublisher, EntryRepository, UserDirectory};

/// Copies team entries to every listed member and announces membership changes.
#[derive(Clone)]
pub struct TeamSyncService {
    entries: Arc<dyn EntryRepository>,
    users: Arc<dyn UserDirectory>,
    publisher: Arc<dyn EntryEventPublisher>,
}

impl TeamSyncService {
    /// Creates a team synchronization service.
    #[must_use]
    pub fn new(
        entries: Arc<dyn EntryRepository>,
        users: Arc<dyn UserDirectory>,
        publisher: Arc<dyn EntryEventPublisher>,
    ) -> Self {
        Self {
            entries,
            users,
            publisher,
        }
    }

    /// Synchronizes the given source entries to their team members and returns
    /// every member entry that was created or refreshed.
    ///
    /// Each member receives an approved copy whose member list has the member
    /// replaced by the source owner. With a correlation field, an existing
    /// entry of the member with the same correlation value is refreshed
    /// instead of creating another copy.
    pub async fn sync(
        &self,
        caller: &CallerContext,
        container_id: ContainerId,
        fields: &[FieldDefinition],
        entry_ids: &[EntryId],
    ) -> AppResult<BTreeMap<EntryId, Entry>> {
        let mut processed = BTreeMap::new();
        let Some(team_field) = active_team_field(fields) else {
            return Ok(processed);
        };
        let Some(config) = team_field.team_config() else {
            return Ok(processed);
        };
        if entry_ids.is_empty() {
            return Ok(processed);
        }

        let sources = self.entries.find_entries(container_id, entry_ids).await?;
        let mut rows_by_entry: HashMap<EntryId, Vec<ContentRow>> = HashMap::new();
        for row in self.entries.list_content(entry_ids, None).await? {
            rows_by_entry.entry(row.entry_id).or_default().push(row);
        }

        let now = Utc::now();
        for source in sources {
            let rows = rows_by_entry.remove(&source.id).unwrap_or_default();
            let primary_of = |field_id| {
                rows.iter()
                    .find(|row| row.field_id == field_id)
                    .and_then(|row| row.slots.primary_value())
            };

            let members = MemberList::decode(primary_of(team_field.id()))?;
            if members.is_empty() {
                continue;
            }

            let correlation = match config.correlation {
                TeamCorrelation::Field(field_id) => {
                    primary_of(field_id).map(|value| (field_id, value.to_owned()))
                }
                TeamCorrelation::Disabled | TeamCorrelation::Unmatched => None,
            };

            for member in members.members().iter().copied() {
                if member == source.owner_id {
                    continue;
                }

                let existing = match &correlation {
                    Some((field_id, value)) => {
                        self.entries
                            .find_correlated_entry(container_id, member, *field_id, value)
                            .await?
                    }
                    None => None,
                };

                let target = match existing {
                    Some(mut entry) => {
                        entry.approved = true;
                        entry.time_modified = now;
                        self.entries.update_entry(&entry).await?;
                        entry
                    }
                    None => {
                        let mut copy = source.copy_for(member, now);
                        copy.approved = true;
                        copy.group_id = caller.active_group();
                        self.entries.insert_entry(copy).await?
                    }
                };

                let member_list = members.swapped(member, source.owner_id);
                for row in &rows {
                    let slots = if row.field_id == team_field.id() {
                        ContentSlots::primary(member_list.encode())
                    } else {
                        row.slots.clone()
                    };
                    self.entries
                        .upsert_content(target.id, row.field_id, slots)
                        .await?;
                }

                debug!(
                    source_entry_id = %source.id,
                    member_id = %member,
                    target_entry_id = %target.id,
                    "team entry synchronized"
                );
                processed.insert(target.id, target);
            }

            self.entries.update_entry(&source).await?;
            for row in rows {
                self.entries
                    .upsert_content(source.id, row.field_id, row.slots)
                    .await?;
            }
        }

        Ok(processed)
    }

    /// Emits the member-added and member-removed events for one team field
    /// update. Both events are emitted even when one side is empty.
    pub async fn notify_membership_change(
        &self,
        view: &ViewRef,
        entry: &Entry,
        field: &FieldDefinition,
        old_members: &MemberList,
        new_members: &MemberList,
    ) -> AppResult<()> {
        let change = MembershipChange::between(old_members, new_members);
        let added = self.users.find_users(&change.added).await?;
        let removed = self.users.find_users(&change.removed).await?;

        let occurred_at = Utc::now();
        for (kind, users) in [
            (EntryEventKind::MemberAdded, added),
            (EntryEventKind::MemberRemoved, removed),
        ] {
            let event = EntryEvent {
                kind,
                container_id: entry.container_id,
                view: view.clone(),
                items: vec![entry.clone()],
                users,
                field_name: Some(field.name().as_str().to_owned()),
                occurred_at,
            };
            if let Err(error) = self.publisher.publish(event).await {
                warn!(
                    entry_id = %entry.id,
                    event = kind.as_str(),
                    %error,
                    "failed to publish team membership event"
                );
            }
        }

        Ok(())
    }
}
