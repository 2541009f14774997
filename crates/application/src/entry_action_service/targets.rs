use formyard_domain::EntryLimit;

use super::*;

impl EntryActionService {
    pub(super) async fn resolve_targets(
        &self,
        caller: &CallerContext,
        container: &ContainerSettings,
        fields: &[FieldDefinition],
        request: &EntryActionRequest,
        current: Option<&EntrySet>,
    ) -> AppResult<ResolvedTargets> {
        let container_id = container.id();
        let mut requested_new: u32 = 0;
        let mut entry_ids: Vec<EntryId> = Vec::new();
        for target in &request.targets {
            match target {
                TargetRef::New(count) => requested_new = requested_new.saturating_add(*count),
                TargetRef::Existing(entry_id) if !entry_ids.contains(entry_id) => {
                    entry_ids.push(*entry_id);
                }
                TargetRef::Existing(_) => {}
            }
        }

        let is_update = matches!(request.action, EntryAction::CreateOrUpdate { .. });
        let candidates = if is_update {
            self.current_or_imported(caller, container, fields, &entry_ids, current)
                .await?
        } else if entry_ids.is_empty() {
            Vec::new()
        } else {
            self.entries.find_entries(container_id, &entry_ids).await?
        };

        let new_entries = if is_update
            && requested_new > 0
            && self
                .authorization
                .can_manage(caller, container_id, None)
                .await?
        {
            match self.remaining_quota(caller, container).await? {
                Some(remaining) => {
                    requested_new.min(u32::try_from(remaining).unwrap_or(u32::MAX))
                }
                None => requested_new,
            }
        } else {
            0
        };

        let needs_approval_right = matches!(
            request.action,
            EntryAction::Approve | EntryAction::Disapprove
        );
        if needs_approval_right
            && !self
                .authorization
                .can_approve(caller, container_id)
                .await?
        {
            return Ok(ResolvedTargets::default());
        }

        let mut entries = Vec::with_capacity(candidates.len());
        for entry in candidates {
            if self
                .authorization
                .can_manage(caller, container_id, Some(&entry))
                .await?
            {
                entries.push(entry);
            }
        }

        Ok(ResolvedTargets {
            entries,
            new_entries,
        })
    }

    /// Remaining entries the caller may add. `None` means unlimited.
    pub(super) async fn remaining_quota(
        &self,
        caller: &CallerContext,
        container: &ContainerSettings,
    ) -> AppResult<Option<u64>> {
        let EntryLimit::AtMost(max_entries) = container.max_entries() else {
            return Ok(None);
        };
        if self
            .authorization
            .can_manage_all(caller, container.id())
            .await?
        {
            return Ok(None);
        }

        let since = container.quota_window_start(Utc::now());
        let owned = self
            .entries
            .count_owned_entries(container.id(), caller.owner_id(), since)
            .await?;

        Ok(Some(u64::from(max_entries).saturating_sub(owned)))
    }

    async fn current_or_imported(
        &self,
        caller: &CallerContext,
        container: &ContainerSettings,
        fields: &[FieldDefinition],
        entry_ids: &[EntryId],
        current: Option<&EntrySet>,
    ) -> AppResult<Vec<Entry>> {
        let mut found = Vec::with_capacity(entry_ids.len());
        let mut imports = Vec::new();
        for entry_id in entry_ids {
            let known = current.and_then(|set| {
                set.entries
                    .iter()
                    .find(|record| record.id() == *entry_id)
            });
            match known {
                Some(record) => found.push(record.entry.clone()),
                None => imports.push(*entry_id),
            }
        }

        let imported = self
            .entry_sets
            .fetch_visible_rows(caller, container, fields, &imports)
            .await?;
        found.extend(imported);

        found.sort_by_key(|entry| {
            entry_ids
                .iter()
                .position(|entry_id| *entry_id == entry.id)
                .unwrap_or(usize::MAX)
        });
        Ok(found)
    }
}
