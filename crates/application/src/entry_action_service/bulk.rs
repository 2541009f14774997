use formyard_core::FieldId;
use formyard_domain::FieldKind;
use tracing::debug;

use super::submission::find_field;
use super::*;

impl EntryActionService {
    /// Copies entries for the caller until the add quota runs out.
    pub(super) async fn duplicate(
        &self,
        caller: &CallerContext,
        container: &ContainerSettings,
        sources: Vec<Entry>,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<Entry>> {
        let can_approve = self
            .authorization
            .can_approve(caller, container.id())
            .await?;
        let mut remaining = self.remaining_quota(caller, container).await?;

        let source_ids: Vec<EntryId> = sources.iter().map(|entry| entry.id).collect();
        let rows = self.entries.list_content(&source_ids, None).await?;

        let mut created = Vec::with_capacity(sources.len());
        for source in sources {
            if remaining == Some(0) {
                debug!(
                    container_id = %container.id(),
                    subject = %caller.subject(),
                    "entry quota exhausted, duplication stopped"
                );
                break;
            }

            let mut copy = source.copy_for(caller.owner_id(), now);
            copy.group_id = caller.active_group();
            if container.approval_required() && !can_approve {
                copy.approved = false;
            }
            let entry = self.entries.insert_entry(copy).await?;

            for row in rows.iter().filter(|row| row.entry_id == source.id) {
                self.entries
                    .upsert_content(entry.id, row.field_id, row.slots.clone())
                    .await?;
            }

            remaining = remaining.map(|left| left.saturating_sub(1));
            created.push(entry);
        }

        Ok(created)
    }

    /// Flips the approval flag of all targets in one update. Approved
    /// entries are synchronized to their team and the copies join the result.
    pub(super) async fn set_approval(
        &self,
        caller: &CallerContext,
        container: &ContainerSettings,
        fields: &[FieldDefinition],
        targets: Vec<Entry>,
        approved: bool,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<Entry>> {
        let target_ids: Vec<EntryId> = targets.iter().map(|entry| entry.id).collect();
        let updated = self
            .entries
            .set_entries_approved(container.id(), &target_ids, approved, now)
            .await?;
        let mut processed = self.entries.find_entries(container.id(), &updated).await?;

        if approved {
            let synced = self
                .team_sync
                .sync(caller, container.id(), fields, &updated)
                .await?;
            for (entry_id, entry) in synced {
                if !processed.iter().any(|known| known.id == entry_id) {
                    processed.push(entry);
                }
            }
        }

        Ok(processed)
    }

    /// Deletes the content of every field and then the entry rows.
    pub(super) async fn delete(
        &self,
        container: &ContainerSettings,
        fields: &[FieldDefinition],
        targets: Vec<Entry>,
    ) -> AppResult<Vec<Entry>> {
        for entry in &targets {
            for field in fields {
                self.registry
                    .capability(field)?
                    .delete_content(self.entries.as_ref(), field, entry.id)
                    .await?;
            }

            // Rows of fields that no longer exist.
            for row in self.entries.list_content(&[entry.id], None).await? {
                self.entries.delete_content(entry.id, row.field_id).await?;
            }

            self.entries.delete_entry(container.id(), entry.id).await?;
        }

        Ok(targets)
    }

    /// Points the node content of the targets at a new parent and sibling.
    /// Targets without node content and the parent or sibling themselves are
    /// left untouched.
    pub(super) async fn reorder(
        &self,
        fields: &[FieldDefinition],
        targets: Vec<Entry>,
        node_field: FieldId,
        parent: EntryId,
        sibling: Option<EntryId>,
    ) -> AppResult<Vec<Entry>> {
        let field = find_field(fields, node_field)?;
        if !matches!(field.kind(), FieldKind::Node) {
            return Err(AppError::Validation(format!(
                "field '{}' is not a node field",
                field.name().as_str()
            )));
        }

        let target_ids: Vec<EntryId> = targets.iter().map(|entry| entry.id).collect();
        let rows = self
            .entries
            .list_content(&target_ids, Some(&[node_field]))
            .await?;

        let mut moved = Vec::new();
        for entry in targets {
            if entry.id == parent || Some(entry.id) == sibling {
                continue;
            }
            let Some(row) = rows.iter().find(|row| row.entry_id == entry.id) else {
                continue;
            };

            let mut slots = row.slots.clone();
            slots.set(0, Some(parent.to_string()))?;
            slots.set(1, sibling.map(|sibling| sibling.to_string()))?;
            self.entries
                .upsert_content(entry.id, node_field, slots)
                .await?;
            moved.push(entry);
        }

        Ok(moved)
    }
}
