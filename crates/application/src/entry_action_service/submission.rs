use std::collections::BTreeMap;

use formyard_core::{FieldId, GroupId, UserId};
use formyard_domain::{EntryEventKind, EntryStatus, FieldKind, MemberList, NewEntry};
use serde_json::Value;
use tracing::debug;

use super::*;
use crate::entry_ports::{EntryKey, Submission, SystemField, SubmittedField};
use crate::field_types::ContentValues;

/// Submitted values of one entry split into row columns and field content.
#[derive(Debug, Default)]
struct EntryChanges {
    system: Vec<(SystemField, Value)>,
    content: BTreeMap<FieldId, ContentValues>,
}

#[derive(Debug, Clone, Copy)]
struct SystemRights {
    manage_all: bool,
    approve: bool,
}

impl EntryActionService {
    #[allow(clippy::too_many_arguments)]
    pub(super) async fn create_or_update(
        &self,
        caller: &CallerContext,
        container: &ContainerSettings,
        fields: &[FieldDefinition],
        view: &ViewRef,
        submission: Option<&Submission>,
        targets: ResolvedTargets,
        now: DateTime<Utc>,
    ) -> AppResult<(Vec<Entry>, EntryEventKind)> {
        let mut changes = self.split_submission(submission, fields)?;
        let rights = SystemRights {
            manage_all: self
                .authorization
                .can_manage_all(caller, container.id())
                .await?,
            approve: self
                .authorization
                .can_approve(caller, container.id())
                .await?,
        };

        let mut work: Vec<(EntryKey, Entry)> = targets
            .entries
            .into_iter()
            .map(|entry| (EntryKey::Existing(entry.id), entry))
            .collect();
        for placeholder in 1..=targets.new_entries {
            let blank = NewEntry::blank(
                container.id(),
                caller.owner_id(),
                caller.active_group(),
                now,
            );
            let entry = self.entries.insert_entry(blank).await?;
            work.push((EntryKey::Placeholder(placeholder), entry));
        }

        // The first processed entry decides between added and updated.
        let event = match work.first() {
            Some((EntryKey::Placeholder(_), _)) => EntryEventKind::EntryAdded,
            _ => EntryEventKind::EntryUpdated,
        };

        let mut processed = Vec::with_capacity(work.len());
        for (key, mut entry) in work {
            let was_approved = entry.approved;
            let entry_changes = changes.remove(&key).unwrap_or_default();

            entry.time_modified = now;
            apply_system_values(&mut entry, &entry_changes.system, rights)?;
            if container.approval_required() && !rights.approve {
                entry.approved = false;
            }
            self.entries.update_entry(&entry).await?;

            for (field_id, values) in &entry_changes.content {
                let field = find_field(fields, *field_id)?;
                self.update_field_content(view, &entry, field, values)
                    .await?;
            }

            if !was_approved && entry.approved {
                let synced = self
                    .team_sync
                    .sync(caller, container.id(), fields, &[entry.id])
                    .await?;
                debug!(
                    entry_id = %entry.id,
                    synchronized = synced.len(),
                    "approved entry synchronized to team"
                );
            }

            processed.push(entry);
        }

        Ok((processed, event))
    }

    fn split_submission(
        &self,
        submission: Option<&Submission>,
        fields: &[FieldDefinition],
    ) -> AppResult<BTreeMap<EntryKey, EntryChanges>> {
        let mut changes: BTreeMap<EntryKey, EntryChanges> = BTreeMap::new();
        let Some(submission) = submission else {
            return Ok(changes);
        };

        for submitted in &submission.values {
            let entry_changes = changes.entry(submitted.entry).or_default();
            match submitted.field {
                SubmittedField::System(system) => {
                    entry_changes.system.push((system, submitted.value.clone()));
                }
                SubmittedField::Content(field_id) => {
                    let field = find_field(fields, field_id)?;
                    let parts = self.registry.capability(field)?.content_parts();
                    let part = match &submitted.part {
                        Some(part) if parts.contains(&part.as_str()) => part.clone(),
                        Some(part) => {
                            return Err(AppError::Validation(format!(
                                "field '{}' has no part '{part}'",
                                field.name().as_str()
                            )));
                        }
                        None => parts.first().map(|part| (*part).to_owned()).ok_or_else(|| {
                            AppError::Validation(format!(
                                "field '{}' has no content parts",
                                field.name().as_str()
                            ))
                        })?,
                    };
                    entry_changes
                        .content
                        .entry(field_id)
                        .or_default()
                        .insert(part, submitted.value.clone());
                }
            }
        }

        Ok(changes)
    }

    async fn update_field_content(
        &self,
        view: &ViewRef,
        entry: &Entry,
        field: &FieldDefinition,
        values: &ContentValues,
    ) -> AppResult<()> {
        let notifies = matches!(
            field.kind(),
            FieldKind::TeamMemberSelect(config) if config.notify_members
        );

        let old_members = if notifies {
            let rows = self
                .entries
                .list_content(&[entry.id], Some(&[field.id()]))
                .await?;
            MemberList::decode(rows.first().and_then(|row| row.slots.primary_value()))?
        } else {
            MemberList::default()
        };

        let row = self
            .registry
            .capability(field)?
            .update_content(self.entries.as_ref(), field, entry.id, values)
            .await?;

        if notifies {
            let new_members =
                MemberList::decode(row.as_ref().and_then(|row| row.slots.primary_value()))?;
            self.team_sync
                .notify_membership_change(view, entry, field, &old_members, &new_members)
                .await?;
        }

        Ok(())
    }
}

pub(super) fn find_field(
    fields: &[FieldDefinition],
    field_id: FieldId,
) -> AppResult<&FieldDefinition> {
    fields
        .iter()
        .find(|field| field.id() == field_id)
        .ok_or_else(|| AppError::Validation(format!("unknown field '{field_id}'")))
}

/// Applies submitted system columns. Status is open to every caller, the
/// approval flag needs the approve right and the remaining columns need
/// management of all entries. Columns the caller may not set are ignored.
fn apply_system_values(
    entry: &mut Entry,
    values: &[(SystemField, Value)],
    rights: SystemRights,
) -> AppResult<()> {
    for (field, value) in values {
        match field {
            SystemField::Status => entry.status = parse_status(value)?,
            SystemField::Approved if rights.approve => entry.approved = parse_flag(value)?,
            SystemField::Owner if rights.manage_all => {
                entry.owner_id = UserId::new(parse_integer(value, "owner")?);
            }
            SystemField::Group if rights.manage_all => {
                entry.group_id = match value {
                    Value::Null => None,
                    other => Some(parse_integer(other, "group")?)
                        .filter(|id| *id != 0)
                        .map(GroupId::new),
                };
            }
            SystemField::TimeCreated if rights.manage_all => {
                entry.time_created = parse_time(value)?;
            }
            SystemField::TimeModified if rights.manage_all => {
                entry.time_modified = parse_time(value)?;
            }
            SystemField::Approved
            | SystemField::Owner
            | SystemField::Group
            | SystemField::TimeCreated
            | SystemField::TimeModified => {}
        }
    }

    Ok(())
}

fn parse_integer(value: &Value, column: &str) -> AppResult<i64> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse::<i64>().ok(),
        _ => None,
    }
    .ok_or_else(|| AppError::Validation(format!("invalid {column} value '{value}'")))
}

fn parse_flag(value: &Value) -> AppResult<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::Number(number) => number.as_i64().map(|number| number != 0),
        Value::String(text) => match text.trim() {
            "1" | "true" => Some(true),
            "0" | "false" | "" => Some(false),
            _ => None,
        },
        _ => None,
    }
    .ok_or_else(|| AppError::Validation(format!("invalid approval value '{value}'")))
}

fn parse_status(value: &Value) -> AppResult<EntryStatus> {
    match value {
        Value::Number(number) => {
            let code = number
                .as_i64()
                .and_then(|code| i16::try_from(code).ok())
                .ok_or_else(|| AppError::Validation(format!("invalid status value '{value}'")))?;
            EntryStatus::from_code(code)
        }
        Value::String(text) => match text.trim().parse::<i16>() {
            Ok(code) => EntryStatus::from_code(code),
            Err(_) => text.trim().parse(),
        },
        _ => Err(AppError::Validation(format!(
            "invalid status value '{value}'"
        ))),
    }
}

fn parse_time(value: &Value) -> AppResult<DateTime<Utc>> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .and_then(|seconds| DateTime::from_timestamp(seconds, 0)),
        Value::String(text) => DateTime::parse_from_rfc3339(text.trim())
            .ok()
            .map(|time| time.with_timezone(&Utc)),
        _ => None,
    }
    .ok_or_else(|| AppError::Validation(format!("invalid timestamp value '{value}'")))
}
