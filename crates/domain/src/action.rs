use serde::{Deserialize, Serialize};

use crate::{AuditAction, EntryEventKind};

/// Bulk entry actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryActionKind {
    /// Create new entries or update existing ones.
    Update,
    /// Clone entries for the caller.
    Duplicate,
    /// Set the approval flag.
    Approve,
    /// Clear the approval flag.
    Disapprove,
    /// Delete entries and their content.
    Delete,
    /// Splice entries under a parent in a node structure.
    Append,
}

impl EntryActionKind {
    /// Returns the stable action tag.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Update => "update",
            Self::Duplicate => "duplicate",
            Self::Approve => "approve",
            Self::Disapprove => "disapprove",
            Self::Delete => "delete",
            Self::Append => "append",
        }
    }

    /// Returns the notice reported when the action completes.
    #[must_use]
    pub fn notice(self) -> NoticeKind {
        match self {
            Self::Update => NoticeKind::EntriesUpdated,
            Self::Duplicate => NoticeKind::EntriesDuplicated,
            Self::Approve => NoticeKind::EntriesApproved,
            Self::Disapprove => NoticeKind::EntriesDisapproved,
            Self::Delete => NoticeKind::EntriesDeleted,
            Self::Append => NoticeKind::EntriesAppended,
        }
    }

    /// Returns the audit action appended when the action completes.
    #[must_use]
    pub fn audit_action(self) -> AuditAction {
        match self {
            Self::Update => AuditAction::EntriesUpdated,
            Self::Duplicate => AuditAction::EntriesDuplicated,
            Self::Approve => AuditAction::EntriesApproved,
            Self::Disapprove => AuditAction::EntriesDisapproved,
            Self::Delete => AuditAction::EntriesDeleted,
            Self::Append => AuditAction::EntriesAppended,
        }
    }

    /// Returns the completion signal reported for processed entries.
    #[must_use]
    pub fn completion(self) -> CompletionSignal {
        match self {
            Self::Update | Self::Append => CompletionSignal::Unknown,
            Self::Duplicate | Self::Approve | Self::Disapprove => CompletionSignal::Complete,
            Self::Delete => CompletionSignal::Incomplete,
        }
    }

    /// Returns the change event raised for processed entries.
    ///
    /// For `Update` this is the event of edits only. A create-or-update whose
    /// first processed entry is new raises `EntryAdded` instead.
    #[must_use]
    pub fn event(self) -> EntryEventKind {
        match self {
            Self::Update | Self::Append => EntryEventKind::EntryUpdated,
            Self::Duplicate => EntryEventKind::EntryAdded,
            Self::Approve => EntryEventKind::EntryApproved,
            Self::Disapprove => EntryEventKind::EntryDisapproved,
            Self::Delete => EntryEventKind::EntryDeleted,
        }
    }
}

/// Completion state reported to activity tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionSignal {
    /// Completion is decided by the caller.
    Unknown,
    /// Entries count toward completion.
    Complete,
    /// Entries no longer count toward completion.
    Incomplete,
}

/// User-visible notice for an action result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    /// Entries were updated.
    EntriesUpdated,
    /// Entries were duplicated.
    EntriesDuplicated,
    /// Entries were approved.
    EntriesApproved,
    /// Entries were disapproved.
    EntriesDisapproved,
    /// Entries were deleted.
    EntriesDeleted,
    /// Entries were appended.
    EntriesAppended,
    /// No entry qualified for the action.
    NoEntriesForAction,
}

impl NoticeKind {
    /// Returns the stable notice key.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EntriesUpdated => "entries_updated",
            Self::EntriesDuplicated => "entries_duplicated",
            Self::EntriesApproved => "entries_approved",
            Self::EntriesDisapproved => "entries_disapproved",
            Self::EntriesDeleted => "entries_deleted",
            Self::EntriesAppended => "entries_appended",
            Self::NoEntriesForAction => "no_entries_for_action",
        }
    }
}
