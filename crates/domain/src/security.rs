use std::str::FromStr;

use formyard_core::AppError;
use serde::{Deserialize, Serialize};

/// Capabilities granted per container and checked by the authorization oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Allows viewing entries of every owner.
    ViewAllEntries,
    /// Allows managing entries of every owner.
    ManageEntries,
    /// Allows adding entries and editing own entries.
    WriteEntry,
    /// Allows approving and disapproving entries.
    ApproveEntries,
    /// Allows viewing draft entries of other owners.
    ViewDrafts,
    /// Allows viewing entries submitted anonymously.
    ViewAnonymousEntries,
}

impl Capability {
    /// Returns a stable storage value for this capability.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ViewAllEntries => "view_all_entries",
            Self::ManageEntries => "manage_entries",
            Self::WriteEntry => "write_entry",
            Self::ApproveEntries => "approve_entries",
            Self::ViewDrafts => "view_drafts",
            Self::ViewAnonymousEntries => "view_anonymous_entries",
        }
    }

    /// Returns all known capabilities.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[Capability] = &[
            Capability::ViewAllEntries,
            Capability::ManageEntries,
            Capability::WriteEntry,
            Capability::ApproveEntries,
            Capability::ViewDrafts,
            Capability::ViewAnonymousEntries,
        ];

        ALL
    }
}

impl FromStr for Capability {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|capability| capability.as_str() == value)
            .ok_or_else(|| AppError::Validation(format!("unknown capability value '{value}'")))
    }
}

/// Stable audit actions appended by entry actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Entries were created or updated.
    EntriesUpdated,
    /// Entries were duplicated.
    EntriesDuplicated,
    /// Entries were approved.
    EntriesApproved,
    /// Entries were disapproved.
    EntriesDisapproved,
    /// Entries were deleted.
    EntriesDeleted,
    /// Entries were moved in a node structure.
    EntriesAppended,
}

impl AuditAction {
    /// Returns a stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EntriesUpdated => "entry.updated",
            Self::EntriesDuplicated => "entry.duplicated",
            Self::EntriesApproved => "entry.approved",
            Self::EntriesDisapproved => "entry.disapproved",
            Self::EntriesDeleted => "entry.deleted",
            Self::EntriesAppended => "entry.appended",
        }
    }
}
