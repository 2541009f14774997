use std::str::FromStr;

use formyard_core::{AppError, UserId};
use serde::{Deserialize, Serialize};

/// Change events raised for the notification subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryEventKind {
    /// Entries were added.
    EntryAdded,
    /// Entries were updated.
    EntryUpdated,
    /// Entries were deleted.
    EntryDeleted,
    /// Entries were approved.
    EntryApproved,
    /// Entries were disapproved.
    EntryDisapproved,
    /// Users were added to a team.
    MemberAdded,
    /// Users were removed from a team.
    MemberRemoved,
}

impl EntryEventKind {
    /// Returns the stable event name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EntryAdded => "entry_added",
            Self::EntryUpdated => "entry_updated",
            Self::EntryDeleted => "entry_deleted",
            Self::EntryApproved => "entry_approved",
            Self::EntryDisapproved => "entry_disapproved",
            Self::MemberAdded => "member_added",
            Self::MemberRemoved => "member_removed",
        }
    }
}

impl FromStr for EntryEventKind {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "entry_added" => Ok(Self::EntryAdded),
            "entry_updated" => Ok(Self::EntryUpdated),
            "entry_deleted" => Ok(Self::EntryDeleted),
            "entry_approved" => Ok(Self::EntryApproved),
            "entry_disapproved" => Ok(Self::EntryDisapproved),
            "member_added" => Ok(Self::MemberAdded),
            "member_removed" => Ok(Self::MemberRemoved),
            _ => Err(AppError::Validation(format!(
                "unknown entry event '{value}'"
            ))),
        }
    }
}

/// View an action was triggered from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewRef {
    /// View identifier, when known.
    pub view_id: Option<i64>,
    /// View name.
    pub name: String,
}

impl ViewRef {
    /// Creates a view reference.
    #[must_use]
    pub fn new(view_id: Option<i64>, name: impl Into<String>) -> Self {
        Self {
            view_id,
            name: name.into(),
        }
    }
}

/// User record carried by member events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    /// User identifier.
    pub id: UserId,
    /// Display name.
    pub display_name: String,
    /// Contact email, when known.
    pub email: Option<String>,
}
