use std::str::FromStr;

use chrono::{DateTime, Utc};
use formyard_core::{AppError, ContainerId, EntryId, GroupId, UserId};
use serde::{Deserialize, Serialize};

use crate::EntryContent;

/// Submission status of an entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    /// Status was never set by the submitter.
    #[default]
    NotSet,
    /// Entry is a work-in-progress draft.
    Draft,
    /// Entry was submitted as final.
    Published,
}

impl EntryStatus {
    /// Returns the stable storage code.
    #[must_use]
    pub fn code(self) -> i16 {
        match self {
            Self::NotSet => 0,
            Self::Draft => 1,
            Self::Published => 2,
        }
    }

    /// Resolves a storage code.
    pub fn from_code(code: i16) -> Result<Self, AppError> {
        match code {
            0 => Ok(Self::NotSet),
            1 => Ok(Self::Draft),
            2 => Ok(Self::Published),
            _ => Err(AppError::Validation(format!(
                "unknown entry status code '{code}'"
            ))),
        }
    }

    /// Returns a stable transport value.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotSet => "not_set",
            Self::Draft => "draft",
            Self::Published => "published",
        }
    }
}

impl FromStr for EntryStatus {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "not_set" => Ok(Self::NotSet),
            "draft" => Ok(Self::Draft),
            "published" => Ok(Self::Published),
            _ => Err(AppError::Validation(format!(
                "unknown entry status '{value}'"
            ))),
        }
    }
}

/// One user-submitted record within a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Entry identifier.
    pub id: EntryId,
    /// Owning container.
    pub container_id: ContainerId,
    /// Owner of the entry.
    pub owner_id: UserId,
    /// Group the entry was submitted in.
    pub group_id: Option<GroupId>,
    /// Approval flag.
    pub approved: bool,
    /// Submission status.
    pub status: EntryStatus,
    /// Creation timestamp.
    pub time_created: DateTime<Utc>,
    /// Last modification timestamp.
    pub time_modified: DateTime<Utc>,
}

impl Entry {
    /// Returns whether the entry is owned by the given user.
    #[must_use]
    pub fn is_owned_by(&self, user_id: Option<UserId>) -> bool {
        user_id == Some(self.owner_id)
    }

    /// Builds an unsaved copy of this entry for another owner.
    #[must_use]
    pub fn copy_for(&self, owner_id: UserId, now: DateTime<Utc>) -> NewEntry {
        NewEntry {
            container_id: self.container_id,
            owner_id,
            group_id: self.group_id,
            approved: self.approved,
            status: self.status,
            time_created: now,
            time_modified: now,
        }
    }
}

/// Entry row that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEntry {
    /// Owning container.
    pub container_id: ContainerId,
    /// Owner of the entry.
    pub owner_id: UserId,
    /// Group the entry is submitted in.
    pub group_id: Option<GroupId>,
    /// Approval flag.
    pub approved: bool,
    /// Submission status.
    pub status: EntryStatus,
    /// Creation timestamp.
    pub time_created: DateTime<Utc>,
    /// Last modification timestamp.
    pub time_modified: DateTime<Utc>,
}

impl NewEntry {
    /// Creates a blank unapproved entry.
    #[must_use]
    pub fn blank(
        container_id: ContainerId,
        owner_id: UserId,
        group_id: Option<GroupId>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            container_id,
            owner_id,
            group_id,
            approved: false,
            status: EntryStatus::NotSet,
            time_created: now,
            time_modified: now,
        }
    }

    /// Attaches the storage identifier once persisted.
    #[must_use]
    pub fn into_entry(self, id: EntryId) -> Entry {
        Entry {
            id,
            container_id: self.container_id,
            owner_id: self.owner_id,
            group_id: self.group_id,
            approved: self.approved,
            status: self.status,
            time_created: self.time_created,
            time_modified: self.time_modified,
        }
    }
}

/// Entry together with its assembled field content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryRecord {
    /// Entry row.
    pub entry: Entry,
    /// Field content keyed by field id.
    pub content: EntryContent,
}

impl EntryRecord {
    /// Returns the entry identifier.
    #[must_use]
    pub fn id(&self) -> EntryId {
        self.entry.id
    }
}
