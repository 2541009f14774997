use chrono::{DateTime, Utc};
use formyard_core::{ContainerId, EntryId, FieldId};
use formyard_domain::{CompletionSignal, EntryActionKind, NoticeKind, ViewRef};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Target of an entry action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetRef {
    /// Existing entry.
    Existing(EntryId),
    /// The given number of blank new entries.
    New(u32),
}

/// Entry a submitted value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKey {
    /// Existing entry.
    Existing(EntryId),
    /// The n-th new entry of the request, starting at 1.
    Placeholder(u32),
}

/// System column that can be set through a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemField {
    /// Owner user id.
    Owner,
    /// Group id.
    Group,
    /// Approval flag.
    Approved,
    /// Submission status.
    Status,
    /// Creation timestamp.
    TimeCreated,
    /// Modification timestamp.
    TimeModified,
}

/// Target column of a submitted value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmittedField {
    /// Entry row column.
    System(SystemField),
    /// Field content.
    Content(FieldId),
}

/// One submitted value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmittedValue {
    /// Entry the value belongs to.
    pub entry: EntryKey,
    /// Target column.
    pub field: SubmittedField,
    /// Content part name. `None` addresses the first part.
    #[serde(default)]
    pub part: Option<String>,
    /// Raw value.
    pub value: Value,
}

/// Values submitted with a create-or-update action.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    /// Submitted values.
    pub values: Vec<SubmittedValue>,
}

/// Action to apply to the targets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum EntryAction {
    /// Create new entries and update existing ones.
    CreateOrUpdate {
        /// Submitted values. `None` only touches the entry rows.
        submission: Option<Submission>,
    },
    /// Clone entries for the caller.
    Duplicate,
    /// Approve entries.
    Approve,
    /// Disapprove entries.
    Disapprove,
    /// Delete entries.
    Delete,
    /// Splice entries under a parent of a node field.
    Reorder {
        /// Node field holding parent and sibling links.
        node_field: FieldId,
        /// New parent.
        parent: EntryId,
        /// New preceding sibling.
        sibling: Option<EntryId>,
    },
}

impl EntryAction {
    /// Returns the action kind.
    #[must_use]
    pub fn kind(&self) -> EntryActionKind {
        match self {
            Self::CreateOrUpdate { .. } => EntryActionKind::Update,
            Self::Duplicate => EntryActionKind::Duplicate,
            Self::Approve => EntryActionKind::Approve,
            Self::Disapprove => EntryActionKind::Disapprove,
            Self::Delete => EntryActionKind::Delete,
            Self::Reorder { .. } => EntryActionKind::Append,
        }
    }
}

/// Action invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryActionRequest {
    /// Container the targets belong to.
    pub container_id: ContainerId,
    /// View the action was triggered from.
    pub view: ViewRef,
    /// Action to apply.
    pub action: EntryAction,
    /// Requested targets.
    pub targets: Vec<TargetRef>,
}

/// Action awaiting confirmation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingAction {
    /// Single-use confirmation token.
    pub token: Uuid,
    /// Subject that proposed the action.
    pub subject: String,
    /// Original request, reduced to the authorized targets.
    pub request: EntryActionRequest,
    /// Existing entries that will be processed.
    pub entry_ids: Vec<EntryId>,
    /// Number of new entries that will be created.
    pub new_entries: u32,
    /// Proposal time.
    pub created_at: DateTime<Utc>,
}

/// User-visible notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionNotice {
    /// Notice kind.
    pub kind: NoticeKind,
    /// Number of entries the notice refers to.
    pub count: usize,
}

/// Result of a completed action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionReport {
    /// Action kind.
    pub action: EntryActionKind,
    /// User-visible notice.
    pub notice: ActionNotice,
    /// Ids of every processed entry, including team copies.
    pub processed: Vec<EntryId>,
    /// Completion signal for the processed entries.
    pub completion: CompletionSignal,
}

/// Outcome of an action invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum ActionOutcome {
    /// No target qualified for the action.
    NothingToDo(ActionNotice),
    /// The action must be confirmed with the pending token.
    ConfirmationRequired(PendingAction),
    /// The action was applied.
    Completed(ActionReport),
}
