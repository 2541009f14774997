//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod action;
mod container;
mod content;
mod entry;
mod event;
mod field;
mod filter;
mod security;
mod team;

pub use action::{CompletionSignal, EntryActionKind, NoticeKind};
pub use container::{ContainerSettings, EntryInterval, EntryLimit};
pub use content::{CONTENT_SLOT_COUNT, ContentRow, ContentSlots, EntryContent, FieldContent};
pub use entry::{Entry, EntryRecord, EntryStatus, NewEntry};
pub use event::{EntryEventKind, UserSummary, ViewRef};
pub use field::{
    FieldDefinition, FieldKind, TeamCorrelation, TeamSelectorConfig, active_team_field,
};
pub use filter::{
    FilterSpec, PageDirective, SearchCriterion, SearchOperator, Selection, SortDirection, SortKey,
    SortTarget,
};
pub use security::{AuditAction, Capability};
pub use team::{MemberList, MembershipChange};
