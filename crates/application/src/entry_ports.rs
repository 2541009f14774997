mod action;
mod events;
mod query;
mod repository;

pub use action::{
    ActionNotice, ActionOutcome, ActionReport, EntryAction, EntryActionRequest, EntryKey,
    PendingAction, Submission, SubmittedField, SubmittedValue, SystemField, TargetRef,
};
pub use events::{
    ClaimedEntryEvent, EntryEvent, EntryEventDispatcher, EntryEventOutbox, EntryEventPublisher,
};
pub use query::{
    ApprovalGate, ContentLookup, ContentMatcher, ContentPredicate, DraftGate, EntryOrdering,
    EntryPredicate, EntryWindow, GroupScope, OwnerScope,
};
pub use repository::{
    AuditEvent, AuditRepository, EntryRepository, FormRepository, PendingActionStore,
    RandomSource, UserDirectory,
};
