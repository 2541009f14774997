//! Application services and ports.

#![forbid(unsafe_code)]

mod authorization_service;
mod content_assembler;
mod entry_action_service;
mod entry_ports;
mod entry_set_service;
mod event_relay_service;
pub mod field_types;
mod query_composer;
mod team_sync_service;

#[cfg(test)]
mod test_support;

pub use authorization_service::{
    AuthorizationOracle, CapabilityAuthorizationOracle, CapabilityRepository,
};
pub use content_assembler::ContentAssembler;
pub use entry_action_service::{DEFAULT_PENDING_TTL_SECONDS, EntryActionService};
pub use entry_ports::{
    ActionNotice, ActionOutcome, ActionReport, ApprovalGate, AuditEvent, AuditRepository,
    ClaimedEntryEvent, ContentLookup, ContentMatcher, ContentPredicate, DraftGate, EntryAction,
    EntryActionRequest, EntryEvent, EntryEventDispatcher, EntryEventOutbox, EntryEventPublisher,
    EntryKey, EntryOrdering, EntryPredicate, EntryRepository, EntryWindow, FormRepository,
    GroupScope, OwnerScope, PendingAction, PendingActionStore, RandomSource, Submission,
    SubmittedField, SubmittedValue, SystemField, TargetRef, UserDirectory,
};
pub use entry_set_service::{EntrySet, EntrySetAccessor, EntrySetService};
pub use event_relay_service::{
    DEFAULT_MAX_DELIVERY_ATTEMPTS, EntryEventRelayService, RelayBatchReport,
};
pub use field_types::{ContentValues, FieldCapability, FieldRegistry};
pub use query_composer::{
    ComposedEntryQuery, EntryQueryComposer, PageResolution, RetrievalMode, resolve_page,
};
pub use team_sync_service::TeamSyncService;
