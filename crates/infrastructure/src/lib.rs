//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod http_entry_event_dispatcher;
mod in_memory_entry_repository;
mod in_memory_event_outbox;
mod in_memory_form_repository;
mod in_memory_pending_action_store;
mod postgres_audit_repository;
mod postgres_capability_repository;
mod postgres_entry_repository;
mod postgres_event_outbox;
mod postgres_form_repository;
mod postgres_user_directory;
mod redis_pending_action_store;
mod thread_random_source;

pub use http_entry_event_dispatcher::HttpEntryEventDispatcher;
pub use in_memory_entry_repository::InMemoryEntryRepository;
pub use in_memory_event_outbox::InMemoryEntryEventOutbox;
pub use in_memory_form_repository::{
    InMemoryCapabilityRepository, InMemoryFormRepository, InMemoryUserDirectory,
};
pub use in_memory_pending_action_store::InMemoryPendingActionStore;
pub use postgres_audit_repository::{EntryAuditRecord, PostgresAuditRepository};
pub use postgres_capability_repository::PostgresCapabilityRepository;
pub use postgres_entry_repository::PostgresEntryRepository;
pub use postgres_event_outbox::PostgresEntryEventOutbox;
pub use postgres_form_repository::PostgresFormRepository;
pub use postgres_user_directory::PostgresUserDirectory;
pub use redis_pending_action_store::RedisPendingActionStore;
pub use thread_random_source::ThreadRandomSource;
