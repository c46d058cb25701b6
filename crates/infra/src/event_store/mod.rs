//! Append-only event store boundary.
//!
//! Tenant-scoped event streams with optimistic concurrency, in memory for
//! development and tests, in Postgres for production.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryEventStore;
pub use postgres::PostgresEventStore;
pub use r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};
