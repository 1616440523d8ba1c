//! Document Store Module
//!
//! Generic, entity-agnostic persistence over a document database.
//!
//! Clean Architecture structure:
//! - `domain/` - Entity capability traits, filters, the `DocumentStore` seam
//! - `application/` - `GenericRepository<T, S>` and connection config
//! - `infra/` - MongoDB client and the in-memory store (feature `memory`)
//!
//! A concrete repository is nothing more than a `GenericRepository` bound to
//! one entity type and one collection name:
//!
//! ```ignore
//! let users: GenericRepository<User, MongoClient> =
//!     GenericRepository::new(Arc::new(client), "users");
//! let page = users.select(20, 0, &[Filter::eq("status", "active")]).await?;
//! ```

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;

// Re-exports for convenience
pub use application::config::MongoConfig;
pub use application::generic_repository::GenericRepository;
pub use domain::entity::{Entity, Identity, Timestamps, now};
pub use domain::filter::Filter;
pub use domain::store::{BulkOutcome, DocumentStore, Page, UpdateOutcome, WriteOp};
pub use error::{MutationKind, StoreError, StoreResult};
pub use infra::mongodb::{MongoClient, MongoSession};

#[cfg(any(test, feature = "memory"))]
pub use infra::memory::{MemorySession, MemoryStore};

pub use kernel::id::EntityId;

// Used by `impl_entity!` expansions in dependent crates
#[doc(hidden)]
pub use chrono as __chrono;

#[cfg(test)]
mod tests;
