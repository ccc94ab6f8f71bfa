//! Trackable Store - persistence mapping for tracked entity graphs
//!
//! Provides:
//! - Persistence state mapper (`apply_changes`) with relationship-aware policies
//! - Session and loader contracts a persistence engine implements
//! - Relationship inference from navigation metadata
//! - Related-entity loading (sync and async) and accept-changes traversals
//! - `MemoryStore`, an in-memory reference engine

pub mod accept;
pub mod apply;
pub mod errors;
pub mod load;
pub mod memory;
pub mod relationship;
pub mod session;

// Re-export key types
pub use accept::accept_changes;
pub use apply::{apply_changes, apply_changes_many, apply_changes_with, detach_entities};
pub use errors::Result;
pub use load::{load_related_entities, load_related_entities_async};
pub use memory::{MemorySession, MemoryStore, SaveReport};
pub use relationship::{EntityState, NavigationMetadata, RelationshipType};
pub use session::{AsyncReferenceLoader, PersistenceSession, ReferenceLoader, ReferenceRequest};
