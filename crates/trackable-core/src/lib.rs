//! Trackable Core - change tracking and graph diffing for entity graphs
//!
//! This crate provides the in-memory half of the change-tracking engine:
//! - Entity contract (`Trackable`) with a composed tracking header
//! - Navigation property descriptors registered once per entity type
//! - `EntityGraph` arena addressing entities and collections by key
//! - Tracking collections driving the Added/Modified/Deleted state machine
//! - Change collection and change-preserving (or full) cloning
//! - Canonical error and logging facilities
//!
//! Persistence mapping lives in `trackable-store`.

pub mod diff;
pub mod errors;
pub mod logging_facility;
pub mod model;
pub mod navigation;
pub mod ops;
pub mod traversal;

// Re-export commonly used types
pub use diff::{ChangeSet, CloneMode, CloneOptions};
pub use errors::{ExError, ExErrorKind, Result, TrackingError};
pub use model::{CollectionSlot, EntityTracking, ReferenceSlot, Trackable, TrackingState};
pub use navigation::{EntityDescriptorBuilder, NavigationProperty};
pub use ops::{collection_ops, EntityGraph, GraphEvent, TrackingCollection};
pub use trackable_core_types::{CollectionKey, EntityIdentifier, EntityKey};
