//! Change collection and change-preserving cloning.
//!
//! ## Entry point
//!
//! ```ignore
//! use trackable_core::ops::collection_ops;
//!
//! let changes = collection_ops::get_changes(&mut graph, orders)?;
//! let summary = trackable_core::diff::render_change_summary(&changes.summary()?);
//! ```
//!
//! ## Guarantees
//!
//! - **Identity**: an entity reachable along several paths is copied once.
//! - **Termination**: cycles are cut by the visitation guard of each pass.
//! - **Isolation**: the copy shares no entity or collection with its source.

pub mod cloner;
pub mod collector;
pub mod model;
pub mod summary;

pub use cloner::{clone_collection, clone_entity_graph, CloneMode, CloneOptions, GraphCloner, ReferenceTable};
pub use collector::{ChangeCollector, EntityChangeRecord};
pub use model::{summarize, ChangeSet, ChangeSummary, EntityChangeEntry};
pub use summary::render_change_summary;
