//! Guarded graph traversal
//!
//! - [`VisitationGuard`]: per-walk cycle breaker
//! - [`RestoredDeletes`]: scoped restoration of cached deletes
//! - [`GraphWalk`]: depth-first walk yielding each entity once with the
//!   navigation it was reached through

pub mod deletes;
pub mod guard;
pub mod walk;

pub use deletes::RestoredDeletes;
pub use guard::VisitationGuard;
pub use walk::{traverse, GraphNode, GraphWalk, NodeSource};
