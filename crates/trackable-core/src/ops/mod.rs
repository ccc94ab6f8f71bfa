pub mod collection;
pub mod collection_ops;
pub mod graph;
pub(crate) mod tracking_ops;

pub use collection::TrackingCollection;
pub use graph::{EntityGraph, GraphEvent};
