//! Error handling for trackable-store
//!
//! Wraps trackable-core ExError with persistence-specific helpers

use trackable_core::errors::{ExError, ExErrorKind, TrackingError};
use trackable_core::EntityKey;

/// Result type alias using ExError
pub type Result<T> = std::result::Result<T, ExError>;

/// Create the error raised when a cascaded delete would orphan Added entities
///
/// `source` is the engine-level failure being wrapped.
pub fn deleted_with_added_children(entity_type: &str, entity: EntityKey, source: ExError) -> ExError {
    ExError::new(ExErrorKind::DeletedWithAddedChildren)
        .with_op("apply_changes")
        .with_entity_key(entity)
        .with_message(format!(
            "Cannot delete {} with Added children; remove or reassign the children first",
            entity_type
        ))
        .with_source(source)
}

/// Create a missing primary key error
pub fn missing_key(op: &str, entity_type: &str) -> ExError {
    ExError::new(ExErrorKind::MissingKey)
        .with_op(op.to_string())
        .with_message(format!("{} has no primary key", entity_type))
}

/// Create an error for an entity the session does not track
pub fn not_tracked(op: &str, entity: EntityKey) -> ExError {
    ExError::new(ExErrorKind::NotTracked)
        .with_op(op.to_string())
        .with_entity_key(entity)
        .with_message("Entity is not tracked by this session")
}

/// Create a storage conflict error
pub fn persistence(op: &str, message: impl Into<String>) -> ExError {
    ExError::new(ExErrorKind::Persistence)
        .with_op(op.to_string())
        .with_message(message)
}

/// Convert a tracking engine error, recording the failing operation
pub fn from_tracking(op: &str, err: TrackingError) -> ExError {
    ExError::from(err).with_op(op.to_string())
}
