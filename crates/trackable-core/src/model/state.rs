use serde::{Deserialize, Serialize};

/// Mutation state of a trackable entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TrackingState {
    /// Unchanged since it was loaded or last accepted
    #[default]
    Unchanged,
    /// New; persisting inserts it
    Added,
    /// Existing with changed scalar properties
    Modified,
    /// Removed; persisting deletes it
    Deleted,
}

impl TrackingState {
    pub fn is_changed(&self) -> bool {
        !matches!(self, TrackingState::Unchanged)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TrackingState::Unchanged => "Unchanged",
            TrackingState::Added => "Added",
            TrackingState::Modified => "Modified",
            TrackingState::Deleted => "Deleted",
        }
    }
}

impl std::fmt::Display for TrackingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
