//! Relationship shapes and persistence entity states

use serde::{Deserialize, Serialize};
use trackable_core::TrackingState;

/// Shape of the relationship between a traversal parent and the node reached
/// through one of its navigation properties
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationshipType {
    OneToOne,
    OneToMany,
    ManyToOne,
    ManyToMany,
}

/// Engine metadata describing one navigation property
///
/// Mirrors what a relational engine knows about a navigation: whether it is
/// a skip navigation over a join table, whether its foreign key is unique,
/// and on which side of the relationship it is declared.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationMetadata {
    /// Navigation over a join table (many-to-many)
    pub is_skip_navigation: bool,
    /// The backing foreign key is unique
    pub foreign_key_unique: bool,
    /// The navigation is declared on the dependent side
    pub is_on_dependent: bool,
    /// Scalar property of the declaring entity holding the foreign key value
    pub foreign_key: Option<String>,
}

impl NavigationMetadata {
    /// Metadata that infers to the given relationship type
    pub fn for_relationship(relationship: RelationshipType) -> Self {
        let mut metadata = Self::default();
        match relationship {
            RelationshipType::ManyToMany => metadata.is_skip_navigation = true,
            RelationshipType::OneToOne => metadata.foreign_key_unique = true,
            RelationshipType::OneToMany => metadata.is_on_dependent = true,
            RelationshipType::ManyToOne => {}
        }
        metadata
    }

    pub fn with_foreign_key(mut self, property: impl Into<String>) -> Self {
        self.foreign_key = Some(property.into());
        self
    }

    /// Infer the relationship type
    ///
    /// A skip navigation is many-to-many, a unique foreign key one-to-one;
    /// otherwise the side the navigation is declared on decides.
    pub fn relationship(&self) -> RelationshipType {
        if self.is_skip_navigation {
            RelationshipType::ManyToMany
        } else if self.foreign_key_unique {
            RelationshipType::OneToOne
        } else if self.is_on_dependent {
            RelationshipType::OneToMany
        } else {
            RelationshipType::ManyToOne
        }
    }
}

/// State of an entity inside a persistence session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EntityState {
    /// Not tracked by the session
    #[default]
    Detached,
    Unchanged,
    Added,
    Modified,
    Deleted,
}

impl From<TrackingState> for EntityState {
    fn from(state: TrackingState) -> Self {
        match state {
            TrackingState::Unchanged => EntityState::Unchanged,
            TrackingState::Added => EntityState::Added,
            TrackingState::Modified => EntityState::Modified,
            TrackingState::Deleted => EntityState::Deleted,
        }
    }
}

impl From<EntityState> for TrackingState {
    fn from(state: EntityState) -> Self {
        match state {
            EntityState::Added => TrackingState::Added,
            EntityState::Modified => TrackingState::Modified,
            EntityState::Deleted => TrackingState::Deleted,
            EntityState::Detached | EntityState::Unchanged => TrackingState::Unchanged,
        }
    }
}
