//! Identity types for graph nodes
//!
//! Every node of an entity graph is addressed by a key. Two keys are equal
//! exactly when they address the same node, which is what reference identity
//! means everywhere in the tracking engine.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of one entity node inside an entity graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKey(Uuid);

impl EntityKey {
    /// Generate a fresh key using UUIDv7
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Create from an existing UUID (for deserialization)
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }
}

impl Default for EntityKey {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EntityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "entity:{}", self.0)
    }
}

/// Identity of one tracking collection inside an entity graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CollectionKey(Uuid);

impl CollectionKey {
    /// Generate a fresh key using UUIDv7
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CollectionKey {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CollectionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "collection:{}", self.0)
    }
}

/// Opaque identity token assigned once to an entity when tracking begins
///
/// Used to tell apart entities that have no natural key yet (for example
/// two freshly added rows) when a persisted graph is reconciled with the
/// local one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityIdentifier(Uuid);

impl EntityIdentifier {
    /// Generate a new random identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EntityIdentifier {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EntityIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of any graph object a traversal may visit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectId {
    Entity(EntityKey),
    Collection(CollectionKey),
}

impl From<EntityKey> for ObjectId {
    fn from(key: EntityKey) -> Self {
        ObjectId::Entity(key)
    }
}

impl From<CollectionKey> for ObjectId {
    fn from(key: CollectionKey) -> Self {
        ObjectId::Collection(key)
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObjectId::Entity(key) => key.fmt(f),
            ObjectId::Collection(key) => key.fmt(f),
        }
    }
}
