//! Contracts between the mapper and a persistence engine

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;
use trackable_core::{EntityGraph, EntityKey, Trackable};

use crate::errors::Result;
use crate::relationship::{EntityState, NavigationMetadata};

/// Unit of work of a persistence engine
///
/// The mapper drives a session through these calls; writing the recorded
/// states to storage is the engine's own business.
pub trait PersistenceSession {
    /// Relationship metadata of a navigation; `None` when the engine has no
    /// configuration for it
    fn navigation_metadata(&self, entity_type: &str, navigation: &str) -> Option<NavigationMetadata>;

    /// Current state of an entity in the session
    fn entity_state(&self, entity: EntityKey) -> EntityState;

    /// Start, change or stop (`Detached`) tracking an entity of `graph`
    ///
    /// Entering `Modified` marks every property as modified.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the entity is not part of `graph`.
    fn set_entity_state(&mut self, graph: &EntityGraph, entity: EntityKey, state: EntityState) -> Result<()>;

    /// Property names the engine persists for the entity
    ///
    /// # Errors
    ///
    /// Returns `NotTracked` if the session does not track the entity.
    fn property_names(&self, entity: EntityKey) -> Result<Vec<String>>;

    /// Include or exclude one property from the update of a Modified entity
    ///
    /// # Errors
    ///
    /// Returns `NotTracked` if the session does not track the entity.
    fn set_property_modified(&mut self, entity: EntityKey, property: &str, modified: bool) -> Result<()>;

    /// Whether a row with this key is already stored
    ///
    /// # Errors
    ///
    /// Returns `Persistence` if the lookup fails.
    fn exists(&self, entity_type: &str, primary_key: &str) -> Result<bool>;

    /// Record a new row in the join table behind a skip navigation
    ///
    /// Only called for items that are already stored. A new item is
    /// recorded as Added and the engine joins it to the owner itself.
    ///
    /// # Errors
    ///
    /// Returns `MissingKey` if either side has no primary key.
    fn add_association(
        &mut self,
        graph: &EntityGraph,
        owner: EntityKey,
        navigation: &str,
        item: EntityKey,
    ) -> Result<()>;

    /// Record the removal of a join table row, leaving both entities alone
    ///
    /// # Errors
    ///
    /// Returns `MissingKey` if either side has no primary key.
    fn remove_association(
        &mut self,
        graph: &EntityGraph,
        owner: EntityKey,
        navigation: &str,
        item: EntityKey,
    ) -> Result<()>;
}

/// What a loader needs to resolve an unset reference navigation
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceRequest {
    /// Type declaring the navigation
    pub entity_type: &'static str,
    pub navigation: &'static str,
    /// Declared target type of the navigation
    pub target_type: &'static str,
    /// Scalar values of the declaring entity (foreign keys among them)
    pub owner_values: BTreeMap<String, Value>,
}

/// Synchronous source of related entities
pub trait ReferenceLoader {
    /// Fetch the target of an unset reference, if the store has one
    ///
    /// # Errors
    ///
    /// Returns `Persistence` if the lookup fails.
    fn load_reference(&self, request: &ReferenceRequest) -> Result<Option<Box<dyn Trackable>>>;
}

/// Asynchronous source of related entities
#[async_trait]
pub trait AsyncReferenceLoader: Send + Sync {
    /// Fetch the target of an unset reference, if the store has one
    ///
    /// # Errors
    ///
    /// Returns `Persistence` if the lookup fails.
    async fn load_reference(&self, request: &ReferenceRequest) -> Result<Option<Box<dyn Trackable>>>;
}
