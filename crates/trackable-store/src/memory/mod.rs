//! In-memory persistence engine
//!
//! A reference implementation of the session and loader contracts. Rows are
//! keyed by entity type and primary key and hold the column values reported
//! by [`Trackable::property_values`]; join-table rows back skip navigations.
//! Relationship metadata is configured per navigation.

mod session;

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use trackable_core::{Trackable, TrackingState};

use crate::errors::{missing_key, Result};
use crate::relationship::NavigationMetadata;
use crate::session::{AsyncReferenceLoader, ReferenceLoader, ReferenceRequest};

pub use session::{MemorySession, SaveReport};

/// Identity of a stored row
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RowKey {
    pub entity_type: String,
    pub primary_key: String,
}

impl RowKey {
    pub fn new(entity_type: impl Into<String>, primary_key: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            primary_key: primary_key.into(),
        }
    }
}

impl std::fmt::Display for RowKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.entity_type, self.primary_key)
    }
}

/// Join-table row behind a skip navigation
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Association {
    pub owner: RowKey,
    pub navigation: String,
    pub item: RowKey,
}

/// One stored entity
///
/// `values` are the columns. `entity` is the instance handed out when the
/// row is loaded: the entity as last inserted or seeded, with its
/// navigation slots empty.
#[derive(Debug)]
pub struct StoredRow {
    pub values: BTreeMap<String, Value>,
    entity: Box<dyn Trackable>,
}

impl StoredRow {
    fn materialize(&self) -> Box<dyn Trackable> {
        let mut entity = self.entity.clone_entity();
        entity.tracking_mut().set_state(TrackingState::Unchanged);
        entity
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: BTreeMap<RowKey, StoredRow>,
    associations: BTreeSet<Association>,
    navigation: HashMap<(String, String), NavigationMetadata>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Describe how a navigation maps onto the schema
    pub fn configure_navigation(
        &mut self,
        entity_type: &str,
        navigation: &str,
        metadata: NavigationMetadata,
    ) -> &mut Self {
        self.navigation
            .insert((entity_type.to_string(), navigation.to_string()), metadata);
        self
    }

    pub fn navigation_metadata(&self, entity_type: &str, navigation: &str) -> Option<&NavigationMetadata> {
        self.navigation
            .get(&(entity_type.to_string(), navigation.to_string()))
    }

    /// Store an entity as an existing row
    ///
    /// Navigation slots must be empty; related rows are seeded separately.
    ///
    /// # Errors
    ///
    /// Returns `MissingKey` if the entity has no primary key.
    pub fn seed<T: Trackable>(&mut self, entity: T) -> Result<RowKey> {
        let key = entity
            .primary_key()
            .ok_or_else(|| missing_key("seed", entity.type_name()))?;
        let row_key = RowKey::new(entity.type_name(), key);
        self.put_row(row_key.clone(), entity.property_values(), Box::new(entity));
        Ok(row_key)
    }

    /// Store a join-table row
    pub fn seed_association(&mut self, owner: RowKey, navigation: &str, item: RowKey) {
        self.associations.insert(Association {
            owner,
            navigation: navigation.to_string(),
            item,
        });
    }

    pub fn row(&self, entity_type: &str, primary_key: &str) -> Option<&StoredRow> {
        self.rows.get(&RowKey::new(entity_type, primary_key))
    }

    pub fn contains(&self, entity_type: &str, primary_key: &str) -> bool {
        self.row(entity_type, primary_key).is_some()
    }

    /// Number of rows of one entity type
    pub fn count(&self, entity_type: &str) -> usize {
        self.rows
            .keys()
            .filter(|k| k.entity_type == entity_type)
            .count()
    }

    /// Load a row as an Unchanged entity
    pub fn load(&self, entity_type: &str, primary_key: &str) -> Option<Box<dyn Trackable>> {
        self.row(entity_type, primary_key).map(StoredRow::materialize)
    }

    pub fn has_association(&self, owner: &RowKey, navigation: &str, item: &RowKey) -> bool {
        self.associations.contains(&Association {
            owner: owner.clone(),
            navigation: navigation.to_string(),
            item: item.clone(),
        })
    }

    pub fn associations(&self) -> impl Iterator<Item = &Association> {
        self.associations.iter()
    }

    /// Open a unit of work against this store
    pub fn session(&mut self) -> MemorySession<'_> {
        MemorySession::new(self)
    }

    fn put_row(&mut self, key: RowKey, values: BTreeMap<String, Value>, entity: Box<dyn Trackable>) {
        self.rows.insert(key, StoredRow { values, entity });
    }

    fn resolve(&self, request: &ReferenceRequest) -> Option<Box<dyn Trackable>> {
        let metadata = self.navigation_metadata(request.entity_type, request.navigation)?;
        let foreign_key = metadata.foreign_key.as_deref()?;
        let primary_key = match request.owner_values.get(foreign_key)? {
            Value::Null => return None,
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        tracing::trace!(
            target_type = request.target_type,
            primary_key = %primary_key,
            "resolving reference"
        );
        self.load(request.target_type, &primary_key)
    }
}

impl ReferenceLoader for MemoryStore {
    fn load_reference(&self, request: &ReferenceRequest) -> Result<Option<Box<dyn Trackable>>> {
        Ok(self.resolve(request))
    }
}

#[async_trait]
impl AsyncReferenceLoader for MemoryStore {
    async fn load_reference(&self, request: &ReferenceRequest) -> Result<Option<Box<dyn Trackable>>> {
        Ok(self.resolve(request))
    }
}
