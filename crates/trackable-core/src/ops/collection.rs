use std::collections::BTreeSet;

use trackable_core_types::{CollectionKey, EntityKey};

/// Ordered, observable container of tracked entities
///
/// Lives inside an [`EntityGraph`](super::EntityGraph) and holds entity keys,
/// never the entities themselves. Membership changes go through the free
/// functions in [`collection_ops`](super::collection_ops), which apply the
/// tracking-state transitions; the accessors here are read-only apart from
/// the excluded-property set.
///
/// A collection is owned by one logical session at a time. Nothing here is
/// synchronized; concurrent mutation is the caller's problem.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingCollection {
    key: CollectionKey,
    items: Vec<EntityKey>,
    tracking: bool,
    excluded_properties: BTreeSet<String>,
    parent: Option<EntityKey>,
    cached_deletes: Vec<EntityKey>,
    entity_changed_forward: Option<CollectionKey>,
}

impl TrackingCollection {
    pub(crate) fn new(tracking: bool) -> Self {
        Self {
            key: CollectionKey::new(),
            items: Vec::new(),
            tracking,
            excluded_properties: BTreeSet::new(),
            parent: None,
            cached_deletes: Vec::new(),
            entity_changed_forward: None,
        }
    }

    pub(crate) fn with_parent(mut self, parent: Option<EntityKey>) -> Self {
        self.parent = parent;
        self
    }

    pub(crate) fn with_items(mut self, items: Vec<EntityKey>) -> Self {
        self.items = items;
        self
    }

    pub fn key(&self) -> CollectionKey {
        self.key
    }

    pub fn items(&self) -> &[EntityKey] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, entity: EntityKey) -> bool {
        self.items.contains(&entity)
    }

    pub fn position(&self, entity: EntityKey) -> Option<usize> {
        self.items.iter().position(|k| *k == entity)
    }

    pub fn tracking(&self) -> bool {
        self.tracking
    }

    /// Property names whose changes never mark an entity Modified
    pub fn excluded_properties(&self) -> &BTreeSet<String> {
        &self.excluded_properties
    }

    pub fn excluded_properties_mut(&mut self) -> &mut BTreeSet<String> {
        &mut self.excluded_properties
    }

    /// Owner of a many-to-many collection; a lookup key, never traversed
    pub fn parent(&self) -> Option<EntityKey> {
        self.parent
    }

    /// Entities removed while tracking was on
    pub fn cached_deletes(&self) -> &[EntityKey] {
        &self.cached_deletes
    }

    pub(crate) fn entity_changed_forward(&self) -> Option<CollectionKey> {
        self.entity_changed_forward
    }

    pub(crate) fn set_entity_changed_forward(&mut self, forward: Option<CollectionKey>) {
        self.entity_changed_forward = forward;
    }

    pub(crate) fn set_tracking_flag(&mut self, tracking: bool) {
        self.tracking = tracking;
    }

    pub(crate) fn set_parent(&mut self, parent: Option<EntityKey>) {
        self.parent = parent;
    }

    pub(crate) fn insert_item(&mut self, index: usize, entity: EntityKey) {
        self.items.insert(index, entity);
    }

    pub(crate) fn push_item(&mut self, entity: EntityKey) {
        self.items.push(entity);
    }

    pub(crate) fn remove_item(&mut self, index: usize) -> EntityKey {
        self.items.remove(index)
    }

    /// Remove the last occurrence of an entity
    pub(crate) fn remove_last(&mut self, entity: EntityKey) -> bool {
        match self.items.iter().rposition(|k| *k == entity) {
            Some(index) => {
                self.items.remove(index);
                true
            }
            None => false,
        }
    }

    pub(crate) fn cache_delete(&mut self, entity: EntityKey) {
        if !self.cached_deletes.contains(&entity) {
            self.cached_deletes.push(entity);
        }
    }

    pub(crate) fn clear_cached_deletes(&mut self) {
        self.cached_deletes.clear();
    }
}
