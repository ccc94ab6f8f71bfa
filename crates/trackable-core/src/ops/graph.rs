use std::collections::HashMap;
use std::sync::Arc;

use trackable_core_types::{CollectionKey, EntityKey};

use crate::errors::{Result, TrackingError};
use crate::model::entity::short_type_name;
use crate::model::{downcast_mut, downcast_ref, CollectionSlot, Trackable, TrackingState};
use crate::navigation::{
    CollectionProperty, EntityDescriptor, NavigationDescriptor, NavigationKind,
    NavigationProperty, NavigationRegistry, ReferenceProperty,
};

use super::collection::TrackingCollection;
use super::collection_ops;

/// Notification recorded by the graph for its owner to drain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphEvent {
    /// An entity of the collection changed its tracking state
    EntityChanged { collection: CollectionKey },
}

/// Arena holding the entities and tracking collections of one object graph
///
/// Entities and collections are addressed by key; navigation slots store
/// keys, so cycles and shared references need no special ownership. Key
/// equality is reference identity.
///
/// Entity fields are mutated through [`EntityGraph::modify`], which delivers
/// the property-changed notifications raised by the setters to every
/// collection observing the entity.
#[derive(Debug, Default)]
pub struct EntityGraph {
    entities: HashMap<EntityKey, Box<dyn Trackable>>,
    collections: HashMap<CollectionKey, TrackingCollection>,
    registry: NavigationRegistry,
    events: Vec<GraphEvent>,
}

impl EntityGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_registry(registry: NavigationRegistry) -> Self {
        Self {
            registry,
            ..Self::default()
        }
    }

    pub fn registry(&self) -> &NavigationRegistry {
        &self.registry
    }

    /// Register an entity type without attaching an instance
    pub fn register<T: Trackable>(&mut self) {
        self.registry.ensure::<T>();
    }

    /// Run a registration function captured elsewhere (for example by a store)
    pub fn register_with(&mut self, register: fn(&mut NavigationRegistry)) {
        register(&mut self.registry);
    }

    // ===== Entities =====

    /// Attach an entity to the graph
    ///
    /// Registers the entity type, materializes pending collection slots as
    /// empty collections (many-to-many ones record the entity as parent) and
    /// creates change trackers for references that are already set.
    ///
    /// # Errors
    ///
    /// Returns `EntityNotFound` if a preset reference points outside the graph.
    pub fn attach<T: Trackable>(&mut self, entity: T) -> Result<EntityKey> {
        self.registry.ensure::<T>();
        self.attach_boxed(Box::new(entity))
    }

    /// Attach an already boxed entity whose type is registered
    ///
    /// # Errors
    ///
    /// Returns `UnregisteredType` if the concrete type is unknown, or
    /// `EntityNotFound` if a preset reference points outside the graph.
    pub fn attach_boxed(&mut self, mut entity: Box<dyn Trackable>) -> Result<EntityKey> {
        let descriptor = self.registry.descriptor_for(entity.as_ref())?;
        let key = EntityKey::new();

        // Notifications raised before the entity joined a graph go nowhere
        entity.tracking_mut().notifier_mut().take_pending();

        for nav in descriptor.navigation() {
            match nav.kind() {
                NavigationKind::Reference => {
                    let preset = nav
                        .reference(entity.as_ref())
                        .filter(|slot| slot.tracker().is_none())
                        .and_then(|slot| slot.target());
                    if let Some(target) = preset {
                        if !self.entities.contains_key(&target) {
                            return Err(TrackingError::EntityNotFound { key: target });
                        }
                        let tracker = self.insert_collection(
                            TrackingCollection::new(false).with_items(vec![target]),
                        );
                        if let Some(slot) = nav.reference_mut(entity.as_mut()) {
                            slot.bind(Some(target), Some(tracker));
                        }
                    }
                }
                NavigationKind::Collection { many_to_many } => {
                    let pending = matches!(
                        nav.collection(entity.as_ref()),
                        Some(CollectionSlot::Pending)
                    );
                    if pending {
                        let parent = many_to_many.then_some(key);
                        let collection =
                            self.insert_collection(TrackingCollection::new(false).with_parent(parent));
                        if let Some(slot) = nav.collection_mut(entity.as_mut()) {
                            *slot = CollectionSlot::Bound(collection);
                        }
                    }
                }
            }
        }

        tracing::trace!(entity_key = %key, entity_type = entity.type_name(), "attached entity");
        self.entities.insert(key, entity);
        Ok(key)
    }

    /// Insert a node whose navigation slots the caller wires up itself
    pub(crate) fn insert_raw(&mut self, entity: Box<dyn Trackable>) -> EntityKey {
        let key = EntityKey::new();
        self.entities.insert(key, entity);
        key
    }

    pub fn contains(&self, key: EntityKey) -> bool {
        self.entities.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn entity_keys(&self) -> impl Iterator<Item = EntityKey> + '_ {
        self.entities.keys().copied()
    }

    /// Get an entity by key
    ///
    /// # Errors
    ///
    /// Returns `EntityNotFound` if the key addresses no entity of this graph.
    pub fn entity(&self, key: EntityKey) -> Result<&dyn Trackable> {
        self.entities
            .get(&key)
            .map(|e| e.as_ref())
            .ok_or(TrackingError::EntityNotFound { key })
    }

    pub(crate) fn entity_mut(&mut self, key: EntityKey) -> Result<&mut dyn Trackable> {
        match self.entities.get_mut(&key) {
            Some(entity) => Ok(entity.as_mut()),
            None => Err(TrackingError::EntityNotFound { key }),
        }
    }

    /// Get an entity by key as its concrete type
    ///
    /// # Errors
    ///
    /// Returns `EntityNotFound` for an unknown key, or `TypeMismatch` if the
    /// entity is of another type.
    pub fn get<T: Trackable>(&self, key: EntityKey) -> Result<&T> {
        let entity = self.entity(key)?;
        downcast_ref::<T>(entity).ok_or_else(|| TrackingError::TypeMismatch {
            key,
            expected: short_type_name(std::any::type_name::<T>()),
            actual: entity.type_name(),
        })
    }

    /// Clone of an entity that can be attached to another graph
    ///
    /// Scalar fields and the tracking header are copied; references are
    /// cleared and collections left to be created on attach.
    ///
    /// # Errors
    ///
    /// Returns `EntityNotFound` for an unknown key.
    pub fn detached_copy(&self, key: EntityKey) -> Result<Box<dyn Trackable>> {
        let entity = self.entity(key)?;
        let descriptor = self.registry.descriptor_for(entity)?;
        Ok(descriptor.detached_copy(entity, CollectionSlot::Pending))
    }

    /// Tracking state of an entity
    ///
    /// # Errors
    ///
    /// Returns `EntityNotFound` if the key addresses no entity of this graph.
    pub fn state(&self, key: EntityKey) -> Result<TrackingState> {
        Ok(self.entity(key)?.tracking().state())
    }

    /// Mutate an entity and deliver the notifications its setters raised
    ///
    /// # Errors
    ///
    /// Returns `EntityNotFound`/`TypeMismatch` when the entity cannot be
    /// reached as `T`, and `NullPropertyName` when a setter reported an
    /// empty property name to a tracking collection.
    pub fn modify<T, R, F>(&mut self, key: EntityKey, f: F) -> Result<R>
    where
        T: Trackable,
        F: FnOnce(&mut T) -> R,
    {
        let entity = self.entity_mut(key)?;
        let actual = entity.type_name();
        let typed = downcast_mut::<T>(entity).ok_or_else(|| TrackingError::TypeMismatch {
            key,
            expected: short_type_name(std::any::type_name::<T>()),
            actual,
        })?;
        let out = f(typed);
        self.dispatch_notifications(key)?;
        Ok(out)
    }

    /// Mutate an entity through its trait object without notifications
    ///
    /// # Errors
    ///
    /// Returns `EntityNotFound` if the key addresses no entity of this graph.
    pub fn modify_dyn<R>(
        &mut self,
        key: EntityKey,
        f: impl FnOnce(&mut dyn Trackable) -> R,
    ) -> Result<R> {
        let entity = self.entity_mut(key)?;
        let out = f(&mut *entity);
        entity.tracking_mut().notifier_mut().take_pending();
        Ok(out)
    }

    /// Raise a property-changed notification on behalf of an entity
    ///
    /// # Errors
    ///
    /// Returns `NullPropertyName` if `property` is empty and the entity is
    /// observed by a tracking collection.
    pub fn raise_property_changed(&mut self, key: EntityKey, property: &str) -> Result<()> {
        self.entity_mut(key)?.tracking_mut().notify(property);
        self.dispatch_notifications(key)
    }

    fn dispatch_notifications(&mut self, key: EntityKey) -> Result<()> {
        let (names, observers) = {
            let notifier = self.entity_mut(key)?.tracking_mut().notifier_mut();
            (notifier.take_pending(), notifier.observers().to_vec())
        };
        for name in &names {
            for collection in &observers {
                collection_ops::on_property_changed(self, *collection, key, name)?;
            }
        }
        Ok(())
    }

    // ===== Navigation =====

    /// Descriptor of the entity's concrete type
    ///
    /// # Errors
    ///
    /// Returns `EntityNotFound` or `UnregisteredType`.
    pub fn descriptor_of(&self, key: EntityKey) -> Result<Arc<EntityDescriptor>> {
        self.registry.descriptor_for(self.entity(key)?)
    }

    /// Enumerate the navigation properties of an entity with their current values
    ///
    /// # Errors
    ///
    /// Returns `EntityNotFound` or `UnregisteredType`.
    pub fn navigation_properties(&self, key: EntityKey) -> Result<Vec<NavigationProperty>> {
        let entity = self.entity(key)?;
        let descriptor = self.registry.descriptor_for(entity)?;
        Ok(descriptor
            .navigation()
            .iter()
            .map(|nav| read_navigation(nav, entity))
            .collect())
    }

    /// One navigation property of an entity by name
    ///
    /// # Errors
    ///
    /// Returns `UnknownNavigation` if the type has no such navigation.
    pub fn navigation_property(&self, key: EntityKey, name: &str) -> Result<NavigationProperty> {
        let entity = self.entity(key)?;
        let descriptor = self.registry.descriptor_for(entity)?;
        descriptor
            .find_navigation(name)
            .map(|nav| read_navigation(nav, entity))
            .ok_or_else(|| TrackingError::UnknownNavigation {
                type_name: descriptor.type_name().to_string(),
                property: name.to_string(),
            })
    }

    /// Collection backing a collection navigation; `None` when unloaded
    ///
    /// # Errors
    ///
    /// Returns `UnknownNavigation` if `name` is not a collection navigation.
    pub fn collection_of(&self, key: EntityKey, name: &str) -> Result<Option<CollectionKey>> {
        let nav = self.navigation_property(key, name)?;
        nav.as_collection_property()
            .map(|cp| cp.collection)
            .ok_or_else(|| self.unknown_navigation(key, name))
    }

    /// Target of a reference navigation
    ///
    /// # Errors
    ///
    /// Returns `UnknownNavigation` if `name` is not a reference navigation.
    pub fn reference_of(&self, key: EntityKey, name: &str) -> Result<Option<EntityKey>> {
        let nav = self.navigation_property(key, name)?;
        nav.as_reference_property()
            .map(|rp| rp.target)
            .ok_or_else(|| self.unknown_navigation(key, name))
    }

    /// Tracking collection that forwards change tracking onto a reference target
    ///
    /// # Errors
    ///
    /// Returns `UnknownNavigation` if `name` is not a reference navigation.
    pub fn ref_property_change_tracker(
        &self,
        key: EntityKey,
        name: &str,
    ) -> Result<Option<CollectionKey>> {
        let nav = self.navigation_property(key, name)?;
        nav.as_reference_property()
            .map(|rp| rp.tracker)
            .ok_or_else(|| self.unknown_navigation(key, name))
    }

    /// Point a reference navigation at another entity (or clear it)
    ///
    /// Replaces the property's change tracker and raises a property-changed
    /// notification, so a tracking collection observing the entity extends
    /// tracking onto the new target.
    ///
    /// # Errors
    ///
    /// Returns `UnknownNavigation` if `name` is not a reference navigation
    /// and `EntityNotFound` if either entity is missing.
    pub fn set_reference(
        &mut self,
        key: EntityKey,
        name: &str,
        target: Option<EntityKey>,
    ) -> Result<()> {
        self.bind_reference(key, name, target)?;
        self.raise_property_changed(key, name)
    }

    /// Set a reference navigation without raising a notification
    pub(crate) fn bind_reference(
        &mut self,
        key: EntityKey,
        name: &str,
        target: Option<EntityKey>,
    ) -> Result<()> {
        let descriptor = self.descriptor_of(key)?;
        let nav = descriptor
            .find_navigation(name)
            .filter(|nav| nav.is_reference())
            .ok_or_else(|| self.unknown_navigation(key, name))?;
        self.bind_reference_slot(key, nav, target)
    }

    pub(crate) fn bind_reference_slot(
        &mut self,
        key: EntityKey,
        nav: &NavigationDescriptor,
        target: Option<EntityKey>,
    ) -> Result<()> {
        if let Some(target) = target {
            if !self.entities.contains_key(&target) {
                return Err(TrackingError::EntityNotFound { key: target });
            }
        }

        let old_tracker = nav
            .reference(self.entity(key)?)
            .and_then(|slot| slot.tracker());
        if let Some(old) = old_tracker {
            if let Some(collection) = self.collections.remove(&old) {
                for item in collection.items() {
                    if let Some(entity) = self.entities.get_mut(item) {
                        entity.tracking_mut().notifier_mut().unobserve(old);
                    }
                }
            }
        }

        let tracker = target.map(|t| {
            self.insert_collection(TrackingCollection::new(false).with_items(vec![t]))
        });
        let slot = nav
            .reference_mut(self.entity_mut(key)?)
            .ok_or_else(|| TrackingError::UnknownNavigation {
                type_name: String::new(),
                property: nav.name().to_string(),
            })?;
        slot.bind(target, tracker);
        Ok(())
    }

    pub(crate) fn set_collection_slot(
        &mut self,
        key: EntityKey,
        nav: &NavigationDescriptor,
        value: CollectionSlot,
    ) -> Result<()> {
        if let Some(slot) = nav.collection_mut(self.entity_mut(key)?) {
            *slot = value;
        }
        Ok(())
    }

    fn unknown_navigation(&self, key: EntityKey, name: &str) -> TrackingError {
        let type_name = self
            .entity(key)
            .map(|e| e.type_name().to_string())
            .unwrap_or_default();
        TrackingError::UnknownNavigation {
            type_name,
            property: name.to_string(),
        }
    }

    // ===== Collections =====

    pub(crate) fn insert_collection(&mut self, collection: TrackingCollection) -> CollectionKey {
        let key = collection.key();
        self.collections.insert(key, collection);
        key
    }

    pub fn contains_collection(&self, key: CollectionKey) -> bool {
        self.collections.contains_key(&key)
    }

    /// Get a tracking collection by key
    ///
    /// # Errors
    ///
    /// Returns `CollectionNotFound` if the key addresses no collection.
    pub fn collection(&self, key: CollectionKey) -> Result<&TrackingCollection> {
        self.collections
            .get(&key)
            .ok_or(TrackingError::CollectionNotFound { key })
    }

    /// Get a mutable tracking collection by key
    ///
    /// Membership is changed through [`collection_ops`]; the mutable handle
    /// only exposes settings such as the excluded properties.
    ///
    /// # Errors
    ///
    /// Returns `CollectionNotFound` if the key addresses no collection.
    pub fn collection_mut(&mut self, key: CollectionKey) -> Result<&mut TrackingCollection> {
        self.collections
            .get_mut(&key)
            .ok_or(TrackingError::CollectionNotFound { key })
    }

    // ===== Events =====

    pub(crate) fn raise_entity_changed(&mut self, collection: CollectionKey) {
        self.events.push(GraphEvent::EntityChanged { collection });
        let forward = self
            .collections
            .get(&collection)
            .and_then(TrackingCollection::entity_changed_forward);
        if let Some(forward) = forward.filter(|f| *f != collection) {
            self.events
                .push(GraphEvent::EntityChanged { collection: forward });
        }
    }

    pub fn events(&self) -> &[GraphEvent] {
        &self.events
    }

    /// Take every event recorded since the last drain
    pub fn drain_events(&mut self) -> Vec<GraphEvent> {
        std::mem::take(&mut self.events)
    }

    /// Move every entity and collection of `other` into this graph
    ///
    /// Keys are globally unique, so nothing is renamed. Used to bring a graph
    /// returned from a persistence round trip next to the live one.
    pub fn absorb(&mut self, other: EntityGraph) {
        self.registry.merge(&other.registry);
        self.entities.extend(other.entities);
        self.collections.extend(other.collections);
    }
}

fn read_navigation(nav: &NavigationDescriptor, entity: &dyn Trackable) -> NavigationProperty {
    match nav.kind() {
        NavigationKind::Reference => {
            let slot = nav.reference(entity);
            NavigationProperty::Reference(ReferenceProperty {
                name: nav.name(),
                target_type: nav.target_type(),
                target: slot.and_then(|s| s.target()),
                tracker: slot.and_then(|s| s.tracker()),
            })
        }
        NavigationKind::Collection { many_to_many } => {
            NavigationProperty::Collection(CollectionProperty {
                name: nav.name(),
                target_type: nav.target_type(),
                many_to_many,
                collection: nav.collection(entity).and_then(|s| s.collection()),
            })
        }
    }
}
