use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::{Result, TrackingError};
use crate::model::Trackable;

use super::descriptor::{EntityDescriptor, EntityDescriptorBuilder};

/// Per-type cache of entity descriptors
///
/// Registering a type also registers every type reachable through its
/// navigation properties, so describing a root type is enough to make the
/// whole model known.
#[derive(Debug, Clone, Default)]
pub struct NavigationRegistry {
    descriptors: HashMap<TypeId, Arc<EntityDescriptor>>,
}

impl NavigationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T` (and its navigation targets) unless already known
    pub fn ensure<T: Trackable>(&mut self) {
        if self.descriptors.contains_key(&TypeId::of::<T>()) {
            return;
        }

        let mut builder = EntityDescriptorBuilder::<T>::new();
        T::describe(&mut builder);
        let descriptor = Arc::new(builder.build());
        self.descriptors
            .insert(TypeId::of::<T>(), Arc::clone(&descriptor));

        for nav in descriptor.navigation() {
            nav.register_target(self);
        }
        tracing::trace!(
            entity_type = descriptor.type_name(),
            navigation_count = descriptor.navigation().len(),
            "registered entity type"
        );
    }

    /// Registration entry point usable as a plain function pointer
    pub fn register_fn<T: Trackable>() -> fn(&mut NavigationRegistry) {
        NavigationRegistry::ensure::<T>
    }

    pub fn contains(&self, type_id: TypeId) -> bool {
        self.descriptors.contains_key(&type_id)
    }

    /// Descriptor for a concrete type
    ///
    /// # Errors
    ///
    /// Returns `UnregisteredType` if the type was never registered
    pub fn descriptor(&self, type_id: TypeId, type_name: &str) -> Result<Arc<EntityDescriptor>> {
        self.descriptors
            .get(&type_id)
            .cloned()
            .ok_or_else(|| TrackingError::UnregisteredType {
                type_name: type_name.to_string(),
            })
    }

    /// Descriptor for the concrete type of an entity
    ///
    /// # Errors
    ///
    /// Returns `UnregisteredType` if the entity's type was never registered
    pub fn descriptor_for(&self, entity: &dyn Trackable) -> Result<Arc<EntityDescriptor>> {
        self.descriptor(entity.as_any().type_id(), entity.type_name())
    }

    /// Add every descriptor of `other` that this registry lacks
    pub fn merge(&mut self, other: &NavigationRegistry) {
        for (type_id, descriptor) in &other.descriptors {
            self.descriptors
                .entry(*type_id)
                .or_insert_with(|| Arc::clone(descriptor));
        }
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
