use std::any::TypeId;
use std::marker::PhantomData;

use crate::model::entity::short_type_name;
use crate::model::{downcast_mut, downcast_ref, CollectionSlot, ReferenceSlot, Trackable};

use super::registry::NavigationRegistry;

/// Shape of a navigation property
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationKind {
    /// 0..1 target (one-to-one or many-to-one)
    Reference,
    /// 0..N targets (one-to-many, or many-to-many when the flag is set)
    Collection { many_to_many: bool },
}

/// Type-erased access to the slot backing one navigation property
pub(crate) trait SlotAccess: Send + Sync {
    fn reference<'a>(&self, entity: &'a dyn Trackable) -> Option<&'a ReferenceSlot>;
    fn reference_mut<'a>(&self, entity: &'a mut dyn Trackable) -> Option<&'a mut ReferenceSlot>;
    fn collection<'a>(&self, entity: &'a dyn Trackable) -> Option<&'a CollectionSlot>;
    fn collection_mut<'a>(&self, entity: &'a mut dyn Trackable)
        -> Option<&'a mut CollectionSlot>;
}

struct ReferenceAccess<T> {
    get: fn(&T) -> &ReferenceSlot,
    get_mut: fn(&mut T) -> &mut ReferenceSlot,
}

impl<T: Trackable> SlotAccess for ReferenceAccess<T> {
    fn reference<'a>(&self, entity: &'a dyn Trackable) -> Option<&'a ReferenceSlot> {
        downcast_ref::<T>(entity).map(self.get)
    }

    fn reference_mut<'a>(&self, entity: &'a mut dyn Trackable) -> Option<&'a mut ReferenceSlot> {
        downcast_mut::<T>(entity).map(self.get_mut)
    }

    fn collection<'a>(&self, _entity: &'a dyn Trackable) -> Option<&'a CollectionSlot> {
        None
    }

    fn collection_mut<'a>(
        &self,
        _entity: &'a mut dyn Trackable,
    ) -> Option<&'a mut CollectionSlot> {
        None
    }
}

struct CollectionAccess<T> {
    get: fn(&T) -> &CollectionSlot,
    get_mut: fn(&mut T) -> &mut CollectionSlot,
}

impl<T: Trackable> SlotAccess for CollectionAccess<T> {
    fn reference<'a>(&self, _entity: &'a dyn Trackable) -> Option<&'a ReferenceSlot> {
        None
    }

    fn reference_mut<'a>(
        &self,
        _entity: &'a mut dyn Trackable,
    ) -> Option<&'a mut ReferenceSlot> {
        None
    }

    fn collection<'a>(&self, entity: &'a dyn Trackable) -> Option<&'a CollectionSlot> {
        downcast_ref::<T>(entity).map(self.get)
    }

    fn collection_mut<'a>(
        &self,
        entity: &'a mut dyn Trackable,
    ) -> Option<&'a mut CollectionSlot> {
        downcast_mut::<T>(entity).map(self.get_mut)
    }
}

/// Registered description of one navigation property
pub struct NavigationDescriptor {
    name: &'static str,
    kind: NavigationKind,
    target_type: TypeId,
    target_name: &'static str,
    access: Box<dyn SlotAccess>,
    register_target: fn(&mut NavigationRegistry),
}

impl NavigationDescriptor {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kind(&self) -> NavigationKind {
        self.kind
    }

    pub fn is_reference(&self) -> bool {
        self.kind == NavigationKind::Reference
    }

    pub fn is_collection(&self) -> bool {
        matches!(self.kind, NavigationKind::Collection { .. })
    }

    pub fn is_many_to_many(&self) -> bool {
        self.kind == NavigationKind::Collection { many_to_many: true }
    }

    /// Declared element type of the navigation
    pub fn target_type(&self) -> TypeId {
        self.target_type
    }

    pub fn target_name(&self) -> &'static str {
        self.target_name
    }

    pub(crate) fn reference<'a>(&self, entity: &'a dyn Trackable) -> Option<&'a ReferenceSlot> {
        self.access.reference(entity)
    }

    pub(crate) fn reference_mut<'a>(
        &self,
        entity: &'a mut dyn Trackable,
    ) -> Option<&'a mut ReferenceSlot> {
        self.access.reference_mut(entity)
    }

    pub(crate) fn collection<'a>(&self, entity: &'a dyn Trackable) -> Option<&'a CollectionSlot> {
        self.access.collection(entity)
    }

    pub(crate) fn collection_mut<'a>(
        &self,
        entity: &'a mut dyn Trackable,
    ) -> Option<&'a mut CollectionSlot> {
        self.access.collection_mut(entity)
    }

    pub(crate) fn register_target(&self, registry: &mut NavigationRegistry) {
        (self.register_target)(registry)
    }
}

impl std::fmt::Debug for NavigationDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NavigationDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("target_name", &self.target_name)
            .finish()
    }
}

/// Registered description of one concrete entity type
#[derive(Debug)]
pub struct EntityDescriptor {
    type_id: TypeId,
    type_name: &'static str,
    properties: Vec<&'static str>,
    navigation: Vec<NavigationDescriptor>,
}

impl EntityDescriptor {
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Scalar property names in registration order
    pub fn properties(&self) -> &[&'static str] {
        &self.properties
    }

    /// Navigation descriptors in registration order
    pub fn navigation(&self) -> &[NavigationDescriptor] {
        &self.navigation
    }

    pub fn find_navigation(&self, name: &str) -> Option<&NavigationDescriptor> {
        self.navigation.iter().find(|n| n.name == name)
    }

    pub fn is_reference_navigation(&self, name: &str) -> bool {
        self.find_navigation(name)
            .map(NavigationDescriptor::is_reference)
            .unwrap_or(false)
    }

    /// Clone of an entity of this type with every navigation slot emptied
    ///
    /// References are cleared and collection slots set to `collections`.
    pub(crate) fn detached_copy(
        &self,
        original: &dyn Trackable,
        collections: CollectionSlot,
    ) -> Box<dyn Trackable> {
        let mut copy = original.clone_entity();
        for nav in &self.navigation {
            if let Some(slot) = nav.reference_mut(copy.as_mut()) {
                slot.bind(None, None);
            }
            if let Some(slot) = nav.collection_mut(copy.as_mut()) {
                *slot = collections;
            }
        }
        copy
    }
}

/// Builder handed to [`Trackable::describe`]
pub struct EntityDescriptorBuilder<T> {
    properties: Vec<&'static str>,
    navigation: Vec<NavigationDescriptor>,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Trackable> EntityDescriptorBuilder<T> {
    pub(crate) fn new() -> Self {
        Self {
            properties: Vec::new(),
            navigation: Vec::new(),
            _entity: PhantomData,
        }
    }

    /// Register a scalar (persisted, non-navigation) property
    pub fn property(&mut self, name: &'static str) -> &mut Self {
        if !self.properties.contains(&name) {
            self.properties.push(name);
        }
        self
    }

    /// Register a reference navigation property (1-1 or M-1)
    pub fn reference<U: Trackable>(
        &mut self,
        name: &'static str,
        get: fn(&T) -> &ReferenceSlot,
        get_mut: fn(&mut T) -> &mut ReferenceSlot,
    ) -> &mut Self {
        self.push::<U>(
            name,
            NavigationKind::Reference,
            Box::new(ReferenceAccess { get, get_mut }),
        )
    }

    /// Register a one-to-many collection navigation property
    pub fn collection<U: Trackable>(
        &mut self,
        name: &'static str,
        get: fn(&T) -> &CollectionSlot,
        get_mut: fn(&mut T) -> &mut CollectionSlot,
    ) -> &mut Self {
        self.push::<U>(
            name,
            NavigationKind::Collection {
                many_to_many: false,
            },
            Box::new(CollectionAccess { get, get_mut }),
        )
    }

    /// Register a many-to-many collection navigation property
    ///
    /// The backing collection records its owner as parent, which keeps
    /// recursive state changes from walking back across the association.
    pub fn many_to_many<U: Trackable>(
        &mut self,
        name: &'static str,
        get: fn(&T) -> &CollectionSlot,
        get_mut: fn(&mut T) -> &mut CollectionSlot,
    ) -> &mut Self {
        self.push::<U>(
            name,
            NavigationKind::Collection { many_to_many: true },
            Box::new(CollectionAccess { get, get_mut }),
        )
    }

    fn push<U: Trackable>(
        &mut self,
        name: &'static str,
        kind: NavigationKind,
        access: Box<dyn SlotAccess>,
    ) -> &mut Self {
        self.navigation.retain(|n| n.name != name);
        self.navigation.push(NavigationDescriptor {
            name,
            kind,
            target_type: TypeId::of::<U>(),
            target_name: short_type_name(std::any::type_name::<U>()),
            access,
            register_target: NavigationRegistry::register_fn::<U>(),
        });
        self
    }

    pub(crate) fn build(self) -> EntityDescriptor {
        EntityDescriptor {
            type_id: TypeId::of::<T>(),
            type_name: short_type_name(std::any::type_name::<T>()),
            properties: self.properties,
            navigation: self.navigation,
        }
    }
}
